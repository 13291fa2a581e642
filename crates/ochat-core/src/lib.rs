//! Core ochat library (API client, streaming, rendering, config).

pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod location;
pub mod logging;
pub mod render;
pub mod stream;
