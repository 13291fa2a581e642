//! Core module: front-end agnostic session runtime.
//!
//! This module contains:
//! - `session`: Dialog state and the per-turn send/stream/persist flow
//! - `view`: The `ChatView` trait front ends implement
//! - `interrupt`: Aborting the in-flight turn
//! - `scroll`: Stick-to-bottom tracking for scroll input

pub mod interrupt;
pub mod scroll;
pub mod session;
pub mod view;
