//! Front-end modes driven by the CLI.
//!
//! - `terminal`: `ChatView` over stdout/stderr
//! - `repl`: line-oriented interactive chat

pub mod repl;
pub mod terminal;
