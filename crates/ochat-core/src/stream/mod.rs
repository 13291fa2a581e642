//! Reply streaming: byte chunks to frames, frames to events, events to a
//! live rendered message.

pub mod consumer;
pub mod frames;
pub mod wire;

pub use consumer::{StreamConsumer, StreamOutcome, TurnEnd, TurnPhase};
pub use frames::{FrameEvent, FrameSplitter, FrameStream, Utf8Decoder};
pub use wire::{StreamEvent, WireFormat, decode_frame};
