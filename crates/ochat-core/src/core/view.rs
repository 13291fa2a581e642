//! The UI side of a chat session.

use url::Url;

use crate::render::{Element, RenderedMessage};
use crate::stream::consumer::TurnPhase;

pub const ABORTED_NOTICE: &str = "Request was aborted";
pub const STREAM_ERROR_NOTICE: &str = "An error occurred while processing the stream.";
pub const GENERIC_ERROR_NOTICE: &str = "An error occurred. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Notice,
    Error,
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Notice,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Side effects a session asks its front end to perform.
///
/// Every method has a no-op default so views only implement what they show.
pub trait ChatView {
    fn phase_changed(&mut self, _phase: TurnPhase) {}

    fn set_loader(&mut self, _visible: bool) {}

    /// Disables (`true`) or re-enables (`false`) the send controls.
    fn set_streaming(&mut self, _streaming: bool) {}

    fn clear_input(&mut self) {}

    fn render_user_message(&mut self, _text: &str) {}

    fn begin_assistant_message(&mut self) {}

    /// Called after each reconcile with the live tree and the new text.
    fn assistant_updated(&mut self, _live: &Element, _delta: &str) {}

    fn finish_assistant_message(&mut self, _message: &RenderedMessage) {}

    /// A complete assistant message loaded from history.
    fn render_assistant_message(&mut self, _message: &RenderedMessage) {}

    fn scroll_to_bottom(&mut self) {}

    fn notify(&mut self, _notice: &Notice) {}

    fn redirect(&mut self, _url: &str) {}

    fn location_changed(&mut self, _url: &Url) {}
}

/// A view that ignores everything.
#[derive(Debug, Default)]
pub struct NullView;

impl ChatView for NullView {}
