//! Error taxonomy shared by the client, stream consumer and session.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Categories of chat errors.
///
/// The kind decides how an error is surfaced; the message text never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport failure, non-2xx status, empty body or `error: true` envelope
    Network,
    /// Server-signaled stream error or undecodable stream
    StreamProtocol,
    /// Explicit user abort
    Cancelled,
    /// Diff/patch failure while reconciling the rendered tree
    Render,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::StreamProtocol => write!(f, "stream_protocol"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
            ErrorKind::Render => write!(f, "render"),
        }
    }
}

/// Structured error with kind and details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatError {
    /// Error category
    pub kind: ErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ChatError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        let details = details.into();
        if !details.is_empty() {
            self.details = Some(details);
        }
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn stream_protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StreamProtocol, message)
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Render, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "Request was aborted")
    }

    /// Creates an HTTP status error, pulling `message` out of a JSON body when present.
    pub fn http_status(status: u16, body: &str) -> Self {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(body)
            && let Some(msg) = json.get("message").and_then(|v| v.as_str())
        {
            return Self::network(format!("HTTP {status}: {msg}")).with_details(body);
        }
        Self::network(format!("HTTP {status}")).with_details(body)
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ChatError {}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChatError::network(format!("Request timed out: {err}"))
        } else if err.is_connect() {
            ChatError::network(format!("Connection failed: {err}"))
        } else if err.is_decode() {
            ChatError::network(format!("Invalid response body: {err}"))
        } else {
            ChatError::network(format!("Network error: {err}"))
        }
    }
}

/// Result type for chat operations.
pub type ChatResult<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_extracts_json_message() {
        let err = ChatError::http_status(401, r#"{"error":true,"message":"You must be logged in"}"#);
        assert_eq!(err.kind, ErrorKind::Network);
        assert_eq!(err.message, "HTTP 401: You must be logged in");
        assert!(err.details.is_some());
    }

    #[test]
    fn test_http_status_plain_body() {
        let err = ChatError::http_status(502, "");
        assert_eq!(err.message, "HTTP 502");
        assert_eq!(err.details, None);
    }

    #[test]
    fn test_cancelled_is_identified_by_kind() {
        let err = ChatError::cancelled();
        assert!(err.is_cancelled());
        let other = ChatError::network("Request was aborted");
        assert!(!other.is_cancelled());
    }
}
