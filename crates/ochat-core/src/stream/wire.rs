//! JSON frame decoding for the two supported wire formats.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The literal end-of-stream marker some servers send.
pub const DONE_MARKER: &str = "[DONE]";

/// Shape of the frames the chat endpoint streams.
///
/// Fixed per client by configuration; frames are never sniffed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// `{choices:[{delta:{content}, finish_reason}], error}`
    #[default]
    ChatCompletions,
    /// `{message:{role, content}, done, error}`
    Ollama,
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireFormat::ChatCompletions => write!(f, "chat_completions"),
            WireFormat::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "chat_completions" | "openai" => Ok(WireFormat::ChatCompletions),
            "ollama" => Ok(WireFormat::Ollama),
            other => Err(format!(
                "unknown wire format '{other}' (expected chat_completions or ollama)"
            )),
        }
    }
}

/// A decoded stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Content to append.
    Delta { content: String },
    /// The server finished the reply.
    Done,
    /// The server reported an error.
    Error { detail: String },
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    delta: Option<ContentPart>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaChunk {
    #[serde(default)]
    message: Option<ContentPart>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<Value>,
}

/// Decodes one frame into zero or more events.
///
/// An `error` field wins over any content in the same frame. A frame can
/// carry both content and completion, in which case `Delta` precedes `Done`.
///
/// # Errors
/// Returns the JSON error for frames that are not a JSON object of the
/// expected shape. Callers treat that frame as a no-op.
pub fn decode_frame(format: WireFormat, frame: &str) -> Result<Vec<StreamEvent>, serde_json::Error> {
    let frame = frame.trim();
    if frame.is_empty() {
        return Ok(Vec::new());
    }
    if frame == DONE_MARKER {
        return Ok(vec![StreamEvent::Done]);
    }

    let (error, content, done) = match format {
        WireFormat::ChatCompletions => {
            let chunk: CompletionChunk = serde_json::from_str(frame)?;
            let mut content = String::new();
            let mut done = false;
            for choice in chunk.choices {
                if let Some(text) = choice.delta.and_then(|d| d.content) {
                    content.push_str(&text);
                }
                done |= choice.finish_reason.is_some_and(|r| !r.is_empty());
            }
            (chunk.error, content, done)
        }
        WireFormat::Ollama => {
            let chunk: OllamaChunk = serde_json::from_str(frame)?;
            let content = chunk.message.and_then(|m| m.content).unwrap_or_default();
            (chunk.error, content, chunk.done)
        }
    };

    if let Some(detail) = error.as_ref().and_then(error_detail) {
        return Ok(vec![StreamEvent::Error { detail }]);
    }

    let mut events = Vec::with_capacity(2);
    if !content.is_empty() {
        events.push(StreamEvent::Delta { content });
    }
    if done {
        events.push(StreamEvent::Done);
    }
    Ok(events)
}

/// Reads an `error` field that may be a string, an object with a message,
/// or a flag.
fn error_detail(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => Some(
            map.get("message")
                .and_then(Value::as_str)
                .map_or_else(|| value.to_string(), str::to_string),
        ),
        Value::Bool(true) => Some("stream error".to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(s: &str) -> StreamEvent {
        StreamEvent::Delta {
            content: s.to_string(),
        }
    }

    #[test]
    fn test_chat_completions_delta() {
        let frame = r#"{"id":"x","choices":[{"index":0,"delta":{"role":"assistant","content":"Hi"},"finish_reason":null}]}"#;
        assert_eq!(decode_frame(WireFormat::ChatCompletions, frame).unwrap(), vec![delta("Hi")]);
    }

    #[test]
    fn test_chat_completions_finish_reason() {
        let frame = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(
            decode_frame(WireFormat::ChatCompletions, frame).unwrap(),
            vec![StreamEvent::Done]
        );
        let frame = r#"{"choices":[{"delta":{"content":"!"},"finish_reason":"length"}]}"#;
        assert_eq!(
            decode_frame(WireFormat::ChatCompletions, frame).unwrap(),
            vec![delta("!"), StreamEvent::Done]
        );
    }

    #[test]
    fn test_ollama_frames() {
        let frame = r#"{"message":{"role":"assistant","content":"Hi"},"done":false}"#;
        assert_eq!(decode_frame(WireFormat::Ollama, frame).unwrap(), vec![delta("Hi")]);
        let frame = r#"{"message":{"role":"assistant","content":""},"done":true}"#;
        assert_eq!(decode_frame(WireFormat::Ollama, frame).unwrap(), vec![StreamEvent::Done]);
    }

    #[test]
    fn test_error_string_and_object() {
        let frame = r#"{"error":"model not found"}"#;
        assert_eq!(
            decode_frame(WireFormat::ChatCompletions, frame).unwrap(),
            vec![StreamEvent::Error {
                detail: "model not found".to_string()
            }]
        );
        let frame = r#"{"error":{"message":"overloaded"},"message":{"content":"lost"}}"#;
        assert_eq!(
            decode_frame(WireFormat::Ollama, frame).unwrap(),
            vec![StreamEvent::Error {
                detail: "overloaded".to_string()
            }]
        );
    }

    #[test]
    fn test_false_or_null_error_is_ignored() {
        let frame = r#"{"error":null,"choices":[{"delta":{"content":"a"}}]}"#;
        assert_eq!(decode_frame(WireFormat::ChatCompletions, frame).unwrap(), vec![delta("a")]);
        let frame = r#"{"error":false,"message":{"content":"b"}}"#;
        assert_eq!(decode_frame(WireFormat::Ollama, frame).unwrap(), vec![delta("b")]);
    }

    #[test]
    fn test_done_marker() {
        for format in [WireFormat::ChatCompletions, WireFormat::Ollama] {
            assert_eq!(decode_frame(format, "[DONE]").unwrap(), vec![StreamEvent::Done]);
        }
    }

    #[test]
    fn test_empty_and_contentless_frames_are_no_ops() {
        assert!(decode_frame(WireFormat::ChatCompletions, "  ").unwrap().is_empty());
        assert!(decode_frame(WireFormat::ChatCompletions, "{}").unwrap().is_empty());
        assert!(decode_frame(WireFormat::Ollama, r#"{"done":false}"#).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_frame_is_error() {
        assert!(decode_frame(WireFormat::ChatCompletions, "{not json").is_err());
        assert!(decode_frame(WireFormat::Ollama, "[1,2]").is_err());
    }

    #[test]
    fn test_wire_format_parsing() {
        assert_eq!("ollama".parse::<WireFormat>().unwrap(), WireFormat::Ollama);
        assert_eq!(
            "chat-completions".parse::<WireFormat>().unwrap(),
            WireFormat::ChatCompletions
        );
        assert!("sse".parse::<WireFormat>().is_err());
    }
}
