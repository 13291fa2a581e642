//! Wire types for the chat server's REST endpoints.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::render::ToolCapabilities;

/// Server-assigned dialog identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DialogId(String);

impl DialogId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DialogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DialogId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => DialogId(s),
            Raw::Number(n) => DialogId(n.to_string()),
        })
    }
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single chat message. Extra fields from stored rows are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Settings the server exposes to its front ends (`/config`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FrontendConfig {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub default_model: Option<String>,
    /// Tool name to server-side definition; only presence matters here.
    #[serde(default)]
    pub tools_callback: serde_json::Map<String, Value>,
    #[serde(default)]
    pub use_mathjax: bool,
}

impl FrontendConfig {
    pub fn tools(&self) -> ToolCapabilities {
        ToolCapabilities {
            python: self.tools_callback.get("python").is_some_and(is_truthy),
        }
    }
}

/// Dialog metadata (`/chat/get-dialog/{id}`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DialogInfo {
    pub dialog_id: DialogId,
    #[serde(default)]
    pub title: String,
}

/// Login state reported by `/user/is-logged-in`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    LoggedIn,
    /// Not logged in; the front end should go here.
    Redirect(String),
}

/// Common `{error, message, redirect}` response envelope.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub redirect: Option<String>,
    #[serde(default)]
    pub dialog_id: Option<DialogId>,
    #[serde(default)]
    pub message_id: Option<Value>,
}

impl Envelope {
    pub fn is_error(&self) -> bool {
        self.error.as_ref().is_some_and(is_truthy)
    }

    /// Best available error message: `message`, else a string `error`.
    pub fn error_message(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| self.error.as_ref()?.as_str().map(str::to_string))
    }
}

/// `/chat/get-messages/{id}` answers with rows or an error envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum MessagesResponse {
    Rows(Vec<Message>),
    Envelope(Envelope),
}

/// `/list` response.
#[derive(Debug, Deserialize)]
pub(crate) struct ModelList {
    #[serde(default)]
    pub model_names: Vec<String>,
}

/// `/tools/{tool}` response.
#[derive(Debug, Deserialize)]
pub(crate) struct ToolResponse {
    #[serde(default)]
    pub text: Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
}

#[derive(Debug, Serialize)]
pub(crate) struct DialogRequest<'a> {
    pub title: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ToolRequest<'a> {
    pub text: &'a str,
}

/// JavaScript-style truthiness for loosely typed server fields.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialog_id_from_string_or_number() {
        let id: DialogId = serde_json::from_str("\"3f2a\"").unwrap();
        assert_eq!(id.as_str(), "3f2a");
        let id: DialogId = serde_json::from_str("42").unwrap();
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_message_rows_ignore_extra_fields() {
        let rows = r#"[{"message_id":1,"dialog_id":"d","user_id":3,"role":"user","content":"hi","created":"2024-01-01"}]"#;
        let parsed: MessagesResponse = serde_json::from_str(rows).unwrap();
        let MessagesResponse::Rows(rows) = parsed else {
            panic!("expected rows");
        };
        assert_eq!(rows, vec![Message::user("hi")]);
    }

    #[test]
    fn test_messages_error_envelope() {
        let parsed: MessagesResponse =
            serde_json::from_str(r#"{"error":true,"message":"Error getting messages"}"#).unwrap();
        let MessagesResponse::Envelope(env) = parsed else {
            panic!("expected envelope");
        };
        assert!(env.is_error());
        assert_eq!(env.error_message().as_deref(), Some("Error getting messages"));
    }

    #[test]
    fn test_string_error_is_truthy() {
        let env: Envelope =
            serde_json::from_str(r#"{"error":"You must be logged in to save a dialog"}"#).unwrap();
        assert!(env.is_error());
        assert_eq!(
            env.error_message().as_deref(),
            Some("You must be logged in to save a dialog")
        );
        let env: Envelope = serde_json::from_str(r#"{"error":false,"message":"ok"}"#).unwrap();
        assert!(!env.is_error());
    }

    #[test]
    fn test_frontend_config_tools() {
        let config: FrontendConfig = serde_json::from_str(
            r#"{"default_model":"","tools_callback":{"python":{"module":"m","def":"execute"}},"use_mathjax":true}"#,
        )
        .unwrap();
        assert!(config.tools().python);
        assert!(config.use_mathjax);
        assert_eq!(config.default_model, None);

        let config: FrontendConfig = serde_json::from_str("{}").unwrap();
        assert!(!config.tools().python);
    }

    #[test]
    fn test_message_serializes_role_lowercase() {
        let json = serde_json::to_string(&Message::assistant("x")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"x"}"#);
    }
}
