//! HTTP client for the chat server.

pub mod types;

use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use url::Url;

pub use types::{DialogId, DialogInfo, FrontendConfig, Message, Role, SessionStatus};
use types::{
    ChatRequest, DialogRequest, Envelope, MessagesResponse, ModelList, ToolRequest, ToolResponse,
};

use crate::error::{ChatError, ChatResult};

const CONFIG_PATH: &str = "/config";
const LOGGED_IN_PATH: &str = "/user/is-logged-in";
const CREATE_DIALOG_PATH: &str = "/chat/create-dialog";
const CHAT_PATH: &str = "/chat";
const LIST_PATH: &str = "/list";
const DEFAULT_LOGIN_PATH: &str = "/user/login";

/// Raw reply body of `/chat`.
pub type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    /// Value of the server's session cookie, sent as `Cookie`.
    pub session_cookie: Option<String>,
}

impl ApiConfig {
    pub fn new(mut base_url: Url) -> Self {
        // Relative joins would otherwise drop the last path segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            session_cookie: None,
        }
    }
}

/// Typed access to the server's JSON endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ApiConfig,
    http: reqwest::Client,
}

impl ApiClient {
    /// # Errors
    /// Fails when the HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> ChatResult<Self> {
        let http = reqwest::Client::builder()
            .default_headers(build_headers(config.session_cookie.as_deref()))
            .build()?;
        Ok(Self { config, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    /// Page URL of a dialog, as the browser would show it.
    pub fn dialog_url(&self, id: &DialogId) -> Url {
        crate::location::dialog_url(&self.config.base_url, id)
    }

    fn url(&self, path: &str) -> ChatResult<Url> {
        self.config
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ChatError::network(format!("Invalid URL for {path}: {e}")))
    }

    /// GET `/config`.
    pub async fn frontend_config(&self) -> ChatResult<FrontendConfig> {
        self.get_json(CONFIG_PATH).await
    }

    /// GET `/user/is-logged-in`.
    ///
    /// The body is read whatever the status, since a logged-out answer may
    /// arrive with a non-2xx code.
    pub async fn session_status(&self) -> ChatResult<SessionStatus> {
        let response = self.http.get(self.url(LOGGED_IN_PATH)?).send().await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<Envelope>(&body) {
            Ok(env) if env.is_error() => Ok(SessionStatus::Redirect(
                env.redirect.unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_string()),
            )),
            Ok(_) if status.is_success() => Ok(SessionStatus::LoggedIn),
            _ => Err(ChatError::http_status(status.as_u16(), &body)),
        }
    }

    /// POST `/chat/create-dialog`; returns the new dialog's id.
    pub async fn create_dialog(&self, title: &str) -> ChatResult<DialogId> {
        let env: Envelope = self
            .post_json(CREATE_DIALOG_PATH, &DialogRequest { title })
            .await?;
        let env = check_envelope(env, "Error saving dialog")?;
        env.dialog_id
            .ok_or_else(|| ChatError::network("Dialog created without an id"))
    }

    /// GET `/chat/get-messages/{id}`.
    pub async fn messages(&self, id: &DialogId) -> ChatResult<Vec<Message>> {
        let path = format!("/chat/get-messages/{id}");
        match self.get_json::<MessagesResponse>(&path).await? {
            MessagesResponse::Rows(rows) => Ok(rows),
            MessagesResponse::Envelope(env) => {
                check_envelope(env, "Error getting messages")?;
                Ok(Vec::new())
            }
        }
    }

    /// POST `/chat/create-message/{id}`.
    pub async fn create_message(&self, id: &DialogId, message: &Message) -> ChatResult<()> {
        let path = format!("/chat/create-message/{id}");
        let env: Envelope = self.post_json(&path, message).await?;
        let env = check_envelope(env, "Error saving message")?;
        tracing::debug!(dialog = %id, message_id = ?env.message_id, "message saved");
        Ok(())
    }

    /// GET `/chat/get-dialog/{id}`.
    pub async fn dialog_info(&self, id: &DialogId) -> ChatResult<DialogInfo> {
        let path = format!("/chat/get-dialog/{id}");
        let value: serde_json::Value = self.get_json(&path).await?;
        if value.is_null() {
            return Err(ChatError::network(format!("Dialog {id} not found")));
        }
        if let Ok(env) = serde_json::from_value::<Envelope>(value.clone())
            && env.is_error()
        {
            check_envelope(env, "Error getting dialog")?;
        }
        serde_json::from_value(value)
            .map_err(|e| ChatError::network(format!("Invalid dialog response: {e}")))
    }

    /// POST `/chat/delete-dialog/{id}`.
    pub async fn delete_dialog(&self, id: &DialogId) -> ChatResult<()> {
        let path = format!("/chat/delete-dialog/{id}");
        let env: Envelope = self.post_json(&path, &serde_json::json!({})).await?;
        check_envelope(env, "Error deleting dialog")?;
        Ok(())
    }

    /// GET `/list`.
    pub async fn model_names(&self) -> ChatResult<Vec<String>> {
        let list: ModelList = self.get_json(LIST_PATH).await?;
        Ok(list.model_names)
    }

    /// POST `/tools/python` with the code text; returns the tool's output.
    pub async fn execute_python(&self, code: &str) -> ChatResult<String> {
        let response: ToolResponse = self
            .post_json("/tools/python", &ToolRequest { text: code })
            .await?;
        Ok(match response.text {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    /// POST `/chat` and return the raw streamed body.
    ///
    /// # Errors
    /// Non-2xx statuses and transport failures are network errors.
    pub async fn open_chat_stream(&self, model: &str, messages: &[Message]) -> ChatResult<ByteStream> {
        let response = self
            .http
            .post(self.url(CHAT_PATH)?)
            .json(&ChatRequest { model, messages })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::http_status(status.as_u16(), &body));
        }

        Ok(Box::pin(response.bytes_stream()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ChatResult<T> {
        let response = self.http.get(self.url(path)?).send().await?;
        read_json(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> ChatResult<T>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.http.post(self.url(path)?).json(body).send().await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> ChatResult<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ChatError::http_status(status.as_u16(), &body));
    }
    if body.trim().is_empty() {
        return Err(ChatError::network("Empty response body"));
    }
    serde_json::from_str(&body).map_err(|e| {
        ChatError::network(format!("Invalid JSON response: {e}")).with_details(body.clone())
    })
}

fn check_envelope(env: Envelope, fallback: &str) -> ChatResult<Envelope> {
    if env.is_error() {
        let message = env.error_message().unwrap_or_else(|| fallback.to_string());
        return Err(ChatError::network(message));
    }
    Ok(env)
}

fn build_headers(session_cookie: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("ochat/{}", env!("CARGO_PKG_VERSION")))
            .unwrap_or_else(|_| HeaderValue::from_static("ochat")),
    );
    if let Some(cookie) = session_cookie.filter(|c| !c.is_empty()) {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(_) => tracing::warn!("session_cookie contains invalid header characters; ignoring"),
        }
    }
    headers
}
