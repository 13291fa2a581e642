//! Dialog session: one user turn at a time against the chat server.

use tokio_util::sync::CancellationToken;

use crate::client::{ApiClient, DialogId, FrontendConfig, Message, Role, SessionStatus};
use crate::core::interrupt::TurnCanceller;
use crate::core::scroll::StickToBottom;
use crate::core::view::{
    ABORTED_NOTICE, ChatView, GENERIC_ERROR_NOTICE, Notice, STREAM_ERROR_NOTICE,
};
use crate::error::{ChatError, ChatResult};
use crate::render::{Reconciler, RenderedMessage};
use crate::stream::consumer::{StreamConsumer, TurnEnd, TurnPhase};
use crate::stream::wire::WireFormat;

/// Conversation state owned by a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// `None` until the first message creates a dialog.
    pub dialog_id: Option<DialogId>,
    /// Append-only message history.
    pub messages: Vec<Message>,
    pub is_streaming: bool,
}

/// What happened to a submitted message.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// Blank input or a turn already in flight; nothing was sent.
    Ignored,
    /// Not logged in; the view was sent here.
    Redirected(String),
    /// The reply stream ran to some end.
    Finished(TurnReport),
    /// The turn failed before or around streaming.
    Failed(ChatError),
}

/// Summary of a turn whose stream was consumed.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub end: TurnEnd,
    pub message: RenderedMessage,
    /// Whether the assistant reply was saved on the server.
    pub persisted: bool,
}

/// Drives dialogs for one front end.
pub struct DialogSession {
    client: ApiClient,
    reconciler: Reconciler,
    format: WireFormat,
    model: String,
    state: SessionState,
    stick_to_bottom: StickToBottom,
    canceller: TurnCanceller,
}

impl DialogSession {
    pub fn new(client: ApiClient, reconciler: Reconciler, format: WireFormat, model: impl Into<String>) -> Self {
        Self {
            client,
            reconciler,
            format,
            model: model.into(),
            state: SessionState::default(),
            stick_to_bottom: StickToBottom::new(true),
            canceller: TurnCanceller::new(),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Handle for aborting the in-flight turn from elsewhere.
    pub fn canceller(&self) -> TurnCanceller {
        self.canceller.clone()
    }

    /// Shared stick-to-bottom flag, for scroll input handlers.
    pub fn stick_to_bottom(&self) -> StickToBottom {
        self.stick_to_bottom.clone()
    }

    /// Applies server-provided front-end settings.
    pub fn apply_frontend_config(&mut self, config: &FrontendConfig) {
        self.reconciler.set_tools(config.tools());
    }

    /// Starts a new, unsaved dialog.
    pub fn reset(&mut self) {
        if self.state.is_streaming {
            tracing::debug!("reset ignored while streaming");
            return;
        }
        self.state = SessionState::default();
    }

    /// Loads a saved dialog and renders its history.
    ///
    /// # Errors
    /// Returns the client error when the history cannot be fetched.
    pub async fn load(&mut self, id: DialogId, view: &mut dyn ChatView) -> ChatResult<usize> {
        let messages = self.client.messages(&id).await?;
        tracing::debug!(dialog = %id, count = messages.len(), "dialog loaded");

        for message in &messages {
            match message.role {
                Role::User => view.render_user_message(&message.content),
                Role::Assistant => {
                    let rendered = self.reconciler.render_static(&message.content);
                    view.render_assistant_message(&rendered);
                }
            }
        }

        let count = messages.len();
        self.state = SessionState {
            dialog_id: Some(id),
            messages,
            is_streaming: false,
        };
        Ok(count)
    }

    /// Runs the python tool on a code block and renders its output.
    ///
    /// # Errors
    /// Returns the client error when the tool call fails.
    pub async fn execute_code(&self, code: &str) -> ChatResult<RenderedMessage> {
        let output = self.client.execute_python(code).await?;
        Ok(self.reconciler.render_static(&output))
    }

    /// Sends one user message and streams the reply.
    ///
    /// Never returns early with the session still marked as streaming, and
    /// reports every failure through the view. The canceller stays armed for
    /// the whole turn; an abort that lands before the stream opens cancels
    /// the stream as soon as it starts.
    pub async fn submit_turn(&mut self, text: &str, view: &mut dyn ChatView) -> TurnOutcome {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("empty message ignored");
            return TurnOutcome::Ignored;
        }
        if self.state.is_streaming {
            tracing::debug!("message ignored while streaming");
            return TurnOutcome::Ignored;
        }

        let cancel = self.canceller.arm();
        let outcome = self.checked_turn(text, view, &cancel).await;
        self.canceller.disarm();
        outcome
    }

    async fn checked_turn(
        &mut self,
        text: &str,
        view: &mut dyn ChatView,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        match self.client.session_status().await {
            Ok(SessionStatus::LoggedIn) => {}
            Ok(SessionStatus::Redirect(url)) => {
                tracing::info!(%url, "not logged in, redirecting");
                view.redirect(&url);
                return TurnOutcome::Redirected(url);
            }
            Err(err) => return fail(err, view),
        }

        self.state.is_streaming = true;
        view.set_streaming(true);

        let result = self.run_turn(text, view, cancel).await;

        self.state.is_streaming = false;
        view.set_streaming(false);
        view.phase_changed(TurnPhase::Idle);

        match result {
            Ok(report) => TurnOutcome::Finished(report),
            Err(err) => fail(err, view),
        }
    }

    async fn run_turn(
        &mut self,
        text: &str,
        view: &mut dyn ChatView,
        cancel: &CancellationToken,
    ) -> ChatResult<TurnReport> {
        if self.state.messages.is_empty() {
            let id = self.client.create_dialog(text).await?;
            tracing::info!(dialog = %id, "dialog created");
            view.location_changed(&self.client.dialog_url(&id));
            self.state.dialog_id = Some(id);
        }
        let dialog_id = self
            .state
            .dialog_id
            .clone()
            .ok_or_else(|| ChatError::network("No dialog to save the message in"))?;

        let message = Message::user(text);
        self.state.messages.push(message.clone());
        self.client.create_message(&dialog_id, &message).await?;

        view.clear_input();
        view.render_user_message(text);
        self.stick_to_bottom.set(true);

        let outcome = {
            let consumer =
                StreamConsumer::new(&self.reconciler, self.format, self.stick_to_bottom.clone());
            let open = self.client.open_chat_stream(&self.model, &self.state.messages);
            consumer.consume(open, view, cancel).await
        };

        let message = self.reconciler.finish(&outcome.text, outcome.live);
        view.finish_assistant_message(&message);

        let mut persisted = false;
        if outcome.end == TurnEnd::Done || !outcome.text.is_empty() {
            let reply = Message::assistant(outcome.text);
            match self.client.create_message(&dialog_id, &reply).await {
                Ok(()) => persisted = true,
                Err(err) => {
                    tracing::warn!(dialog = %dialog_id, "saving reply failed: {err}");
                    view.notify(&Notice::error(GENERIC_ERROR_NOTICE));
                }
            }
            self.state.messages.push(reply);
        }

        match &outcome.end {
            TurnEnd::Done => {}
            TurnEnd::Aborted => view.notify(&Notice::notice(ABORTED_NOTICE)),
            // Failing to open the stream reads as a plain request failure.
            TurnEnd::Errored(_) if !outcome.received => {
                view.notify(&Notice::error(GENERIC_ERROR_NOTICE));
            }
            TurnEnd::Errored(_) => view.notify(&Notice::error(STREAM_ERROR_NOTICE)),
        }

        Ok(TurnReport {
            end: outcome.end,
            message,
            persisted,
        })
    }
}

fn fail(err: ChatError, view: &mut dyn ChatView) -> TurnOutcome {
    tracing::warn!(kind = %err.kind, details = ?err.details, "turn failed: {err}");
    view.notify(&Notice::error(GENERIC_ERROR_NOTICE));
    TurnOutcome::Failed(err)
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::client::ApiConfig;
    use crate::core::view::NullView;

    fn offline_session() -> DialogSession {
        // Nothing listens here; a rejected turn never reaches the network.
        let base = Url::parse("http://127.0.0.1:9/").unwrap();
        let client = ApiClient::new(ApiConfig::new(base)).unwrap();
        DialogSession::new(client, Reconciler::default(), WireFormat::Ollama, "llama3")
    }

    #[tokio::test]
    async fn test_submit_while_streaming_is_ignored() {
        let mut session = offline_session();
        session.state.messages.push(Message::user("earlier"));
        session.state.is_streaming = true;
        let before = session.state.clone();

        let outcome = session.submit_turn("hello", &mut NullView).await;

        assert!(matches!(outcome, TurnOutcome::Ignored));
        assert_eq!(session.state, before);
    }

    #[test]
    fn test_reset_ignored_while_streaming() {
        let mut session = offline_session();
        session.state.dialog_id = Some(DialogId::new("d1"));
        session.state.is_streaming = true;

        session.reset();
        assert_eq!(session.state.dialog_id, Some(DialogId::new("d1")));

        session.state.is_streaming = false;
        session.reset();
        assert_eq!(session.state, SessionState::default());
    }
}
