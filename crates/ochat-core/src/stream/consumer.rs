//! Consumes one streamed reply and keeps its rendering up to date.

use std::fmt::Display;
use std::future::Future;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::frames::{FrameEvent, FrameStream};
use super::wire::{StreamEvent, WireFormat, decode_frame};
use crate::core::scroll::StickToBottom;
use crate::core::view::ChatView;
use crate::error::{ChatError, ChatResult};
use crate::render::{Element, Reconciler, Reconciliation, message_container};

/// Where a turn is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    /// Request sent, loader visible.
    Waiting,
    /// First frame arrived, loader hidden.
    Receiving,
    Done,
    Aborted,
    Errored,
}

impl TurnPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, TurnPhase::Done | TurnPhase::Aborted | TurnPhase::Errored)
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEnd {
    Done,
    Aborted,
    Errored(ChatError),
}

impl TurnEnd {
    pub fn phase(&self) -> TurnPhase {
        match self {
            TurnEnd::Done => TurnPhase::Done,
            TurnEnd::Aborted => TurnPhase::Aborted,
            TurnEnd::Errored(_) => TurnPhase::Errored,
        }
    }
}

/// Result of consuming a stream.
#[derive(Debug, Clone)]
pub struct StreamOutcome {
    /// Accumulated reply text, possibly partial.
    pub text: String,
    pub end: TurnEnd,
    /// Final rendering of `text`.
    pub live: Element,
    /// Whether any bytes of the reply body arrived before the turn ended.
    pub received: bool,
}

impl StreamOutcome {
    pub fn is_complete(&self) -> bool {
        self.end == TurnEnd::Done
    }
}

/// Drives one reply stream through decoding and rendering.
pub struct StreamConsumer<'a> {
    reconciler: &'a Reconciler,
    format: WireFormat,
    stick_to_bottom: StickToBottom,
}

impl<'a> StreamConsumer<'a> {
    pub fn new(reconciler: &'a Reconciler, format: WireFormat, stick_to_bottom: StickToBottom) -> Self {
        Self {
            reconciler,
            format,
            stick_to_bottom,
        }
    }

    /// Opens the stream with `open` and consumes it until it ends, errors or
    /// `cancel` fires.
    ///
    /// Reports `Waiting`, then `Receiving` on the first received bytes, then
    /// exactly one terminal phase. Opening failures end the turn as `Errored`.
    pub async fn consume<F, S, E>(
        &self,
        open: F,
        view: &mut dyn ChatView,
        cancel: &CancellationToken,
    ) -> StreamOutcome
    where
        F: Future<Output = ChatResult<S>>,
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        let mut live = message_container();
        let mut text = String::new();
        let mut received = false;

        view.phase_changed(TurnPhase::Waiting);
        view.set_loader(true);
        view.begin_assistant_message();

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ChatError::cancelled()),
            result = open => result,
        };

        let end = match opened {
            Ok(body) => {
                self.read_frames(body, view, cancel, &mut live, &mut text, &mut received)
                    .await
            }
            Err(err) if err.is_cancelled() => TurnEnd::Aborted,
            Err(err) => TurnEnd::Errored(err),
        };

        // Forced flush: the live tree always ends on the full text.
        if let Reconciliation::Failed(err) = self.reconciler.reconcile(&mut live, &text) {
            tracing::debug!(kind = %err.kind, "final render kept the previous tree");
        }
        if !received {
            view.set_loader(false);
        }

        match &end {
            TurnEnd::Done => tracing::debug!(chars = text.len(), "stream done"),
            TurnEnd::Aborted => tracing::info!(chars = text.len(), "stream aborted"),
            TurnEnd::Errored(err) => {
                tracing::warn!(chars = text.len(), details = ?err.details, "stream failed: {err}");
            }
        }
        view.phase_changed(end.phase());

        StreamOutcome {
            text,
            end,
            live,
            received,
        }
    }

    async fn read_frames<S, E>(
        &self,
        body: S,
        view: &mut dyn ChatView,
        cancel: &CancellationToken,
        live: &mut Element,
        text: &mut String,
        received: &mut bool,
    ) -> TurnEnd
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        let mut frames = FrameStream::new(body);

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return TurnEnd::Aborted,
                next = frames.next() => next,
            };

            let frame = match next {
                // End of stream without a completion frame still completes.
                None => return TurnEnd::Done,
                Some(Err(err)) => return TurnEnd::Errored(err),
                Some(Ok(FrameEvent::FirstBytes)) => {
                    *received = true;
                    view.set_loader(false);
                    view.phase_changed(TurnPhase::Receiving);
                    continue;
                }
                Some(Ok(FrameEvent::Frame(frame))) => frame,
            };

            let events = match decode_frame(self.format, &frame) {
                Ok(events) => events,
                Err(err) => {
                    tracing::debug!(frame = %frame, "skipping malformed frame: {err}");
                    continue;
                }
            };

            let mut delta = String::new();
            let mut end = None;
            for event in events {
                match event {
                    StreamEvent::Delta { content } => delta.push_str(&content),
                    StreamEvent::Done => {
                        end = Some(TurnEnd::Done);
                        break;
                    }
                    StreamEvent::Error { detail } => {
                        end = Some(TurnEnd::Errored(
                            ChatError::stream_protocol("Server reported a stream error")
                                .with_details(detail),
                        ));
                        break;
                    }
                }
            }

            if !delta.is_empty() {
                text.push_str(&delta);
                if let Reconciliation::Failed(err) = self.reconciler.reconcile(live, text) {
                    tracing::debug!(kind = %err.kind, "frame render skipped");
                }
                view.assistant_updated(live, &delta);
                if self.stick_to_bottom.is_enabled() {
                    view.scroll_to_bottom();
                }
            }

            if let Some(end) = end {
                return end;
            }
        }
    }
}
