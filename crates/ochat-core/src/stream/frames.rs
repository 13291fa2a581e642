//! Byte stream to JSON frame splitting.
//!
//! The chat endpoint writes frames as `data: {json}` separated by blank
//! lines, and on failure may write a bare `{"error": ...}` object with no
//! prefix at all. That is close to SSE but not conformant, so frames are cut
//! on the literal `"data: "` separator and then checked against the JSON
//! grammar: a separator that falls inside an unfinished JSON value (for
//! example inside message content) does not end the frame.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use serde::de::IgnoredAny;

use crate::error::{ChatError, ChatResult};

/// Frame separator written by the server.
pub const SEPARATOR: &str = "data: ";

/// Incremental, lossy UTF-8 decoder.
///
/// A multi-byte sequence split across chunks is held back until it is
/// complete; invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.pending.len());

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    if let Some(len) = err.error_len() {
                        out.push(char::REPLACEMENT_CHARACTER);
                        self.pending.drain(..valid + len);
                    } else {
                        // Incomplete sequence at the end; wait for more bytes.
                        self.pending.drain(..valid);
                        break;
                    }
                }
            }
        }

        out
    }

    /// Flushes a dangling partial sequence at end of stream.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        char::REPLACEMENT_CHARACTER.to_string()
    }
}

/// How a candidate segment reads as JSON.
enum Segment<'a> {
    /// One or more complete values, plus an unparseable remainder if any.
    Values(Vec<&'a str>),
    /// Valid so far but cut off.
    Incomplete,
}

fn classify(segment: &str) -> Segment<'_> {
    let mut values = Vec::new();
    let mut iter = serde_json::Deserializer::from_str(segment).into_iter::<IgnoredAny>();
    let mut start = 0;

    loop {
        match iter.next() {
            Some(Ok(_)) => {
                let end = iter.byte_offset();
                values.push(segment[start..end].trim());
                start = end;
            }
            Some(Err(err)) if err.is_eof() => return Segment::Incomplete,
            Some(Err(_)) => {
                // Not JSON from here on; hand the rest over as one frame and
                // let the decoder discard it.
                values.push(segment[start..].trim());
                break;
            }
            None => break,
        }
    }

    Segment::Values(values)
}

/// Splits decoded text into frames.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    buffer: String,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends text and returns every frame it completes.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);
        let mut frames = Vec::new();
        let mut search_from = 0;

        while let Some(offset) = self.buffer[search_from..].find(SEPARATOR) {
            let sep = search_from + offset;
            let candidate = self.buffer[..sep].trim();
            if candidate.is_empty() {
                self.buffer.drain(..sep + SEPARATOR.len());
                search_from = 0;
                continue;
            }
            match classify(candidate) {
                Segment::Values(values) => frames.extend(values.into_iter().map(str::to_string)),
                // The separator sits inside a JSON string; keep looking.
                Segment::Incomplete => {
                    search_from = sep + SEPARATOR.len();
                    continue;
                }
            }
            self.buffer.drain(..sep + SEPARATOR.len());
            search_from = 0;
        }

        // A trailing segment goes out as soon as it is complete JSON.
        let tail = match classify(self.buffer.trim()) {
            Segment::Values(values)
                if values
                    .last()
                    .is_some_and(|v| serde_json::from_str::<IgnoredAny>(v).is_ok()) =>
            {
                values.into_iter().map(str::to_string).collect()
            }
            _ => Vec::new(),
        };
        if !tail.is_empty() {
            frames.extend(tail);
            self.buffer.clear();
        }

        frames
    }

    /// Returns whatever is left at end of stream as a final frame.
    pub fn finish(&mut self) -> Option<String> {
        let tail = self.buffer.trim().to_string();
        self.buffer.clear();
        (!tail.is_empty()).then_some(tail)
    }
}

/// Item of a [`FrameStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// The first non-empty chunk arrived. Emitted once, ahead of its frames.
    FirstBytes,
    Frame(String),
}

/// Turns a byte stream into a stream of raw frame strings.
pub struct FrameStream<S> {
    inner: S,
    decoder: Utf8Decoder,
    splitter: FrameSplitter,
    pending: VecDeque<String>,
    started: bool,
    finished: bool,
}

impl<S> FrameStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: Utf8Decoder::new(),
            splitter: FrameSplitter::new(),
            pending: VecDeque::new(),
            started: false,
            finished: false,
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        let text = self.decoder.decode(bytes);
        if !text.is_empty() {
            self.pending.extend(self.splitter.push(&text));
        }
    }

    fn flush(&mut self) {
        let text = self.decoder.finish();
        if !text.is_empty() {
            self.pending.extend(self.splitter.push(&text));
        }
        if let Some(tail) = self.splitter.finish() {
            self.pending.push_back(tail);
        }
    }
}

impl<S, E> Stream for FrameStream<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = ChatResult<FrameEvent>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(FrameEvent::Frame(frame))));
            }
            if self.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.push_bytes(&bytes);
                    if !self.started && !bytes.is_empty() {
                        self.started = true;
                        return Poll::Ready(Some(Ok(FrameEvent::FirstBytes)));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(ChatError::network(format!(
                        "Stream read failed: {e}"
                    )))));
                }
                Poll::Ready(None) => {
                    self.finished = true;
                    self.flush();
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
