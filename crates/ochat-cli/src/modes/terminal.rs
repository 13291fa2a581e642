//! Terminal view for chat sessions.
//!
//! # Output contract
//! - Assistant text (streamed deltas, loaded history) → stdout
//! - Notices, redirects, dialog locations → stderr

use std::io::{Stderr, Stdout, Write, stderr, stdout};

use ochat_core::core::view::{ChatView, Notice, NoticeLevel};
use ochat_core::render::normalize::normalize;
use ochat_core::render::{CodeBlock, Element, RenderedMessage};
use url::Url;

pub const USER_PREFIX: &str = "you> ";
pub const ASSISTANT_PREFIX: &str = "assistant> ";

/// Writes chat output as plain lines.
pub struct TerminalView<W: Write, E: Write> {
    out: W,
    err: E,
    base_url: Url,
    /// Print user messages; off when the terminal already shows what was typed.
    echo_user: bool,
    /// Print loaded assistant messages as HTML instead of markdown.
    html: bool,
    /// Code blocks of the latest assistant message.
    code_blocks: Vec<CodeBlock>,
    /// Raw text of the latest assistant message.
    last_reply: Option<String>,
    /// Raw text streamed so far in the current reply.
    streamed: String,
    /// Normalized text already written for the current reply.
    shown: String,
    mid_line: bool,
}

impl TerminalView<Stdout, Stderr> {
    pub fn stdio(base_url: Url) -> Self {
        Self::new(stdout(), stderr(), base_url)
    }
}

impl<W: Write, E: Write> TerminalView<W, E> {
    pub fn new(out: W, err: E, base_url: Url) -> Self {
        Self {
            out,
            err,
            base_url,
            echo_user: true,
            html: false,
            code_blocks: Vec::new(),
            last_reply: None,
            streamed: String::new(),
            shown: String::new(),
            mid_line: false,
        }
    }

    #[must_use]
    pub fn with_echo(mut self, echo_user: bool) -> Self {
        self.echo_user = echo_user;
        self
    }

    #[must_use]
    pub fn with_html(mut self, html: bool) -> Self {
        self.html = html;
        self
    }

    /// Code block `n`, counted from 1 in the latest assistant message.
    pub fn code_block(&self, n: usize) -> Option<&CodeBlock> {
        n.checked_sub(1).and_then(|i| self.code_blocks.get(i))
    }

    /// Raw markdown of the latest assistant message.
    pub fn last_reply(&self) -> Option<&str> {
        self.last_reply.as_deref()
    }

    pub fn say(&mut self, line: &str) {
        self.end_line();
        let _ = writeln!(self.out, "{line}");
        let _ = self.out.flush();
    }

    /// Writes without a newline, for prompts.
    pub fn prompt(&mut self, text: &str) {
        let _ = write!(self.out, "{text}");
        let _ = self.out.flush();
    }

    pub fn warn(&mut self, line: &str) {
        self.end_line();
        let _ = writeln!(self.err, "{line}");
    }

    fn end_line(&mut self) {
        if self.mid_line {
            let _ = writeln!(self.out);
            self.mid_line = false;
        }
    }

    fn remember(&mut self, message: &RenderedMessage) {
        self.code_blocks.clone_from(&message.code_blocks);
        self.last_reply = Some(message.text.clone());
    }

    /// Writes the part of `normalized` past what is already shown.
    fn show_up_to(&mut self, normalized: &str, end: usize) {
        if end <= self.shown.len() || !normalized.starts_with(self.shown.as_str()) {
            return;
        }
        let fresh = &normalized[self.shown.len()..end];
        let _ = write!(self.out, "{fresh}");
        let _ = self.out.flush();
        self.shown.push_str(fresh);
        self.mid_line = true;
    }

    fn login_url(&self, target: &str) -> String {
        self.base_url
            .join(target.trim_start_matches('/'))
            .map_or_else(|_| target.to_string(), |url| url.to_string())
    }
}

impl<W: Write, E: Write> ChatView for TerminalView<W, E> {
    fn render_user_message(&mut self, text: &str) {
        if self.echo_user {
            self.say(&format!("{USER_PREFIX}{text}"));
        }
    }

    fn begin_assistant_message(&mut self) {
        self.end_line();
        let _ = write!(self.out, "{ASSISTANT_PREFIX}");
        let _ = self.out.flush();
        self.streamed.clear();
        self.shown.clear();
        self.mid_line = true;
    }

    fn assistant_updated(&mut self, _live: &Element, delta: &str) {
        if delta.is_empty() {
            return;
        }
        self.streamed.push_str(delta);
        let normalized = normalize(&self.streamed);
        let end = settled_len(&normalized);
        self.show_up_to(&normalized, end);
    }

    fn finish_assistant_message(&mut self, message: &RenderedMessage) {
        let normalized = normalize(&message.text);
        self.show_up_to(&normalized, normalized.len());
        self.streamed.clear();
        self.shown.clear();
        self.end_line();
        self.remember(message);
        match message.code_blocks.len() {
            0 => {}
            1 => self.warn("1 code block (:copy 1, :run 1)"),
            n => self.warn(&format!("{n} code blocks (:copy N, :run N)")),
        }
    }

    fn render_assistant_message(&mut self, message: &RenderedMessage) {
        let body = if self.html {
            message.html()
        } else {
            normalize(&message.text)
        };
        self.say(&format!("{ASSISTANT_PREFIX}{body}"));
        self.remember(message);
    }

    fn notify(&mut self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Notice => self.warn(&notice.message),
            NoticeLevel::Error => self.warn(&format!("Error: {}", notice.message)),
        }
    }

    fn redirect(&mut self, url: &str) {
        let login = self.login_url(url);
        self.warn(&format!(
            "Not logged in. Log in at {login} and put the session cookie in `session_cookie`."
        ));
    }

    fn location_changed(&mut self, url: &Url) {
        self.warn(&format!("Dialog saved at {url}"));
    }
}

/// Length of the prefix of a normalized reply that later text cannot change.
///
/// A trailing unclosed `<` may still become a thinking tag, and a trailing
/// backslash may still start a math delimiter.
fn settled_len(normalized: &str) -> usize {
    let mut end = normalized.len();
    if let Some(open) = normalized.rfind('<')
        && !normalized[open..].contains('>')
    {
        end = open;
    }
    if normalized[..end].ends_with('\\') {
        end -= 1;
    }
    end
}
