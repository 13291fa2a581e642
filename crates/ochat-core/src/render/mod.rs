//! Rendering pipeline: normalize, markdown, highlight, decorate, diff, patch.

pub mod decorate;
pub mod diff;
pub mod highlight;
pub mod markdown;
pub mod normalize;
pub mod tree;

pub use decorate::{CodeAction, CodeBlock, ToolCapabilities};
pub use highlight::Highlighter;
pub use tree::{Element, Node};

use crate::error::ChatError;

/// Tag and class of the container holding one message's rendered content.
pub const MESSAGE_TAG: &str = "div";
pub const MESSAGE_CLASS: &str = "content";

/// Result of one reconcile call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Live tree already matched the text.
    Unchanged,
    /// This many patches were applied.
    Patched(usize),
    /// Diff or patch failed; the live tree may lag until the next call.
    Failed(ChatError),
}

/// A finished, fully rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub text: String,
    pub tree: Element,
    pub code_blocks: Vec<CodeBlock>,
}

impl RenderedMessage {
    /// HTML of the whole message, container included.
    pub fn html(&self) -> String {
        self.tree.to_html()
    }
}

/// Empty container for a message's rendered content.
pub fn message_container() -> Element {
    Element::new(MESSAGE_TAG).with_class(MESSAGE_CLASS)
}

/// Keeps a live tree in sync with a growing markdown text.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    highlighter: Highlighter,
    tools: ToolCapabilities,
}

impl Reconciler {
    pub fn new(highlighter: Highlighter, tools: ToolCapabilities) -> Self {
        Self { highlighter, tools }
    }

    pub fn set_tools(&mut self, tools: ToolCapabilities) {
        self.tools = tools;
    }

    /// Renders `raw` into a fresh scratch container.
    pub fn render(&self, raw: &str) -> Element {
        let normalized = normalize::normalize(raw);
        let mut scratch = message_container();
        scratch.children = markdown::render_markdown(&normalized);
        self.highlighter.highlight_tree(&mut scratch);
        decorate::insert_action_bars(&mut scratch, self.tools);
        scratch
    }

    /// Brings `live`'s children in line with the rendering of `raw`.
    pub fn reconcile(&self, live: &mut Element, raw: &str) -> Reconciliation {
        let scratch = self.render(raw);
        let patches = diff::diff(live, &scratch);
        if patches.is_empty() {
            return Reconciliation::Unchanged;
        }
        match diff::apply(live, &patches) {
            Ok(count) => {
                tracing::trace!(count, "applied render patches");
                Reconciliation::Patched(count)
            }
            Err(err) => {
                tracing::warn!(details = ?err.details, "reconcile failed: {err}");
                Reconciliation::Failed(err)
            }
        }
    }

    /// Renders a complete message without a live tree.
    pub fn render_static(&self, raw: &str) -> RenderedMessage {
        let tree = self.render(raw);
        self.finish(raw, tree)
    }

    /// Packages a reconciled live tree as a finished message.
    pub fn finish(&self, raw: &str, tree: Element) -> RenderedMessage {
        RenderedMessage {
            text: raw.to_string(),
            code_blocks: decorate::code_blocks(&tree, self.tools),
            tree,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_matches_render_after_each_call() {
        let reconciler = Reconciler::default();
        let mut live = message_container();
        let mut text = String::new();
        for chunk in ["<think>", "hmm", "</think>", "Use \\(x\\)", "\n\n```py", "thon\nx=1\n", "```"] {
            text.push_str(chunk);
            let result = reconciler.reconcile(&mut live, &text);
            assert!(!matches!(result, Reconciliation::Failed(_)));
            assert_eq!(live, reconciler.render(&text));
        }
    }

    #[test]
    fn test_same_text_twice_is_unchanged() {
        let reconciler = Reconciler::default();
        let mut live = message_container();
        assert!(matches!(
            reconciler.reconcile(&mut live, "**hi**"),
            Reconciliation::Patched(_)
        ));
        let snapshot = live.clone();
        assert_eq!(reconciler.reconcile(&mut live, "**hi**"), Reconciliation::Unchanged);
        assert_eq!(live, snapshot);
    }

    #[test]
    fn test_thinking_markers_rendered_bold() {
        let rendered = Reconciler::default().render_static("<think>plan</think>answer");
        assert!(rendered.html().contains("<strong>Think begin</strong>"));
        assert!(rendered.html().contains("<strong>Think end</strong>"));
    }

    #[test]
    fn test_html_is_wrapped_in_message_container() {
        let html = Reconciler::default().render_static("plain").html();
        assert!(html.starts_with("<div class=\"content\"><p>plain"));
        assert!(html.ends_with("</div>"));
    }

    #[test]
    fn test_math_delimiters_survive_rendering() {
        let rendered = Reconciler::default().render_static(r"Euler: \(e^{i\pi}+1=0\)");
        assert_eq!(rendered.tree.text_content(), r"Euler: \(e^{i\pi}+1=0\)");
    }

    #[test]
    fn test_finish_lists_code_blocks() {
        let reconciler = Reconciler::new(Highlighter::default(), ToolCapabilities { python: true });
        let rendered = reconciler.render_static("```python\nprint('x')\n```");
        assert_eq!(rendered.code_blocks.len(), 1);
        assert_eq!(rendered.code_blocks[0].code, "print('x')\n");
        assert!(rendered.code_blocks[0].allows(CodeAction::Execute));
        assert!(rendered.html().contains(decorate::EXECUTE_LABEL));
    }
}
