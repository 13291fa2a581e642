//! Code-block actions attached after rendering.

use serde::{Deserialize, Serialize};

use super::highlight::code_language;
use super::tree::{Element, Node};

pub const BUTTON_CONTAINER_CLASS: &str = "code-button-container";
pub const COPY_LABEL: &str = "Copy code";
pub const EXECUTE_LABEL: &str = "Execute code";

/// An action offered on a code block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeAction {
    Copy,
    Execute,
}

impl CodeAction {
    pub fn label(self) -> &'static str {
        match self {
            CodeAction::Copy => COPY_LABEL,
            CodeAction::Execute => EXECUTE_LABEL,
        }
    }

    fn class(self) -> &'static str {
        match self {
            CodeAction::Copy => "code-button copy-button",
            CodeAction::Execute => "code-button execute-button",
        }
    }
}

/// Server-side tools the client may call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCapabilities {
    #[serde(default)]
    pub python: bool,
}

/// A code block found in a rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Path of the `pre` element relative to the message root
    pub path: Vec<usize>,
    pub language: Option<String>,
    pub code: String,
    pub actions: Vec<CodeAction>,
}

impl CodeBlock {
    pub fn allows(&self, action: CodeAction) -> bool {
        self.actions.contains(&action)
    }
}

/// Actions allowed for a code block in `language`.
pub fn code_actions(language: Option<&str>, tools: ToolCapabilities) -> Vec<CodeAction> {
    let mut actions = Vec::with_capacity(2);
    if tools.python && language == Some("python") {
        actions.push(CodeAction::Execute);
    }
    actions.push(CodeAction::Copy);
    actions
}

/// Lists every `pre > code` block below `root`, in document order.
pub fn code_blocks(root: &Element, tools: ToolCapabilities) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    root.walk(&mut |path, el| {
        if el.tag != "pre" {
            return;
        }
        if let Some(code) = el.child_elements().find(|c| c.tag == "code") {
            let language = code_language(code);
            blocks.push(CodeBlock {
                path: path.to_vec(),
                actions: code_actions(language.as_deref(), tools),
                code: code.text_content(),
                language,
            });
        }
    });
    blocks
}

/// Inserts an action bar as the first child of every code block's `pre`.
///
/// Runs on the scratch tree before diffing, so the bar is part of the
/// rendered output and survives reconciliation unchanged.
pub fn insert_action_bars(root: &mut Element, tools: ToolCapabilities) {
    let actions = if root.tag == "pre" {
        root.child_elements()
            .find(|c| c.tag == "code")
            .map(|code| code_actions(code_language(code).as_deref(), tools))
    } else {
        None
    };
    if let Some(actions) = actions {
        if !root
            .child_elements()
            .any(|c| c.has_class(BUTTON_CONTAINER_CLASS))
        {
            root.children.insert(0, action_bar(&actions).into());
        }
        return;
    }
    for child in &mut root.children {
        if let Node::Element(el) = child {
            insert_action_bars(el, tools);
        }
    }
}

fn action_bar(actions: &[CodeAction]) -> Element {
    actions.iter().fold(
        Element::new("div").with_class(BUTTON_CONTAINER_CLASS),
        |bar, action| {
            bar.with_child(
                Element::new("button")
                    .with_class(action.class())
                    .with_attr("type", "button")
                    .with_text(action.label()),
            )
        },
    )
}
