//! Structural diff between two rendered trees and in-place patching.
//!
//! Only the children of the two roots are compared; the live root keeps its
//! own tag and attributes. Patches are ordered so that applying them one
//! after another against the old tree yields the new one: changes at shared
//! indices first, then appended children, then removals from the end.

use crate::error::{ChatError, ChatResult};

use super::tree::{Element, Node};

/// A single tree mutation. Paths are child indices relative to the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    /// Swap the node at `path` for a new one.
    Replace { path: Vec<usize>, node: Node },
    /// Set the content of the text node at `path`.
    SetText { path: Vec<usize>, text: String },
    /// Overwrite all attributes of the element at `path`.
    SetAttrs {
        path: Vec<usize>,
        attrs: Vec<(String, String)>,
    },
    /// Insert a child under the element at `parent`.
    Insert {
        parent: Vec<usize>,
        index: usize,
        node: Node,
    },
    /// Remove a child of the element at `parent`.
    Remove { parent: Vec<usize>, index: usize },
}

/// Computes the patches that turn `old`'s children into `new`'s.
///
/// Identical trees produce an empty list.
pub fn diff(old: &Element, new: &Element) -> Vec<Patch> {
    let mut patches = Vec::new();
    let mut path = Vec::new();
    diff_children(old, new, &mut path, &mut patches);
    patches
}

fn diff_children(old: &Element, new: &Element, path: &mut Vec<usize>, out: &mut Vec<Patch>) {
    let shared = old.children.len().min(new.children.len());

    for index in 0..shared {
        path.push(index);
        diff_node(&old.children[index], &new.children[index], path, out);
        path.pop();
    }

    for (index, node) in new.children.iter().enumerate().skip(shared) {
        out.push(Patch::Insert {
            parent: path.clone(),
            index,
            node: node.clone(),
        });
    }

    for index in (shared..old.children.len()).rev() {
        out.push(Patch::Remove {
            parent: path.clone(),
            index,
        });
    }
}

fn diff_node(old: &Node, new: &Node, path: &mut Vec<usize>, out: &mut Vec<Patch>) {
    match (old, new) {
        (Node::Text(a), Node::Text(b)) => {
            if a != b {
                out.push(Patch::SetText {
                    path: path.clone(),
                    text: b.clone(),
                });
            }
        }
        (Node::Element(a), Node::Element(b)) if a.tag == b.tag => {
            if a.attrs != b.attrs {
                out.push(Patch::SetAttrs {
                    path: path.clone(),
                    attrs: b.attrs.clone(),
                });
            }
            diff_children(a, b, path, out);
        }
        _ => out.push(Patch::Replace {
            path: path.clone(),
            node: new.clone(),
        }),
    }
}

/// Applies patches to `root` in order, returning how many were applied.
///
/// # Errors
/// Returns a render error when a patch addresses a node that does not exist
/// or has the wrong type. Patches before the failing one stay applied; the
/// caller is expected to re-diff on the next render.
pub fn apply(root: &mut Element, patches: &[Patch]) -> ChatResult<usize> {
    for (applied, patch) in patches.iter().enumerate() {
        apply_one(root, patch).map_err(|err| {
            err.with_details(format!("patch {applied} of {}: {patch:?}", patches.len()))
        })?;
    }
    Ok(patches.len())
}

fn apply_one(root: &mut Element, patch: &Patch) -> ChatResult<()> {
    match patch {
        Patch::Replace { path, node } => {
            let slot = root
                .node_at_mut(path)
                .ok_or_else(|| missing("replace", path))?;
            *slot = node.clone();
        }
        Patch::SetText { path, text } => match root.node_at_mut(path) {
            Some(Node::Text(slot)) => slot.clone_from(text),
            Some(Node::Element(_)) => {
                return Err(ChatError::render(format!(
                    "set-text target {path:?} is an element"
                )));
            }
            None => return Err(missing("set-text", path)),
        },
        Patch::SetAttrs { path, attrs } => {
            let el = root
                .element_at_mut(path)
                .ok_or_else(|| missing("set-attrs", path))?;
            el.attrs.clone_from(attrs);
        }
        Patch::Insert {
            parent,
            index,
            node,
        } => {
            let el = root
                .element_at_mut(parent)
                .ok_or_else(|| missing("insert", parent))?;
            if *index > el.children.len() {
                return Err(ChatError::render(format!(
                    "insert index {index} out of range under {parent:?}"
                )));
            }
            el.children.insert(*index, node.clone());
        }
        Patch::Remove { parent, index } => {
            let el = root
                .element_at_mut(parent)
                .ok_or_else(|| missing("remove", parent))?;
            if *index >= el.children.len() {
                return Err(ChatError::render(format!(
                    "remove index {index} out of range under {parent:?}"
                )));
            }
            el.children.remove(*index);
        }
    }
    Ok(())
}

fn missing(op: &str, path: &[usize]) -> ChatError {
    ChatError::render(format!("{op} target {path:?} not found"))
}
