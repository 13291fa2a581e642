//! Owned element/text tree standing in for a DOM subtree.

use std::fmt::Write;

/// Elements serialized without a closing tag.
const VOID_TAGS: [&str; 4] = ["br", "hr", "img", "input"];

/// A node in a rendered message tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                for child in &el.children {
                    child.collect_text(out);
                }
            }
        }
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::Element(el) => el.write_html(out),
        }
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    #[must_use]
    pub fn with_class(self, class: impl Into<String>) -> Self {
        self.with_attr("class", class)
    }

    #[must_use]
    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_child(Node::Text(text.into()))
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(key, _)| *key == name) {
            slot.1 = value;
        } else {
            self.attrs.push((name, value));
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let classes = match self.attr("class") {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.set_attr("class", classes);
    }

    /// Appends text, merging with a trailing text node.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.collect_text(&mut out);
        }
        out
    }

    /// Child elements in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Node at a child-index path relative to this element.
    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.children.get(*first)?;
        for index in rest {
            node = node.as_element()?.children.get(*index)?;
        }
        Some(node)
    }

    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.children.get_mut(*first)?;
        for index in rest {
            node = node.as_element_mut()?.children.get_mut(*index)?;
        }
        Some(node)
    }

    /// Element at a path; the empty path is this element.
    pub fn element_at_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        if path.is_empty() {
            return Some(self);
        }
        self.node_at_mut(path)?.as_element_mut()
    }

    /// Visits every descendant element with its path, parents first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&[usize], &'a Element)) {
        let mut path = Vec::new();
        self.walk_inner(&mut path, visit);
    }

    fn walk_inner<'a>(&'a self, path: &mut Vec<usize>, visit: &mut dyn FnMut(&[usize], &'a Element)) {
        for (index, child) in self.children.iter().enumerate() {
            if let Node::Element(el) = child {
                path.push(index);
                visit(path, el);
                el.walk_inner(path, visit);
                path.pop();
            }
        }
    }

    /// Serializes the element (including itself) as HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    /// Serializes only the children as HTML.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.write_html(&mut out);
        }
        out
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attrs {
            let _ = write!(out, " {name}=\"{}\"", escape_attr(value));
        }
        out.push('>');
        if VOID_TAGS.contains(&self.tag.as_str()) {
            return;
        }
        for child in &self.children {
            child.write_html(out);
        }
        let _ = write!(out, "</{}>", self.tag);
    }
}

/// Escapes text content for HTML output.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escapes an attribute value for HTML output.
pub fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Element {
        Element::new("div")
            .with_class("content")
            .with_child(Element::new("p").with_text("a < b"))
            .with_child(
                Element::new("pre").with_child(
                    Element::new("code")
                        .with_class("language-rust")
                        .with_text("fn main() {}"),
                ),
            )
    }

    #[test]
    fn test_to_html_escapes_text_and_attrs() {
        let el = Element::new("a")
            .with_attr("href", "x\"y")
            .with_text("<b>");
        assert_eq!(el.to_html(), "<a href=\"x&quot;y\">&lt;b&gt;</a>");
    }

    #[test]
    fn test_void_elements_have_no_closing_tag() {
        let el = Element::new("p")
            .with_text("a")
            .with_child(Element::new("br"))
            .with_text("b");
        assert_eq!(el.to_html(), "<p>a<br>b</p>");
    }

    #[test]
    fn test_node_at_follows_paths() {
        let root = sample();
        let code = root.node_at(&[1, 0]).and_then(Node::as_element).unwrap();
        assert_eq!(code.tag, "code");
        assert!(code.has_class("language-rust"));
        assert!(root.node_at(&[5]).is_none());
        assert!(root.node_at(&[]).is_none());
    }

    #[test]
    fn test_walk_visits_in_document_order() {
        let root = sample();
        let mut seen = Vec::new();
        root.walk(&mut |path, el| seen.push((path.to_vec(), el.tag.clone())));
        assert_eq!(
            seen,
            vec![
                (vec![0], "p".to_string()),
                (vec![1], "pre".to_string()),
                (vec![1, 0], "code".to_string()),
            ]
        );
    }

    #[test]
    fn test_push_text_merges_adjacent_text() {
        let mut el = Element::new("p");
        el.push_text("Hello");
        el.push_text(", world");
        assert_eq!(el.children, vec![Node::text("Hello, world")]);
    }

    #[test]
    fn test_add_class_is_stable() {
        let mut el = Element::new("code").with_class("language-python");
        el.add_class("hljs");
        el.add_class("hljs");
        assert_eq!(el.attr("class"), Some("language-python hljs"));
    }
}
