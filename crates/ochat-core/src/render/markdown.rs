//! Markdown to node tree rendering.
//!
//! Uses pulldown-cmark with CommonMark plus tables. Raw HTML in the input is
//! never turned into elements: HTML blocks and inline HTML come out as
//! literal text, so untrusted model output can only produce the markup the
//! renderer itself emits.

use pulldown_cmark::{Alignment, CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use super::tree::{Element, Node};

/// URL schemes refused for links and images.
const BLOCKED_SCHEMES: [&str; 4] = ["javascript:", "vbscript:", "file:", "data:"];

/// Renders markdown into a list of top-level nodes.
pub fn render_markdown(text: &str) -> Vec<Node> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    let parser = Parser::new_ext(text, options);
    let mut renderer = TreeRenderer::new();

    for event in parser {
        renderer.process_event(event);
    }

    renderer.finish()
}

/// Internal state for tree rendering.
struct TreeRenderer {
    /// Open elements; index 0 is a synthetic root.
    stack: Vec<Element>,
    /// Column alignments of the current table.
    table_alignments: Vec<Alignment>,
    /// Current cell index within the row.
    table_cell: usize,
    /// Are we in the table header row?
    in_table_head: bool,
    /// Is a `tbody` open for the current table?
    in_table_body: bool,
}

impl TreeRenderer {
    fn new() -> Self {
        Self {
            stack: vec![Element::new("root")],
            table_alignments: Vec::new(),
            table_cell: 0,
            in_table_head: false,
            in_table_body: false,
        }
    }

    fn current(&mut self) -> &mut Element {
        // The synthetic root is never popped.
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn open(&mut self, element: Element) {
        self.stack.push(element);
    }

    fn close(&mut self) {
        if self.stack.len() > 1
            && let Some(element) = self.stack.pop()
        {
            self.current().children.push(Node::Element(element));
        }
    }

    fn process_event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.current().push_text(&text),
            Event::Code(code) => {
                let code = Element::new("code").with_text(code.to_string());
                self.current().children.push(code.into());
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                // Raw HTML is shown, never interpreted.
                self.current().push_text(&html);
            }
            Event::SoftBreak => self.current().push_text("\n"),
            Event::HardBreak => {
                self.current().children.push(Element::new("br").into());
                self.current().push_text("\n");
            }
            Event::Rule => self.current().children.push(Element::new("hr").into()),
            Event::FootnoteReference(label) => {
                self.current().push_text(&format!("[^{label}]"));
            }
            Event::TaskListMarker(checked) => {
                self.current().push_text(if checked { "[x] " } else { "[ ] " });
            }
            Event::InlineMath(math) => self.current().push_text(&format!("${math}$")),
            Event::DisplayMath(math) => self.current().push_text(&format!("$${math}$$")),
        }
    }

    fn start_tag(&mut self, tag: Tag) {
        match tag {
            Tag::Paragraph => self.open(Element::new("p")),
            Tag::Heading { level, .. } => self.open(Element::new(heading_tag(level))),
            Tag::BlockQuote(_) => self.open(Element::new("blockquote")),
            Tag::CodeBlock(kind) => {
                let mut code = Element::new("code");
                if let CodeBlockKind::Fenced(info) = kind
                    && let Some(lang) = info.split_whitespace().next()
                {
                    code.set_attr("class", format!("language-{lang}"));
                }
                self.open(Element::new("pre"));
                self.open(code);
            }
            // With raw HTML disabled an HTML block reads as a paragraph of text.
            Tag::HtmlBlock => self.open(Element::new("p")),
            Tag::List(Some(start)) => {
                let mut list = Element::new("ol");
                if start != 1 {
                    list.set_attr("start", start.to_string());
                }
                self.open(list);
            }
            Tag::List(None) => self.open(Element::new("ul")),
            Tag::Item => self.open(Element::new("li")),
            Tag::Table(alignments) => {
                self.table_alignments = alignments;
                self.in_table_body = false;
                self.open(Element::new("table"));
            }
            Tag::TableHead => {
                self.in_table_head = true;
                self.table_cell = 0;
                self.open(Element::new("thead"));
                self.open(Element::new("tr"));
            }
            Tag::TableRow => {
                if !self.in_table_body {
                    self.in_table_body = true;
                    self.open(Element::new("tbody"));
                }
                self.table_cell = 0;
                self.open(Element::new("tr"));
            }
            Tag::TableCell => {
                let mut cell = Element::new(if self.in_table_head { "th" } else { "td" });
                if let Some(style) = self
                    .table_alignments
                    .get(self.table_cell)
                    .and_then(|a| alignment_style(*a))
                {
                    cell.set_attr("style", style);
                }
                self.open(cell);
            }
            Tag::Emphasis => self.open(Element::new("em")),
            Tag::Strong => self.open(Element::new("strong")),
            Tag::Strikethrough => self.open(Element::new("s")),
            Tag::Link {
                dest_url, title, ..
            } => {
                let mut link = Element::new("a");
                if is_safe_url(&dest_url) {
                    link.set_attr("href", dest_url.to_string());
                }
                if !title.is_empty() {
                    link.set_attr("title", title.to_string());
                }
                self.open(link);
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                let mut image = Element::new("img");
                if is_safe_url(&dest_url) {
                    image.set_attr("src", dest_url.to_string());
                }
                if !title.is_empty() {
                    image.set_attr("title", title.to_string());
                }
                self.open(image);
            }
            _ => self.open(Element::new("div")),
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::CodeBlock => {
                self.close(); // code
                self.close(); // pre
            }
            TagEnd::TableHead => {
                self.in_table_head = false;
                self.close(); // tr
                self.close(); // thead
            }
            TagEnd::TableCell => {
                self.table_cell += 1;
                self.close();
            }
            TagEnd::Table => {
                if self.in_table_body {
                    self.in_table_body = false;
                    self.close(); // tbody
                }
                self.table_alignments.clear();
                self.close();
            }
            TagEnd::Image => {
                // Alt text arrives as children; fold it into the attribute.
                let image = self.current();
                let alt = image.text_content();
                image.children.clear();
                image.set_attr("alt", alt);
                self.close();
            }
            _ => self.close(),
        }
    }

    fn finish(mut self) -> Vec<Node> {
        // Unterminated constructs on a streamed prefix are closed here.
        while self.stack.len() > 1 {
            self.close();
        }
        self.stack.pop().map(|root| root.children).unwrap_or_default()
    }
}

fn heading_tag(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    }
}

fn alignment_style(alignment: Alignment) -> Option<&'static str> {
    match alignment {
        Alignment::None => None,
        Alignment::Left => Some("text-align:left"),
        Alignment::Center => Some("text-align:center"),
        Alignment::Right => Some("text-align:right"),
    }
}

fn is_safe_url(url: &str) -> bool {
    let lowered = url.trim().to_ascii_lowercase();
    !BLOCKED_SCHEMES
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(text: &str) -> String {
        render_markdown(text)
            .iter()
            .map(|node| match node {
                Node::Element(el) => el.to_html(),
                Node::Text(t) => t.clone(),
            })
            .collect()
    }

    #[test]
    fn test_paragraph_and_emphasis() {
        assert_eq!(
            html("Hello *world* and **bold**"),
            "<p>Hello <em>world</em> and <strong>bold</strong></p>"
        );
    }

    #[test]
    fn test_fenced_code_gets_language_class() {
        assert_eq!(
            html("```python\nprint(1)\n```"),
            "<pre><code class=\"language-python\">print(1)\n</code></pre>"
        );
    }

    #[test]
    fn test_unterminated_code_block_on_prefix() {
        let out = html("```rust\nfn main() {");
        assert!(out.starts_with("<pre><code class=\"language-rust\">fn main() {"));
        assert!(out.ends_with("</code></pre>"));
    }

    #[test]
    fn test_raw_html_block_is_literal_text() {
        let out = html("<script>alert(1)</script>");
        assert!(!out.contains("<script>"), "got {out}");
        assert!(out.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    }

    #[test]
    fn test_inline_html_is_literal_text() {
        let out = html("click <img src=x onerror=alert(1)> here");
        assert!(!out.contains("<img"), "got {out}");
        assert!(out.contains("&lt;img src=x onerror=alert(1)&gt;"));
    }

    #[test]
    fn test_javascript_links_drop_href() {
        let out = html("[x](javascript:alert(1))");
        assert_eq!(out, "<p><a>x</a></p>");
        let out = html("[x](https://example.com \"T\")");
        assert_eq!(out, "<p><a href=\"https://example.com\" title=\"T\">x</a></p>");
    }

    #[test]
    fn test_image_alt_from_children() {
        assert_eq!(
            html("![a cat](cat.png)"),
            "<p><img src=\"cat.png\" alt=\"a cat\"></p>"
        );
    }

    #[test]
    fn test_table_structure() {
        let out = html("| a | b |\n|:--|--:|\n| 1 | 2 |\n");
        assert_eq!(
            out,
            "<table><thead><tr><th style=\"text-align:left\">a</th><th style=\"text-align:right\">b</th></tr></thead>\
             <tbody><tr><td style=\"text-align:left\">1</td><td style=\"text-align:right\">2</td></tr></tbody></table>"
        );
    }

    #[test]
    fn test_ordered_list_start() {
        assert_eq!(html("3. three\n4. four"), "<ol start=\"3\"><li>three</li><li>four</li></ol>");
    }

    #[test]
    fn test_escaped_math_delimiter_survives() {
        // `\\(` in markdown renders as a literal `\(`.
        assert_eq!(html(r"\\(x\\)"), r"<p>\(x\)</p>");
    }

    #[test]
    fn test_empty_input() {
        assert!(render_markdown("").is_empty());
    }
}
