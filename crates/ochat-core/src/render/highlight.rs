//! Syntax highlighting for rendered code blocks.

use std::sync::OnceLock;

use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Style as SynStyle, Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use super::tree::{Element, Node};

/// Theme used when the configured one is unknown.
pub const DEFAULT_THEME: &str = "InspiredGitHub";

static SYNTAXES: OnceLock<SyntaxSet> = OnceLock::new();
static THEMES: OnceLock<ThemeSet> = OnceLock::new();

fn syntax_set() -> &'static SyntaxSet {
    SYNTAXES.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn themes() -> &'static ThemeSet {
    THEMES.get_or_init(ThemeSet::load_defaults)
}

/// Highlights `pre > code.language-*` blocks in a rendered tree.
#[derive(Debug, Clone)]
pub struct Highlighter {
    theme_name: String,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new(DEFAULT_THEME)
    }
}

impl Highlighter {
    pub fn new(theme_name: impl Into<String>) -> Self {
        let theme_name = theme_name.into();
        if !themes().themes.contains_key(&theme_name) {
            tracing::warn!(theme = %theme_name, "unknown highlight theme, using {DEFAULT_THEME}");
            return Self {
                theme_name: DEFAULT_THEME.to_string(),
            };
        }
        Self { theme_name }
    }

    pub fn theme_name(&self) -> &str {
        &self.theme_name
    }

    fn theme(&self) -> Option<&'static Theme> {
        let themes = themes();
        themes
            .themes
            .get(&self.theme_name)
            .or_else(|| themes.themes.get(DEFAULT_THEME))
    }

    /// Highlights every code block below `root` in place.
    pub fn highlight_tree(&self, root: &mut Element) {
        let is_pre = root.tag == "pre";
        for child in &mut root.children {
            if let Node::Element(el) = child {
                if is_pre && el.tag == "code" {
                    self.highlight_code_element(el);
                } else {
                    self.highlight_tree(el);
                }
            }
        }
    }

    fn highlight_code_element(&self, code: &mut Element) {
        let Some(lang) = code_language(code) else {
            return;
        };
        let source = code.text_content();
        if let Some(nodes) = self.highlight(&lang, &source) {
            code.children = nodes;
            code.add_class("hljs");
        }
    }

    /// Highlights source text, returning styled span nodes.
    ///
    /// Returns `None` for unknown languages or when highlighting fails.
    pub fn highlight(&self, lang: &str, source: &str) -> Option<Vec<Node>> {
        let syntaxes = syntax_set();
        let syntax = syntaxes
            .find_syntax_by_token(lang)
            .or_else(|| syntaxes.find_syntax_by_extension(lang))?;
        let theme = self.theme()?;
        let mut lines = HighlightLines::new(syntax, theme);

        let mut runs: Vec<(SynStyle, String)> = Vec::new();
        for line in LinesWithEndings::from(source) {
            let ranges = match lines.highlight_line(line, syntaxes) {
                Ok(ranges) => ranges,
                Err(err) => {
                    tracing::warn!(lang, "highlighting failed: {err}");
                    return None;
                }
            };
            for (style, text) in ranges {
                match runs.last_mut() {
                    Some((last, buf)) if *last == style => buf.push_str(text),
                    _ => runs.push((style, text.to_string())),
                }
            }
        }

        Some(
            runs.into_iter()
                .map(|(style, text)| {
                    Element::new("span")
                        .with_attr("style", css_for(style))
                        .with_text(text)
                        .into()
                })
                .collect(),
        )
    }
}

/// Language named by a `language-*` class, if any.
pub fn code_language(code: &Element) -> Option<String> {
    code.attr("class")?
        .split_whitespace()
        .find_map(|class| class.strip_prefix("language-"))
        .filter(|lang| !lang.is_empty())
        .map(str::to_string)
}

fn css_for(style: SynStyle) -> String {
    let fg = style.foreground;
    let mut css = format!("color:#{:02x}{:02x}{:02x}", fg.r, fg.g, fg.b);
    if style.font_style.contains(FontStyle::BOLD) {
        css.push_str(";font-weight:bold");
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        css.push_str(";font-style:italic");
    }
    if style.font_style.contains(FontStyle::UNDERLINE) {
        css.push_str(";text-decoration:underline");
    }
    css
}
