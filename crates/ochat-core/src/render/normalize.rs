//! Pre-markdown text normalization.
//!
//! Model output uses thinking tags and TeX delimiters that collide with
//! markdown escaping. This runs before every markdown render, on every
//! growing prefix of a streamed reply, so it must not depend on seeing the
//! whole text.

/// Marker that replaces an opening thinking tag.
pub const THINK_BEGIN: &str = "**Think begin**";
/// Marker that replaces a closing thinking tag.
pub const THINK_END: &str = "**Think end**";

const OPEN_TAGS: [&str; 3] = ["<think>", "<thinking>", "<thought>"];
const CLOSE_TAGS: [&str; 3] = ["</think>", "</thinking>", "</thought>"];

/// Normalizes raw model text for markdown rendering.
///
/// 1. Opening thinking tags become [`THINK_BEGIN`].
/// 2. Closing thinking tags become [`THINK_END`].
/// 3. Unescaped `\(`, `\)`, `\[`, `\]` get their backslash doubled so the
///    delimiter survives markdown's backslash escapes.
pub fn normalize(text: &str) -> String {
    let mut out = substitute_thinking_tags(text);
    if out.contains('\\') {
        out = escape_math_delimiters(&out);
    }
    out
}

/// Replaces all recognized thinking tags with bold markers.
pub fn substitute_thinking_tags(text: &str) -> String {
    let mut out = text.to_string();
    for tag in OPEN_TAGS {
        if out.contains(tag) {
            out = out.replace(tag, THINK_BEGIN);
        }
    }
    for tag in CLOSE_TAGS {
        if out.contains(tag) {
            out = out.replace(tag, THINK_END);
        }
    }
    out
}

/// Doubles the backslash of math delimiters not already preceded by one.
pub fn escape_math_delimiters(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut prev: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\\'
            && prev != Some('\\')
            && matches!(chars.peek(), Some('(' | ')' | '[' | ']'))
        {
            out.push_str("\\\\");
        } else {
            out.push(ch);
        }
        prev = Some(ch);
    }

    out
}
