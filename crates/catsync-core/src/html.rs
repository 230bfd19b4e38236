//! Markup stripping for product descriptions.
//!
//! Source descriptions arrive as storefront HTML. The ad catalog and the
//! CSV feeds want plain text: block-closing tags become newlines, every
//! other tag is dropped, a small set of entities is decoded, and whitespace
//! is collapsed.

use std::sync::LazyLock;

use regex::Regex;

static BLOCK_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(?:p|div|li|ul|ol|h[1-6]|tr|table|blockquote)\s*>|<br\s*/?>")
        .expect("valid block-close regex")
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid space regex"));
static NEWLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\n\s*").expect("valid newline regex"));
static MULTI_NEWLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid multi-newline regex"));

/// Strips markup from a description, returning plain text.
#[must_use]
pub fn strip_markup(input: &str) -> String {
    let text = BLOCK_CLOSE_RE.replace_all(input, "\n");
    let text = TAG_RE.replace_all(&text, "");
    let text = decode_entities(&text);
    let text = SPACE_RE.replace_all(&text, " ");
    let text = NEWLINE_RE.replace_all(&text, "\n");
    let text = MULTI_NEWLINE_RE.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Truncates to at most `max` characters, respecting char boundaries.
#[must_use]
pub fn truncate_chars(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        input.to_string()
    } else {
        input.chars().take(max).collect()
    }
}

/// Decodes the entity subset the source store actually emits. `&amp;` goes
/// last so it cannot re-introduce decodable sequences.
fn decode_entities(input: &str) -> String {
    input
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
