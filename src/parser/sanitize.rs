//! Markup sanitization for feed and article bodies
//!
//! Stored content uses a lightweight markup: a sequence of `<p>…</p>`
//! paragraphs with plain text inside. These helpers reduce whatever a source
//! delivers to that form.

use regex::Regex;
use std::sync::LazyLock;

use crate::utils::normalize_whitespace;

// Pre-compiled regex patterns for performance
static IMG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<img\b[^>]*>").expect("Invalid regex pattern"));

static PARAGRAPH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<p(?:\s[^>]*)?>(.*?)</p\s*>").expect("Invalid regex pattern")
});

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("Invalid regex pattern"));

/// Remove every `<img>` tag
///
/// # Examples
///
/// ```
/// use feedmill::parser::sanitize::strip_img_tags;
///
/// let html = r#"<p>Встреча<img src="a.jpg"/></p>"#;
/// assert_eq!(strip_img_tags(html), "<p>Встреча</p>");
/// ```
pub fn strip_img_tags(html: &str) -> String {
    IMG_REGEX.replace_all(html, "").into_owned()
}

/// Remove every tag, keeping text only
pub fn strip_tags(html: &str) -> String {
    TAG_REGEX.replace_all(html, "").into_owned()
}

/// Decode HTML entities (`&nbsp;`, `&laquo;`, numeric references, ...)
pub fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text)
        .replace('\u{a0}', " ")
}

/// Wrap plain text in a paragraph, or return `None` when it is blank
pub fn paragraph(text: &str) -> Option<String> {
    let text = normalize_whitespace(text);
    if text.is_empty() {
        None
    } else {
        Some(format!("<p>{text}</p>"))
    }
}

/// Reduce arbitrary HTML to clean `<p>` paragraphs
///
/// Only the text of `<p>` elements survives: attributes and nested tags are
/// dropped, entities decoded, whitespace collapsed. Each paragraph ends with a
/// newline; blank paragraphs are skipped.
///
/// # Examples
///
/// ```
/// use feedmill::parser::sanitize::clean_paragraph_html;
///
/// let html = r#"<div><p class="x">Первый <b>абзац</b></p><span>мусор</span><p> </p></div>"#;
/// assert_eq!(clean_paragraph_html(html), "<p>Первый абзац</p>\n");
/// ```
pub fn clean_paragraph_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());

    for caps in PARAGRAPH_REGEX.captures_iter(html) {
        let inner = caps.get(1).map_or("", |m| m.as_str());
        let text = decode_entities(&strip_tags(inner));
        if let Some(p) = paragraph(&text) {
            out.push_str(&p);
            out.push('\n');
        }
    }

    out
}
