//! Plain-text previews for note list views.
//!
//! # Responsibility
//! - Derive `preview_text` and `preview_image` from serialized editor HTML.
//!
//! # Invariants
//! - `preview_text` holds at most [`PREVIEW_TEXT_MAX_CHARS`] characters and
//!   contains no markup.
//! - Derivation is pure; it never touches storage.

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum characters kept in `preview_text`.
pub const PREVIEW_TEXT_MAX_CHARS: usize = 100;

static HTML_IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).expect("valid image regex")
});
static HTML_BLOCK_BREAK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?(p|div|br|li|h[1-6]|blockquote|pre|tr|td|th)\b[^>]*>")
        .expect("valid block regex")
});
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Preview projection derived from note content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentPreview {
    /// Markup-free summary text.
    pub preview_text: Option<String>,
    /// `src` of the first image.
    pub preview_image: Option<String>,
}

/// Derives preview fields from editor HTML.
///
/// Block-level tags become spaces so adjacent paragraphs do not fuse, other
/// tags are dropped, common entities are decoded and whitespace collapsed.
pub fn derive_content_preview(content: &str) -> ContentPreview {
    let preview_image = HTML_IMAGE_RE
        .captures(content)
        .and_then(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|value| !value.is_empty());

    let with_breaks = HTML_BLOCK_BREAK_RE.replace_all(content, " ");
    let without_tags = HTML_TAG_RE.replace_all(&with_breaks, "");
    let decoded = decode_entities(&without_tags);
    let normalized = WHITESPACE_RE.replace_all(&decoded, " ");
    let trimmed = normalized.trim();
    let preview_text = if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(PREVIEW_TEXT_MAX_CHARS).collect())
    };

    ContentPreview {
        preview_text,
        preview_image,
    }
}

fn decode_entities(text: &str) -> String {
    // &amp; last so "&amp;lt;" decodes to "&lt;" rather than "<".
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::{derive_content_preview, PREVIEW_TEXT_MAX_CHARS};

    #[test]
    fn extracts_first_image_src() {
        let preview = derive_content_preview(
            r#"<p>x</p><img src="one.png" alt="a"><p><img class="rounded-lg" src='two.png'></p>"#,
        );
        assert_eq!(preview.preview_image.as_deref(), Some("one.png"));
    }

    #[test]
    fn strips_markup_and_keeps_paragraphs_apart() {
        let preview = derive_content_preview(
            "<h1>Groceries</h1><ul><li><p>Milk &amp; eggs</p></li></ul><p><strong>Bread</strong></p>",
        );
        assert_eq!(
            preview.preview_text.as_deref(),
            Some("Groceries Milk & eggs Bread")
        );
    }

    #[test]
    fn empty_editor_document_has_no_preview_text() {
        assert_eq!(derive_content_preview("<p></p>").preview_text, None);
        assert_eq!(derive_content_preview("").preview_text, None);
    }

    #[test]
    fn limits_preview_length() {
        let long = format!("<p>{}</p>", "word ".repeat(100));
        let text = derive_content_preview(&long).preview_text.unwrap();
        assert!(text.chars().count() <= PREVIEW_TEXT_MAX_CHARS);
    }
}
