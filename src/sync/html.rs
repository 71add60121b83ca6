//! HTML cleaning for rich-text fields.
//!
//! Descriptions edited in the website builder carry inline styles and
//! `<style>` blocks from the source theme. They are stripped on import;
//! every other tag is kept.

use std::sync::LazyLock;

use regex::Regex;

static STYLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").expect("valid regex")
});

static STYLE_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+style\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).expect("valid regex")
});

/// Remove `<style>` elements and `style` attributes.
#[must_use]
pub fn clean_html(html: &str) -> String {
    let without_blocks = STYLE_BLOCK.replace_all(html, "");
    STYLE_ATTRIBUTE
        .replace_all(&without_blocks, "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_style_blocks_and_attributes() {
        let html = r#"<style>.o_x { color: red; }</style><p style="color: red" class="lead">Hi <b STYLE='x'>there</b></p>"#;
        assert_eq!(clean_html(html), r#"<p class="lead">Hi <b>there</b></p>"#);
    }

    #[test]
    fn test_keeps_unknown_tags_and_text() {
        let html = "<section><custom-tag>Data</custom-tag> styles are fine</section>";
        assert_eq!(clean_html(html), html);
    }

    #[test]
    fn test_multiline_style_block() {
        let html = "<div>\n<STYLE type=\"text/css\">\np { margin: 0 }\n</STYLE>\n<p>Body</p></div>";
        assert_eq!(clean_html(html), "<div>\n\n<p>Body</p></div>");
    }
}
