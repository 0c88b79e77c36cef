//! Post-processing for description text
//!
//! CurseForge serves addon descriptions and file changelogs as HTML. A
//! formatter set as the registry's default is attached to every
//! [`Description`](crate::records::Description) returned from a dispatch.

use regex::Regex;
use std::fmt;
use std::sync::{Arc, LazyLock};

pub trait Formatter: fmt::Debug + Send + Sync {
    fn format(&self, data: &str) -> String;
}

pub type SharedFormatter = Arc<dyn Formatter>;

/// Returns the text unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFormatter;

impl Formatter for NullFormatter {
    fn format(&self, data: &str) -> String {
        data.to_string()
    }
}

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern compiles"));

/// Removes HTML tags with a regular expression
///
/// Not an HTML parser: entities are left alone and a stray `<` inside text
/// eats everything up to the next `>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripHtml;

impl StripHtml {
    pub fn new() -> Self {
        Self
    }
}

impl Formatter for StripHtml {
    fn format(&self, data: &str) -> String {
        TAG.replace_all(data, "").into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_formatter_is_identity() {
        let html = "<p>Hello <b>world</b></p>";
        assert_eq!(NullFormatter.format(html), html);
    }

    #[test]
    fn test_strip_html_removes_tags() {
        let html = r#"<p class="lead">Adds <a href="https://x">dragons</a>.</p><br/>"#;
        assert_eq!(StripHtml::new().format(html), "Adds dragons.");
    }

    #[test]
    fn test_strip_html_keeps_plain_text() {
        assert_eq!(StripHtml::new().format("no markup & more"), "no markup & more");
    }
}
