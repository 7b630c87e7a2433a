// src/extract.rs
//! Plain-text extraction from fetched documents.
//!
//! HTML goes through a DOM parse so script/style payloads never leak into the
//! report text. PDF extraction is page-by-page: a page that fails to decode
//! contributes an empty string and the rest of the document still comes
//! through. An unreadable document yields empty text, which is a valid
//! outcome, not an error.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static TITLE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("valid selector"));
static RE_BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Flatten an HTML document to text, returning `(text, title)`.
/// Title is the `<title>` element's text when present, else empty.
pub fn html_to_text(html: &str) -> (String, String) {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&TITLE_SEL)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let mut raw = String::new();
    collect_text(doc.root_element(), &mut raw);

    let text = RE_BLANK_RUNS.replace_all(&raw, "\n\n").trim().to_string();
    (text, title)
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    // Non-content containers are dropped wholesale.
    if matches!(el.value().name(), "script" | "style" | "noscript" | "title") {
        return;
    }
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            collect_text(child_el, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
    // Element boundary acts as a line separator; runs are collapsed later.
    out.push('\n');
}

/// Extract text from PDF bytes, one entry per page, newline-joined.
pub fn pdf_to_text(bytes: &[u8]) -> String {
    let doc = match lopdf::Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(error = ?e, "unreadable pdf document, treating as empty");
            return String::new();
        }
    };

    let mut parts = Vec::new();
    for page_no in doc.get_pages().keys() {
        // A single bad page must not sink the document.
        parts.push(doc.extract_text(&[*page_no]).unwrap_or_default());
    }
    parts.join("\n").trim().to_string()
}
