// src/mentions.rs
//! Ticker mention extraction and snippet merging.
//!
//! Matching is literal, case-sensitive substring search: report text is
//! mostly Korean, so tokenized word matching would miss more than it finds.
//! Every match gets a symmetric character window around it, and the batch is
//! deduplicated by a cheap 200-character prefix fingerprint. Two genuinely
//! different long snippets sharing a prefix collapse into one — downstream
//! consumers rely on this granularity, so keep it.

use std::collections::BTreeSet;

/// Characters kept on each side of a match.
const SNIPPET_WINDOW: usize = 120;
/// Prefix length used as the intra-batch dedup fingerprint.
const FINGERPRINT_CHARS: usize = 200;
/// Hard cap on snippets returned per (report, ticker) pass.
const MAX_SNIPPETS: usize = 10;

/// Find all literal occurrences of the ticker's code and display name in
/// `text` and return up to [`MAX_SNIPPETS`] context snippets in span order.
/// No occurrence is the common case and returns an empty vec.
pub fn extract_mentions(text: &str, symbol: &str, name: &str) -> Vec<String> {
    let mut spans: Vec<(usize, usize)> = Vec::new();

    if !symbol.is_empty() {
        for (at, m) in text.match_indices(symbol) {
            spans.push((at, at + m.len()));
        }
    }
    if !name.is_empty() {
        for (at, m) in text.match_indices(name) {
            spans.push((at, at + m.len()));
        }
    }

    if spans.is_empty() {
        return Vec::new();
    }
    spans.sort();

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for (a, b) in spans {
        let snippet = window_around(text, a, b);
        let fingerprint: String = snippet.chars().take(FINGERPRINT_CHARS).collect();
        if seen.insert(fingerprint) {
            out.push(snippet);
            if out.len() == MAX_SNIPPETS {
                break;
            }
        }
    }
    out
}

/// Character window of [`SNIPPET_WINDOW`] before byte offset `a` and after
/// `b`, clamped to the document, with embedded newlines collapsed to spaces.
/// Newline is the reserved storage delimiter, so it may not survive here.
fn window_around(text: &str, a: usize, b: usize) -> String {
    let start = text[..a]
        .char_indices()
        .rev()
        .nth(SNIPPET_WINDOW - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let end = text[b..]
        .char_indices()
        .nth(SNIPPET_WINDOW)
        .map(|(i, _)| b + i)
        .unwrap_or(text.len());

    text[start..end].replace('\n', " ").trim().to_string()
}

/// Merge previously stored snippets with a freshly extracted batch.
///
/// Union by exact string equality (not the prefix fingerprint): old snippets
/// survive even when the new pass found a narrower set. The union is returned
/// in the set's lexicographic order, not input order; deterministic, but a
/// re-run can reorder the stored lines.
pub fn merge_snippets(existing: &[String], new: &[String]) -> Vec<String> {
    let mut set: BTreeSet<String> = existing.iter().cloned().collect();
    set.extend(new.iter().cloned());
    set.into_iter().collect()
}
