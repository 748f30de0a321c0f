//! Case-, accent- and punctuation-insensitive text form used for lookups.
//!
//! Terms, lexical FORM values, definition texts and translation meanings
//! are compared through this form so that `TésTé.?` is found by a query
//! for `teste`.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize text for comparison: NFD-decompose, drop combining marks,
/// lowercase, keep only alphanumerics and single spaces.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.nfd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
        } else if ch.is_whitespace() && !out.is_empty() && !out.ends_with(' ') {
            out.push(' ');
        }
        // Everything else (punctuation, symbols) is dropped.
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}
