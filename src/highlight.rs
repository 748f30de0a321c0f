//! Highlight spans mark where the linked term occurs inside an example or
//! translation sentence.
//!
//! Clients submit sentences with the occurrence wrapped in `*` markers
//! (`"Yesterday I had lunch at my mother's *house*."`). The markers are
//! stripped before storage and the span survives as a pair of inclusive
//! character indices into the clean text, so the stored sentence stays
//! plain and the client can re-render the emphasis however it likes.

use thiserror::Error;

/// Marker character delimiting a highlighted span in submitted text.
pub const MARKER: char = '*';

/// An inclusive `[start, end]` pair of character indices.
pub type Span = (usize, usize);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HighlightError {
    #[error("text must contain at least one highlighted span delimited by '*'")]
    Missing,

    #[error("unbalanced highlight marker")]
    Unbalanced,

    #[error("empty highlight span")]
    Empty,

    #[error("highlight spans must be ordered, non-overlapping and inside the text")]
    Invalid,
}

/// Strip `*` markers from `text`, returning the clean text and the spans
/// the markers delimited.
///
/// Spans are character-indexed into the clean text, inclusive on both
/// ends. At least one span is required; empty (`**`) and unclosed spans
/// are rejected.
pub fn extract(text: &str) -> Result<(String, Vec<Span>), HighlightError> {
    let mut clean = String::with_capacity(text.len());
    let mut spans = Vec::new();
    let mut clean_len = 0usize;
    let mut open: Option<usize> = None;

    for ch in text.chars() {
        if ch == MARKER {
            match open.take() {
                None => open = Some(clean_len),
                Some(start) => {
                    if clean_len == start {
                        return Err(HighlightError::Empty);
                    }
                    spans.push((start, clean_len - 1));
                }
            }
        } else {
            clean.push(ch);
            clean_len += 1;
        }
    }

    if open.is_some() {
        return Err(HighlightError::Unbalanced);
    }
    if spans.is_empty() {
        return Err(HighlightError::Missing);
    }
    Ok((clean, spans))
}

/// Check that spans are ordered by start, each `start <= end`, pairwise
/// non-overlapping and within a text of `len` characters.
pub fn validate(spans: &[Span], len: usize) -> Result<(), HighlightError> {
    if spans.is_empty() {
        return Err(HighlightError::Missing);
    }
    let mut previous_end: Option<usize> = None;
    for &(start, end) in spans {
        if start > end || end >= len {
            return Err(HighlightError::Invalid);
        }
        if let Some(prev) = previous_end {
            if start <= prev {
                return Err(HighlightError::Invalid);
            }
        }
        previous_end = Some(end);
    }
    Ok(())
}

/// Re-insert markers around the given spans. Spans must be valid for
/// `text`; out-of-range spans are clamped to the text end.
pub fn apply(text: &str, spans: &[Span]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + spans.len() * 2);
    let mut next = spans.iter().peekable();
    let mut in_span: Option<usize> = None;

    for (i, ch) in chars.iter().enumerate() {
        if in_span.is_none() {
            if let Some(&&(start, end)) = next.peek() {
                if i == start {
                    out.push(MARKER);
                    in_span = Some(end);
                    next.next();
                }
            }
        }
        out.push(*ch);
        if in_span == Some(i) {
            out.push(MARKER);
            in_span = None;
        }
    }
    if in_span.is_some() {
        out.push(MARKER);
    }
    out
}
