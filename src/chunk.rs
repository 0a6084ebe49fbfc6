//! Overlapping fixed-size window chunker.
//!
//! Splits a document's text into fragments of at most `window` characters,
//! with consecutive fragments overlapping by `overlap` characters. Windows
//! are measured in characters and sliced on char boundaries, so multi-byte
//! text never splits mid-codepoint.
//!
//! Each fragment carries its `(source, page)` provenance and a SHA-256
//! hash of its text. Sequence numbers and ids are assigned afterwards by
//! [`crate::ids::assign_ids`].
//!
//! Splitting is deterministic: the same document and parameters yield
//! byte-identical fragment boundaries every time. No side effects.

use sha2::{Digest, Sha256};

use crate::error::EngineError;
use crate::models::{Fragment, SourceDocument};

/// Split a document into overlapping fixed-size fragments.
///
/// The window advances `window - overlap` characters per step, so each
/// fragment repeats the last `overlap` characters of its predecessor.
/// Whitespace-only documents yield no fragments.
///
/// # Errors
///
/// `InvalidChunkConfig` if `window` is zero or `overlap >= window`.
/// Validated before anything else touches the text.
pub fn split_document(
    doc: &SourceDocument,
    window: usize,
    overlap: usize,
) -> Result<Vec<Fragment>, EngineError> {
    if window == 0 || overlap >= window {
        return Err(EngineError::InvalidChunkConfig { window, overlap });
    }

    if doc.text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = doc.text.chars().collect();
    let step = window - overlap;
    let mut fragments = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + window).min(chars.len());
        let text: String = chars[start..end].iter().collect();
        fragments.push(make_fragment(doc, text));

        if end == chars.len() {
            break;
        }
        start += step;
    }

    Ok(fragments)
}

fn make_fragment(doc: &SourceDocument, text: String) -> Fragment {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Fragment {
        id: String::new(),
        source: doc.source.clone(),
        page: doc.page,
        sequence: 0,
        text,
        hash,
    }
}
