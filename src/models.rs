//! Core data types used throughout ragmill.
//!
//! These types represent the documents, fragments, and answers that flow
//! through the ingestion and query pipeline.

use serde::Serialize;

/// A raw document produced by a loader before chunking.
///
/// `source` identifies where the text came from (a relative file path);
/// `page` is the 0-based page number for paginated formats, 0 otherwise.
/// Immutable once loaded.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source: String,
    pub page: u32,
    pub text: String,
}

/// A contiguous span of a document's text with provenance.
///
/// `sequence` is the fragment's 0-based position among fragments sharing
/// the same `(source, page)`; `id` is derived as
/// `"{source}:{page}:{sequence}"`. Both are empty/zero until assigned by
/// [`crate::ids::assign_ids`]. `hash` is the SHA-256 of the fragment text.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub id: String,
    pub source: String,
    pub page: u32,
    pub sequence: u32,
    pub text: String,
    pub hash: String,
}

/// A ranked hit returned by the store's similarity search.
#[derive(Debug, Clone)]
pub struct ScoredFragment {
    pub id: String,
    pub text: String,
    pub score: f32,
}

/// Outcome of one synchronization pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    /// Fragments newly inserted by this pass.
    pub added: usize,
    /// Fragments skipped because their ids were already persisted.
    pub skipped: usize,
    /// Total persisted fragment count after the pass.
    pub total: u64,
}

/// A generated answer plus the ids of the fragments it was built from.
///
/// `sources` preserves the search ranking order verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
}
