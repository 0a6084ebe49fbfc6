//! Engine error taxonomy.
//!
//! The core pipeline returns [`EngineError`]; store backends and
//! capability adapters (embedding, generation) return `anyhow::Result`
//! and are wrapped at the core boundary. An empty store or an empty
//! search result is a normal answer, never an error.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Chunking parameters rejected before any I/O.
    #[error("invalid chunk config: overlap {overlap} must be smaller than window {window}")]
    InvalidChunkConfig { window: usize, overlap: usize },

    /// A source document could not be read. Aborts the ingestion call
    /// before any write reaches the store.
    #[error("failed to load documents from {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Post-write store count did not grow by the number of inserted
    /// fragments. Indicates a racing writer, a non-idempotent store, or
    /// an id collision; the written entries are not rolled back.
    #[error("store count mismatch after write: expected {expected} new entries, observed {observed}")]
    ConsistencyViolation { expected: u64, observed: u64 },

    /// Reset could not reclaim the persisted store within its retry
    /// budget. Fatal for this lifecycle manager instance.
    #[error("store reset failed after {attempts} removal attempts")]
    StoreResetFailed { attempts: u32 },

    /// No active store generation exists (a reset is in progress or a
    /// previous reset failed).
    #[error("store is unavailable: no active generation")]
    StoreUnavailable,

    /// The generation capability failed upstream. Propagated unchanged;
    /// the core performs no retries.
    #[error("generation failed: {0}")]
    Generation(#[source] anyhow::Error),

    /// A store capability operation failed.
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
}
