//! Storage abstraction for ragmill.
//!
//! The [`VectorStore`] trait defines the capability surface the sync and
//! retrieval pipelines need, enabling pluggable backends (SQLite,
//! in-memory). A backend owns persistence and similarity ranking and
//! computes embeddings internally on write; callers hand it text, never
//! vectors.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Fragment, ScoredFragment};

/// Abstract persisted store: one implementor instance is one live
/// *generation* of the store. Generations are only ever replaced
/// wholesale by [`crate::lifecycle::StoreLifecycle::reset`].
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Persist fragments, embedding as needed |
/// | [`search`](VectorStore::search) | Top-k similarity search for a query |
/// | [`existing_ids`](VectorStore::existing_ids) | All persisted fragment ids |
/// | [`count`](VectorStore::count) | Number of persisted entries |
/// | [`delete_all`](VectorStore::delete_all) | Irreversibly empty the generation's persisted state |
/// | [`close`](VectorStore::close) | Release pooled resources ahead of file reclamation |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist the given fragments keyed by their ids, computing
    /// embeddings as needed. Keys that already exist are overwritten;
    /// the sync engine guarantees it only passes new ids.
    async fn upsert(&self, fragments: &[Fragment]) -> Result<()>;

    /// Return the `k` nearest fragments for `query`, most similar first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredFragment>>;

    /// Return the full set of persisted fragment ids.
    async fn existing_ids(&self) -> Result<HashSet<String>>;

    /// Return the number of persisted entries. Reflects committed writes
    /// only.
    async fn count(&self) -> Result<u64>;

    /// Irreversibly remove every persisted entry in this generation's
    /// storage location.
    async fn delete_all(&self) -> Result<()>;

    /// Release held resources (connection pools, file handles) so the
    /// backing storage can be reclaimed. Default is a no-op.
    async fn close(&self) {}
}

impl fmt::Debug for dyn VectorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VectorStore")
    }
}

/// Constructs store generations and describes the storage location the
/// lifecycle manager is allowed to reclaim on reset.
#[async_trait]
pub trait StoreFactory: Send + Sync {
    /// Open a fresh generation. Called at startup and after each reset;
    /// must succeed against an empty or missing storage location.
    async fn open(&self) -> Result<Arc<dyn VectorStore>>;

    /// The on-disk location backing generations from this factory, if
    /// any. `None` for purely in-memory backends, which have nothing to
    /// reclaim beyond `delete_all`.
    fn storage_path(&self) -> Option<&Path> {
        None
    }
}
