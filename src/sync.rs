//! Incremental synchronization of fragments into the store.
//!
//! Computes the set difference between freshly chunked fragments and the
//! ids already persisted, inserts only the new ones, and verifies the
//! post-write count. Insertion is add-only: an existing id is never
//! updated or deleted on this path, which makes re-ingestion of an
//! unchanged corpus a no-op (`added = 0`).

use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::models::{Fragment, SyncOutcome};
use crate::store::VectorStore;

/// Insert fragments whose ids are not yet persisted.
///
/// Steps: fetch the persisted id set, filter the input to new ids
/// (preserving relative order), bulk-upsert exactly those, then re-check
/// the store's total count.
///
/// # Errors
///
/// `ConsistencyViolation` if the observed count increase differs from
/// the number of fragments written: a racing writer, a non-idempotent
/// store, or an id-collision bug. The written entries are not rolled
/// back; the violation is surfaced, not absorbed.
pub async fn add_new(
    fragments: &[Fragment],
    store: &dyn VectorStore,
) -> Result<SyncOutcome, EngineError> {
    let existing = store.existing_ids().await.map_err(EngineError::Store)?;
    debug!(persisted = existing.len(), incoming = fragments.len(), "computing sync delta");

    let new: Vec<Fragment> = fragments
        .iter()
        .filter(|f| !existing.contains(&f.id))
        .cloned()
        .collect();
    let skipped = fragments.len() - new.len();

    if new.is_empty() {
        let total = store.count().await.map_err(EngineError::Store)?;
        info!(total, "no new fragments to add");
        return Ok(SyncOutcome {
            added: 0,
            skipped,
            total,
        });
    }

    let before = store.count().await.map_err(EngineError::Store)?;
    store.upsert(&new).await.map_err(EngineError::Store)?;
    let after = store.count().await.map_err(EngineError::Store)?;

    let expected = new.len() as u64;
    let observed = after.saturating_sub(before);
    if observed != expected {
        warn!(expected, observed, "post-write count mismatch");
        return Err(EngineError::ConsistencyViolation { expected, observed });
    }

    info!(added = new.len(), skipped, total = after, "sync complete");
    Ok(SyncOutcome {
        added: new.len(),
        skipped,
        total: after,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::models::ScoredFragment;
    use crate::store::memory::InMemoryStore;

    fn fragment(id: &str) -> Fragment {
        Fragment {
            id: id.to_string(),
            source: "doc.txt".to_string(),
            page: 0,
            sequence: 0,
            text: format!("text of {}", id),
            hash: "h".to_string(),
        }
    }

    fn store() -> InMemoryStore {
        InMemoryStore::new(Arc::new(HashEmbedder::new(32)))
    }

    #[tokio::test]
    async fn test_adds_all_when_empty() {
        let store = store();
        let fragments = vec![fragment("a:0:0"), fragment("a:0:1")];
        let outcome = add_new(&fragments, &store).await.unwrap();
        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.total, 2);
    }

    #[tokio::test]
    async fn test_second_run_adds_nothing() {
        let store = store();
        let fragments = vec![fragment("a:0:0"), fragment("a:0:1")];
        add_new(&fragments, &store).await.unwrap();

        let outcome = add_new(&fragments, &store).await.unwrap();
        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(outcome.total, 2);
    }

    #[tokio::test]
    async fn test_partial_delta() {
        let store = store();
        add_new(&[fragment("a:0:0")], &store).await.unwrap();

        let fragments = vec![fragment("a:0:0"), fragment("a:0:1"), fragment("b:0:0")];
        let outcome = add_new(&fragments, &store).await.unwrap();
        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.total, 3);
    }

    /// Store that silently drops every write, to trip the post-write
    /// verification.
    struct DroppingStore;

    #[async_trait]
    impl crate::store::VectorStore for DroppingStore {
        async fn upsert(&self, _fragments: &[Fragment]) -> Result<()> {
            Ok(())
        }
        async fn search(&self, _query: &str, _k: usize) -> Result<Vec<ScoredFragment>> {
            Ok(Vec::new())
        }
        async fn existing_ids(&self) -> Result<HashSet<String>> {
            Ok(HashSet::new())
        }
        async fn count(&self) -> Result<u64> {
            Ok(0)
        }
        async fn delete_all(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_count_mismatch_is_violation() {
        let store = DroppingStore;
        let err = add_new(&[fragment("a:0:0")], &store).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::ConsistencyViolation {
                expected: 1,
                observed: 0
            }
        ));
    }
}
