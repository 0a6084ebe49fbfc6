//! In-memory [`VectorStore`] implementation.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Search is brute-force
//! cosine similarity over all stored vectors. Backs the `memory` store
//! config and the test suite.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::{cosine_similarity, Embedder};
use crate::models::{Fragment, ScoredFragment};

use super::{StoreFactory, VectorStore};

struct StoredEntry {
    text: String,
    vector: Vec<f32>,
}

/// In-memory store generation.
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    embedder: Arc<dyn Embedder>,
}

impl InMemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            embedder,
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert(&self, fragments: &[Fragment]) -> Result<()> {
        let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        let mut entries = self.entries.write().unwrap();
        for (fragment, vector) in fragments.iter().zip(vectors) {
            entries.insert(
                fragment.id.clone(),
                StoredEntry {
                    text: fragment.text.clone(),
                    vector,
                },
            );
        }
        Ok(())
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredFragment>> {
        let query_vec = self.embedder.embed_query(query).await?;

        let entries = self.entries.read().unwrap();
        let mut hits: Vec<ScoredFragment> = entries
            .iter()
            .map(|(id, entry)| ScoredFragment {
                id: id.clone(),
                text: entry.text.clone(),
                score: cosine_similarity(&query_vec, &entry.vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn existing_ids(&self) -> Result<HashSet<String>> {
        let entries = self.entries.read().unwrap();
        Ok(entries.keys().cloned().collect())
    }

    async fn count(&self) -> Result<u64> {
        let entries = self.entries.read().unwrap();
        Ok(entries.len() as u64)
    }

    async fn delete_all(&self) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.clear();
        Ok(())
    }
}

/// Factory producing fresh, empty [`InMemoryStore`] generations.
pub struct MemoryStoreFactory {
    embedder: Arc<dyn Embedder>,
}

impl MemoryStoreFactory {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl StoreFactory for MemoryStoreFactory {
    async fn open(&self) -> Result<Arc<dyn VectorStore>> {
        Ok(Arc::new(InMemoryStore::new(self.embedder.clone())))
    }
}
