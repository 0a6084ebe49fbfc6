//! SQLite-backed [`VectorStore`] implementation.
//!
//! One generation is one connection pool over a database file inside the
//! configured store directory. Embeddings are computed on upsert through
//! the configured [`Embedder`] and persisted as little-endian f32 BLOBs;
//! search embeds the query and ranks by brute-force cosine similarity
//! over the stored vectors. The write transaction commits before
//! `upsert` returns, so `count` always reflects the entries a completed
//! call persisted.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use crate::models::{Fragment, ScoredFragment};

use super::{StoreFactory, VectorStore};

/// Database file name inside the store directory.
const DB_FILE: &str = "ragmill.sqlite";

/// One live generation of the persisted store.
pub struct SqliteStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    embed_batch: usize,
}

impl SqliteStore {
    /// Open (creating if missing) the database under `dir` and ensure
    /// the schema exists. Idempotent.
    pub async fn open(dir: &Path, embedder: Arc<dyn Embedder>, embed_batch: usize) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let db_path = dir.join(DB_FILE);

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fragments (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                page INTEGER NOT NULL,
                seq INTEGER NOT NULL,
                text TEXT NOT NULL,
                hash TEXT NOT NULL,
                embedding BLOB NOT NULL,
                model TEXT NOT NULL,
                dims INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_fragments_source ON fragments(source)")
            .execute(&pool)
            .await?;

        Ok(Self {
            pool,
            embedder,
            embed_batch: embed_batch.max(1),
        })
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn upsert(&self, fragments: &[Fragment]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let model = self.embedder.model_name().to_string();

        for batch in fragments.chunks(self.embed_batch) {
            let texts: Vec<String> = batch.iter().map(|f| f.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;

            let mut tx = self.pool.begin().await?;
            for (fragment, vector) in batch.iter().zip(&vectors) {
                sqlx::query(
                    r#"
                    INSERT INTO fragments (id, source, page, seq, text, hash, embedding, model, dims, created_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        text = excluded.text,
                        hash = excluded.hash,
                        embedding = excluded.embedding,
                        model = excluded.model,
                        dims = excluded.dims
                    "#,
                )
                .bind(&fragment.id)
                .bind(&fragment.source)
                .bind(fragment.page as i64)
                .bind(fragment.sequence as i64)
                .bind(&fragment.text)
                .bind(&fragment.hash)
                .bind(vec_to_blob(vector))
                .bind(&model)
                .bind(vector.len() as i64)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
        }

        Ok(())
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredFragment>> {
        let query_vec = self.embedder.embed_query(query).await?;

        let rows: Vec<(String, String, Vec<u8>)> =
            sqlx::query_as("SELECT id, text, embedding FROM fragments")
                .fetch_all(&self.pool)
                .await?;

        let mut hits: Vec<ScoredFragment> = rows
            .into_iter()
            .map(|(id, text, blob)| {
                let score = cosine_similarity(&query_vec, &blob_to_vec(&blob));
                ScoredFragment { id, text, score }
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
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM fragments")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fragments")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn delete_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM fragments")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Factory producing [`SqliteStore`] generations over one store
/// directory. The directory is the unit the lifecycle manager reclaims
/// on reset.
pub struct SqliteStoreFactory {
    dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    embed_batch: usize,
}

impl SqliteStoreFactory {
    pub fn new(dir: PathBuf, embedder: Arc<dyn Embedder>, embed_batch: usize) -> Self {
        Self {
            dir,
            embedder,
            embed_batch,
        }
    }
}

#[async_trait]
impl StoreFactory for SqliteStoreFactory {
    async fn open(&self) -> Result<Arc<dyn VectorStore>> {
        let store = SqliteStore::open(&self.dir, self.embedder.clone(), self.embed_batch).await?;
        Ok(Arc::new(store))
    }

    fn storage_path(&self) -> Option<&Path> {
        Some(&self.dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use tempfile::TempDir;

    fn fragment(id: &str, text: &str) -> Fragment {
        Fragment {
            id: id.to_string(),
            source: "doc.txt".to_string(),
            page: 0,
            sequence: 0,
            text: text.to_string(),
            hash: "h".to_string(),
        }
    }

    async fn open_store(dir: &Path) -> SqliteStore {
        SqliteStore::open(dir, Arc::new(HashEmbedder::new(64)), 64)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(tmp.path()).await;
        store.close().await;
        let store = open_store(tmp.path()).await;
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(tmp.path()).await;
        store
            .upsert(&[fragment("a:0:0", "alpha"), fragment("a:0:1", "beta")])
            .await
            .unwrap();
        store.close().await;

        let store = open_store(tmp.path()).await;
        assert_eq!(store.count().await.unwrap(), 2);
        let ids = store.existing_ids().await.unwrap();
        assert!(ids.contains("a:0:0"));
    }

    #[tokio::test]
    async fn test_upsert_same_id_does_not_grow() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(tmp.path()).await;
        store.upsert(&[fragment("a:0:0", "alpha")]).await.unwrap();
        store.upsert(&[fragment("a:0:0", "alpha v2")]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_and_delete_all() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(tmp.path()).await;
        store
            .upsert(&[
                fragment("a:0:0", "imprisonment for hacking offenses"),
                fragment("a:0:1", "bread baking with yeast"),
            ])
            .await
            .unwrap();

        let hits = store.search("hacking imprisonment", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a:0:0");

        store.delete_all().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
