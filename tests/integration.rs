//! End-to-end properties of the synchronization and lifecycle engine,
//! exercised through the public library API with the in-memory and
//! SQLite backends, the hashing embedder, and a scripted generator.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use ragmill::config::{
    ChunkingConfig, Config, DataConfig, EmbeddingConfig, GenerationConfig, RetrievalConfig,
    ServerConfig, StoreConfig,
};
use ragmill::context::EngineContext;
use ragmill::error::EngineError;
use ragmill::generate::Generator;
use ragmill::ingest::run_ingest;
use ragmill::lifecycle::{ResetPolicy, StorageRemover, StoreLifecycle};
use ragmill::retrieval::{self, NO_DOCUMENTS_ANSWER};
use ragmill::store::sqlite::SqliteStoreFactory;
use ragmill::embedding::HashEmbedder;

fn test_config(data_root: &Path, store_path: &Path, backend: &str) -> Config {
    Config {
        store: StoreConfig {
            backend: backend.to_string(),
            path: store_path.to_path_buf(),
        },
        data: DataConfig {
            root: data_root.to_path_buf(),
            include_globs: vec!["**/*.md".to_string(), "**/*.txt".to_string()],
            exclude_globs: Vec::new(),
        },
        chunking: ChunkingConfig {
            window_chars: 100,
            overlap_chars: 10,
        },
        retrieval: RetrievalConfig::default(),
        embedding: EmbeddingConfig::default(),
        generation: GenerationConfig::default(),
        server: ServerConfig {
            bind: "127.0.0.1:0".to_string(),
        },
    }
}

async fn memory_context(data_root: &Path) -> (TempDir, EngineContext) {
    let store_tmp = TempDir::new().unwrap();
    let config = test_config(data_root, store_tmp.path(), "memory");
    let ctx = EngineContext::from_config(config).await.unwrap();
    (store_tmp, ctx)
}

/// Generator that counts invocations and returns a fixed reply.
struct CountingGenerator {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl Generator for CountingGenerator {
    fn model_name(&self) -> &str {
        "counting"
    }

    async fn generate(&self, _system: &str, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("a generated answer".to_string())
    }
}

fn write_corpus(dir: &Path) {
    // alpha: > window_chars (100), chunks into 2 fragments
    std::fs::write(
        dir.join("alpha.txt"),
        "Section 66 prescribes imprisonment for hacking a computer system. \
         The fine may extend to five hundred thousand rupees in serious cases.",
    )
    .unwrap();
    // beta: short, a single fragment
    std::fs::write(dir.join("beta.txt"), "Cheating by personation is an offense.").unwrap();
}

#[tokio::test]
async fn idempotent_ingestion() {
    let data = TempDir::new().unwrap();
    write_corpus(data.path());
    let (_store_tmp, ctx) = memory_context(data.path()).await;

    let first = run_ingest(&ctx, None, false).await.unwrap();
    let first_outcome = first.outcome.unwrap();
    assert_eq!(first_outcome.added, 3);
    assert_eq!(first_outcome.total, 3);

    let second = run_ingest(&ctx, None, false).await.unwrap();
    let second_outcome = second.outcome.unwrap();
    assert_eq!(second_outcome.added, 0);
    assert_eq!(second_outcome.skipped, 3);
    assert_eq!(second_outcome.total, 3);
    assert_eq!(ctx.lifecycle.count().await.unwrap(), 3);
}

#[tokio::test]
async fn deterministic_ids_for_single_document() {
    let data = TempDir::new().unwrap();
    let long_text = "All fragments of this document share one source and one page. ".repeat(5);
    std::fs::write(data.path().join("only.txt"), &long_text).unwrap();
    let (_store_tmp, ctx) = memory_context(data.path()).await;

    run_ingest(&ctx, None, false).await.unwrap();

    let store = ctx.lifecycle.current().await.unwrap();
    let ids = store.existing_ids().await.unwrap();
    let n = ids.len();
    assert!(n > 1, "expected the document to chunk into several fragments");
    for sequence in 0..n {
        assert!(
            ids.contains(&format!("only.txt:0:{}", sequence)),
            "missing id only.txt:0:{}",
            sequence
        );
    }
}

#[tokio::test]
async fn count_conservation_across_documents() {
    let data = TempDir::new().unwrap();
    write_corpus(data.path());
    let (_store_tmp, ctx) = memory_context(data.path()).await;

    // alpha.txt yields 2 fragments, beta.txt yields 1.
    let outcome = run_ingest(&ctx, None, false).await.unwrap().outcome.unwrap();
    assert_eq!(outcome.added, 3);
    assert_eq!(ctx.lifecycle.count().await.unwrap(), 3);

    let outcome = run_ingest(&ctx, None, false).await.unwrap().outcome.unwrap();
    assert_eq!(outcome.added, 0);
    assert_eq!(ctx.lifecycle.count().await.unwrap(), 3);
}

#[tokio::test]
async fn empty_store_query_never_invokes_generator() {
    let data = TempDir::new().unwrap();
    let (_store_tmp, ctx) = memory_context(data.path()).await;

    let calls = Arc::new(AtomicU32::new(0));
    let generator = CountingGenerator {
        calls: calls.clone(),
    };

    let store = ctx.lifecycle.current().await.unwrap();
    let answer = retrieval::answer("anything at all", 5, 8000, store.as_ref(), &generator)
        .await
        .unwrap();

    assert_eq!(answer.text, NO_DOCUMENTS_ANSWER);
    assert!(answer.sources.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ids_reproduce_across_reset() {
    let data = TempDir::new().unwrap();
    write_corpus(data.path());
    let (_store_tmp, ctx) = memory_context(data.path()).await;

    run_ingest(&ctx, None, false).await.unwrap();
    let store = ctx.lifecycle.current().await.unwrap();
    let mut before: Vec<String> = store.existing_ids().await.unwrap().into_iter().collect();
    before.sort();
    drop(store);

    ctx.lifecycle.reset().await.unwrap();
    assert_eq!(ctx.lifecycle.count().await.unwrap(), 0);

    run_ingest(&ctx, None, false).await.unwrap();
    let store = ctx.lifecycle.current().await.unwrap();
    let mut after: Vec<String> = store.existing_ids().await.unwrap().into_iter().collect();
    after.sort();

    assert_eq!(before, after);
}

#[tokio::test]
async fn sqlite_end_to_end_ingest_query_reset() {
    let data = TempDir::new().unwrap();
    write_corpus(data.path());
    let store_root = TempDir::new().unwrap();
    let store_dir = store_root.path().join("store");

    let config = test_config(data.path(), &store_dir, "sqlite");
    let mut ctx = EngineContext::from_config(config).await.unwrap();

    let outcome = run_ingest(&ctx, None, false).await.unwrap().outcome.unwrap();
    assert_eq!(outcome.added, 3);
    assert!(store_dir.join("ragmill.sqlite").exists());

    // Query through the facade with a scripted generator.
    let calls = Arc::new(AtomicU32::new(0));
    ctx.generator = Box::new(CountingGenerator {
        calls: calls.clone(),
    });

    let store = ctx.lifecycle.current().await.unwrap();
    let answer = retrieval::answer(
        "punishment for hacking",
        3,
        8000,
        store.as_ref(),
        ctx.generator.as_ref(),
    )
    .await
    .unwrap();
    drop(store);

    assert_eq!(answer.text, "a generated answer");
    assert!(!answer.sources.is_empty());
    assert!(answer.sources[0].starts_with("alpha.txt:"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Reset removes the storage directory and recreates an empty store.
    ctx.lifecycle.reset().await.unwrap();
    assert_eq!(ctx.lifecycle.count().await.unwrap(), 0);

    // Re-ingestion after reset reproduces the same id set.
    let outcome = run_ingest(&ctx, None, false).await.unwrap().outcome.unwrap();
    assert_eq!(outcome.added, 3);
}

/// Remover that always fails, including the forceful fallback.
struct StuckRemover {
    attempts: Arc<AtomicU32>,
}

#[async_trait]
impl StorageRemover for StuckRemover {
    async fn remove(&self, _path: &Path) -> std::io::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(std::io::Error::other("simulated permanent lock"))
    }

    async fn force_remove(&self, _path: &Path) -> std::io::Result<()> {
        Err(std::io::Error::other("simulated permanent lock"))
    }
}

#[tokio::test]
async fn reset_fatality_parks_the_manager() {
    let store_root = TempDir::new().unwrap();
    let store_dir = store_root.path().join("store");
    let factory = Box::new(SqliteStoreFactory::new(
        store_dir,
        Arc::new(HashEmbedder::new(32)),
        64,
    ));

    let attempts = Arc::new(AtomicU32::new(0));
    let lifecycle = StoreLifecycle::open_with(
        factory,
        ResetPolicy {
            max_attempts: 3,
            backoff: std::time::Duration::from_millis(5),
            drain_timeout: std::time::Duration::from_millis(100),
        },
        Box::new(StuckRemover {
            attempts: attempts.clone(),
        }),
    )
    .await
    .unwrap();

    let err = lifecycle.reset().await.unwrap_err();
    assert!(matches!(err, EngineError::StoreResetFailed { .. }));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    // No partially-initialized generation is ever served.
    assert!(matches!(
        lifecycle.current().await.unwrap_err(),
        EngineError::StoreUnavailable
    ));
}
