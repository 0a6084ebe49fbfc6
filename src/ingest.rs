//! Ingestion orchestration.
//!
//! Coordinates the full flow: load documents → chunk → assign ids →
//! synchronize into the current store generation. Re-running over an
//! unchanged corpus adds nothing; deduplication against persisted ids
//! is the only defense against double-counting, and it is sufficient
//! because ids are deterministic.

use std::path::Path;

use tracing::info;

use crate::chunk::split_document;
use crate::context::EngineContext;
use crate::error::EngineError;
use crate::ids::assign_ids;
use crate::loader::load_documents;
use crate::models::{Fragment, SyncOutcome};
use crate::sync;

/// Summary of one ingestion call.
#[derive(Debug)]
pub struct IngestReport {
    /// Documents (pages) loaded from the source path.
    pub documents: usize,
    /// Fragments produced by chunking.
    pub fragments: usize,
    /// Sync outcome; `None` for a dry run.
    pub outcome: Option<SyncOutcome>,
}

/// Ingest documents from `path` (defaults to the configured data root).
///
/// With `dry_run`, loads and chunks but writes nothing.
pub async fn run_ingest(
    ctx: &EngineContext,
    path: Option<&Path>,
    dry_run: bool,
) -> Result<IngestReport, EngineError> {
    let root = path.unwrap_or(&ctx.config.data.root);
    let documents = load_documents(
        root,
        &ctx.config.data.include_globs,
        &ctx.config.data.exclude_globs,
    )?;

    let mut fragments: Vec<Fragment> = Vec::new();
    for doc in &documents {
        fragments.extend(split_document(
            doc,
            ctx.config.chunking.window_chars,
            ctx.config.chunking.overlap_chars,
        )?);
    }
    assign_ids(&mut fragments);

    info!(
        documents = documents.len(),
        fragments = fragments.len(),
        "corpus chunked"
    );

    if dry_run {
        return Ok(IngestReport {
            documents: documents.len(),
            fragments: fragments.len(),
            outcome: None,
        });
    }

    let store = ctx.lifecycle.current().await?;
    let outcome = sync::add_new(&fragments, store.as_ref()).await?;

    Ok(IngestReport {
        documents: documents.len(),
        fragments: fragments.len(),
        outcome: Some(outcome),
    })
}
