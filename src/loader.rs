//! Directory document source.
//!
//! Walks a root directory with include/exclude globs and produces
//! [`SourceDocument`]s: `.txt` and `.md` files as a single page 0
//! document, `.pdf` files page-by-page so fragment ids carry real page
//! provenance. Scan order is sorted by relative path, so repeated loads
//! of an unchanged corpus produce documents, and therefore fragment
//! ids, in the same order.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::EngineError;
use crate::models::SourceDocument;

/// Load documents from a directory (scanned with globs) or a single
/// file (globs ignored).
///
/// # Errors
///
/// `Load` if the path does not exist or any matched file cannot be read
/// or parsed. Fails before anything reaches the store.
pub fn load_documents(
    path: &Path,
    include_globs: &[String],
    exclude_globs: &[String],
) -> Result<Vec<SourceDocument>, EngineError> {
    load_inner(path, include_globs, exclude_globs).map_err(|source| EngineError::Load {
        path: path.to_path_buf(),
        source,
    })
}

fn load_inner(
    path: &Path,
    include_globs: &[String],
    exclude_globs: &[String],
) -> Result<Vec<SourceDocument>> {
    if path.is_file() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        return load_file(path, &name);
    }

    if !path.is_dir() {
        return Err(anyhow!("path does not exist: {}", path.display()));
    }

    let include_set = build_globset(include_globs)?;
    let exclude_set = build_globset(exclude_globs)?;

    let mut files: Vec<(std::path::PathBuf, String)> = Vec::new();
    for entry in WalkDir::new(path) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let file_path = entry.path();
        let relative = file_path.strip_prefix(path).unwrap_or(file_path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        files.push((file_path.to_path_buf(), rel_str));
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.1.cmp(&b.1));

    let mut documents = Vec::new();
    for (file_path, rel_str) in &files {
        documents.extend(load_file(file_path, rel_str)?);
    }

    info!(files = files.len(), documents = documents.len(), "documents loaded");
    Ok(documents)
}

fn load_file(path: &Path, source: &str) -> Result<Vec<SourceDocument>> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => load_pdf(path, source),
        _ => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(vec![SourceDocument {
                source: source.to_string(),
                page: 0,
                text,
            }])
        }
    }
}

fn load_pdf(path: &Path, source: &str) -> Result<Vec<SourceDocument>> {
    let pages = pdf_extract::extract_text_by_pages(path)
        .with_context(|| format!("failed to extract text from {}", path.display()))?;

    debug!(source, pages = pages.len(), "pdf extracted");

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| SourceDocument {
            source: source.to_string(),
            page: i as u32,
            text,
        })
        .collect())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
