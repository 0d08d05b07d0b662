//! Loading text files into the grounding index.

use crate::error::AppError;
use cxo_chat_store::{GroundingDocument, GroundingDocumentRepository};
use rootcause::Report;
use rootcause::prelude::ResultExt;
use std::path::{Path, PathBuf};
use tracing::info;

fn document_title(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().replace(['_', '-'], " "))
        .unwrap_or_else(|| path.display().to_string())
}

/// Returns the canonical path, so the same file is always stored under the
/// same source.
async fn document_source(path: &Path) -> std::io::Result<String> {
    let canonical = tokio::fs::canonicalize(path).await?;
    Ok(canonical.display().to_string())
}

/// Stores each file as a grounding document.
///
/// Re-ingesting a file replaces the document stored for it.
///
/// # Errors
///
/// Returns `Ingest` naming the first file that could not be read or stored.
pub async fn ingest(
    documents: &GroundingDocumentRepository,
    paths: &[PathBuf],
) -> Result<usize, Report<AppError>> {
    for path in paths {
        let failed = || AppError::Ingest {
            path: path.display().to_string(),
        };

        let source = document_source(path).await.context(failed())?;
        let body = tokio::fs::read_to_string(path).await.context(failed())?;
        let document = GroundingDocument::new(document_title(path), body).with_source(source);
        let id = documents.upsert(&document).await.context(failed())?;
        info!(document_id = %id, path = %path.display(), "ingested document");
    }
    Ok(paths.len())
}
