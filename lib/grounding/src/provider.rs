//! Grounding providers.

use crate::error::GroundingError;
use async_trait::async_trait;
use cxo_chat_store::{GroundingDocumentRepository, RankedDocument};
use rootcause::Report;
use rootcause::prelude::ResultExt;
use std::fmt::Write;
use tracing::{debug, instrument};

/// Text returned when nothing matches.
pub const NO_CONTEXT: &str = "No relevant context found.";

/// Longest body excerpt included per document, in characters.
const EXCERPT_CHARS: usize = 1200;

/// Source of grounding knowledge.
///
/// Implementations must be deterministic: the same query against unchanged
/// data yields the same digest.
#[async_trait]
pub trait GroundingProvider: Send + Sync {
    /// Returns a relevance-ranked digest for `query`.
    async fn search(&self, query: &str) -> Result<String, Report<GroundingError>>;
}

/// Grounding over the document store's full-text index.
#[derive(Debug, Clone)]
pub struct StoreGrounding {
    documents: GroundingDocumentRepository,
    top: u32,
}

impl StoreGrounding {
    /// Creates a provider returning at most `top` documents per query.
    #[must_use]
    pub fn new(documents: GroundingDocumentRepository, top: u32) -> Self {
        Self { documents, top }
    }
}

#[async_trait]
impl GroundingProvider for StoreGrounding {
    #[instrument(skip(self), fields(top = self.top))]
    async fn search(&self, query: &str) -> Result<String, Report<GroundingError>> {
        let hits = self
            .documents
            .search(query, self.top)
            .await
            .context(GroundingError::SearchFailed)?;
        debug!(hits = hits.len(), "grounding digest");
        Ok(render_digest(&hits))
    }
}

/// Renders search hits as a numbered digest.
#[must_use]
pub fn render_digest(hits: &[RankedDocument]) -> String {
    if hits.is_empty() {
        return NO_CONTEXT.to_string();
    }

    let mut digest = String::new();
    for (index, hit) in hits.iter().enumerate() {
        let document = &hit.document;
        if index > 0 {
            digest.push('\n');
        }
        let _ = write!(digest, "[{}] {}", index + 1, document.title);
        if let Some(source) = &document.source {
            let _ = write!(digest, " ({source})");
        }
        digest.push('\n');
        digest.push_str(&excerpt(&document.body));
        digest.push('\n');
    }
    digest
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
