//! Grounding documents and full-text search over them.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use cxo_chat_core::DocumentId;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::{debug, instrument};

/// A piece of reference knowledge the assistant can ground answers in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingDocument {
    /// Document ID.
    pub id: DocumentId,
    /// Short title, weighted above the body when ranking.
    pub title: String,
    /// Full text.
    pub body: String,
    /// Where the document came from (URL, file name).
    pub source: Option<String>,
    /// When the document was stored.
    pub created_at: DateTime<Utc>,
}

impl GroundingDocument {
    /// Creates a new document.
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: DocumentId::new(),
            title: title.into(),
            body: body.into(),
            source: None,
            created_at: Utc::now(),
        }
    }

    /// Sets the source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedDocument {
    /// The matching document.
    pub document: GroundingDocument,
    /// Relevance as computed by `ts_rank`.
    pub rank: f32,
}

#[derive(FromRow)]
struct DocumentRow {
    id: String,
    title: String,
    body: String,
    source: Option<String>,
    created_at: DateTime<Utc>,
}

impl DocumentRow {
    fn try_into_document(self) -> Result<GroundingDocument, StoreError> {
        let id = DocumentId::from_str(&self.id).map_err(|e| StoreError::InvalidRow {
            reason: format!("invalid document id '{}': {}", self.id, e),
        })?;

        Ok(GroundingDocument {
            id,
            title: self.title,
            body: self.body,
            source: self.source,
            created_at: self.created_at,
        })
    }
}

const UPSERT_BY_ID: &str = r#"
    INSERT INTO grounding_documents (id, title, body, source, created_at)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (id) DO UPDATE SET
        title = EXCLUDED.title,
        body = EXCLUDED.body,
        source = EXCLUDED.source
    RETURNING id
"#;

const UPSERT_BY_SOURCE: &str = r#"
    INSERT INTO grounding_documents (id, title, body, source, created_at)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (source) DO UPDATE SET
        title = EXCLUDED.title,
        body = EXCLUDED.body
    RETURNING id
"#;

fn upsert_statement(document: &GroundingDocument) -> &'static str {
    if document.source.is_some() {
        UPSERT_BY_SOURCE
    } else {
        UPSERT_BY_ID
    }
}

#[derive(FromRow)]
struct RankedRow {
    #[sqlx(flatten)]
    document: DocumentRow,
    rank: f32,
}

/// Repository for grounding documents.
#[derive(Debug, Clone)]
pub struct GroundingDocumentRepository {
    pool: PgPool,
}

impl GroundingDocumentRepository {
    /// Creates a new repository.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores a document and returns the ID it is stored under.
    ///
    /// A document with a source replaces the stored document from the same
    /// source, keeping that document's ID. One without a source replaces
    /// the document with the same ID.
    ///
    /// # Errors
    ///
    /// Returns `QueryFailed` if the insert fails, or `InvalidRow` if the
    /// stored ID cannot be parsed.
    #[instrument(skip(self, document), fields(document_id = %document.id))]
    pub async fn upsert(
        &self,
        document: &GroundingDocument,
    ) -> Result<DocumentId, Report<StoreError>> {
        let (id,): (String,) = sqlx::query_as(upsert_statement(document))
            .bind(document.id.to_string())
            .bind(&document.title)
            .bind(&document.body)
            .bind(&document.source)
            .bind(document.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::query)?;

        let stored = DocumentId::from_str(&id).map_err(|e| StoreError::InvalidRow {
            reason: format!("invalid document id '{id}': {e}"),
        })?;
        if stored != document.id {
            debug!(stored_id = %stored, "replaced document from the same source");
        }
        Ok(stored)
    }

    /// Returns up to `limit` documents matching `query`, best first.
    ///
    /// The query uses web-search syntax (quoted phrases, `or`, `-term`).
    /// Equal ranks are ordered by document ID so results are stable for
    /// unchanged data.
    ///
    /// # Errors
    ///
    /// Returns `QueryFailed` or `InvalidRow`.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<RankedDocument>, Report<StoreError>> {
        let rows: Vec<RankedRow> = sqlx::query_as(
            r#"
            SELECT d.id, d.title, d.body, d.source, d.created_at,
                   ts_rank(d.search_vector, q) AS rank
            FROM grounding_documents d, websearch_to_tsquery('english', $1) q
            WHERE d.search_vector @@ q
            ORDER BY rank DESC, d.id ASC
            LIMIT $2
            "#,
        )
        .bind(query)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::query)?;

        debug!(hits = rows.len(), "grounding search");

        rows.into_iter()
            .map(|r| -> Result<RankedDocument, Report<StoreError>> {
                Ok(RankedDocument {
                    document: r.document.try_into_document()?,
                    rank: r.rank,
                })
            })
            .collect()
    }
}
