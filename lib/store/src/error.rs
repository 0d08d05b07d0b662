//! Error types for the document store.

use std::fmt;

/// Errors from document store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Could not connect to the database.
    ConnectionFailed { reason: String },
    /// Schema migrations failed.
    MigrationFailed { reason: String },
    /// A query failed.
    QueryFailed { reason: String },
    /// A stored row could not be turned into a domain value.
    InvalidRow { reason: String },
}

impl StoreError {
    pub(crate) fn query(error: sqlx::Error) -> Self {
        Self::QueryFailed {
            reason: error.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { reason } => {
                write!(f, "database connection failed: {reason}")
            }
            Self::MigrationFailed { reason } => write!(f, "migration failed: {reason}"),
            Self::QueryFailed { reason } => write!(f, "query failed: {reason}"),
            Self::InvalidRow { reason } => write!(f, "invalid row: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}
