//! Error types for grounding retrieval.

use std::fmt;

/// Errors from grounding searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroundingError {
    /// The backing index could not be searched.
    SearchFailed,
}

impl fmt::Display for GroundingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SearchFailed => write!(f, "grounding search failed"),
        }
    }
}

impl std::error::Error for GroundingError {}
