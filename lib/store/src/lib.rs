//! Document store for cxo-chat.
//!
//! PostgreSQL holds two kinds of data:
//!
//! - **Grounding documents**: reference knowledge, indexed for full-text search
//! - **Transcripts**: chat sessions and their messages
//!
//! The schema is embedded and applied with [`run_migrations`].

pub mod document;
pub mod error;
pub mod pool;
pub mod transcript;

pub use document::{GroundingDocument, GroundingDocumentRepository, RankedDocument};
pub use error::StoreError;
pub use pool::{DatabaseConfig, connect, run_migrations};
pub use transcript::ConversationRepository;
