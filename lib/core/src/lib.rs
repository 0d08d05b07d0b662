//! Core types shared by the cxo-chat crates.
//!
//! Strongly-typed identifiers for sessions, messages and grounding
//! documents.

pub mod id;

pub use id::{DocumentId, MessageId, ParseIdError, SessionId};
