//! Grounding knowledge for cxo-chat.
//!
//! A grounding provider answers free-text queries with a relevance-ranked
//! textual digest that the model can cite. The digest is plain text so it
//! can be fed back to the model as a function result without further
//! processing.

pub mod error;
pub mod provider;

pub use error::GroundingError;
pub use provider::{GroundingProvider, NO_CONTEXT, StoreGrounding, render_digest};
