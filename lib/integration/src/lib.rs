//! External service clients for cxo-chat.
//!
//! This crate provides:
//!
//! - **Credentials**: the `IdentityProvider` trait and its static-token and
//!   OAuth2 client-credentials implementations
//! - **Groupware**: the read-only `GroupwareService` trait and the
//!   Microsoft Graph client behind it

pub mod credential;
pub mod error;
pub mod graph;

pub use credential::{
    ClientCredentials, ClientCredentialsConfig, Credential, IdentityProvider, StaticToken,
};
pub use error::{CredentialError, GroupwareError};
pub use graph::{
    CalendarEvent, DriveFile, EmailMessage, GraphConfig, GroupwareService, MicrosoftGraph,
};
