//! Error types for the integration crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `CredentialError`: acquiring a credential from the identity provider
//! - `GroupwareError`: read queries against the groupware service

use std::fmt;

/// Errors from groupware operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupwareError {
    /// Connection to the service failed.
    ConnectionFailed { reason: String },
    /// The service rejected the credential.
    AuthenticationFailed { reason: String },
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// The service answered with an error status.
    RequestFailed { status: u16, reason: String },
    /// The payload could not be decoded.
    ProtocolError { reason: String },
    /// Timeout waiting for response.
    Timeout,
    /// No usable credential.
    Credential,
}

impl fmt::Display for GroupwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { reason } => {
                write!(f, "connection failed: {reason}")
            }
            Self::AuthenticationFailed { reason } => {
                write!(f, "authentication failed: {reason}")
            }
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::RequestFailed { status, reason } => {
                write!(f, "groupware request failed with HTTP {status}: {reason}")
            }
            Self::ProtocolError { reason } => {
                write!(f, "protocol error: {reason}")
            }
            Self::Timeout => write!(f, "operation timed out"),
            Self::Credential => write!(f, "could not obtain a groupware credential"),
        }
    }
}

impl std::error::Error for GroupwareError {}

/// Errors from credential acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// The identity provider settings are unusable.
    InvalidConfig { reason: String },
    /// The token request failed.
    TokenRequestFailed { reason: String },
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => {
                write!(f, "invalid identity provider configuration: {reason}")
            }
            Self::TokenRequestFailed { reason } => {
                write!(f, "token request failed: {reason}")
            }
        }
    }
}

impl std::error::Error for CredentialError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groupware_error_display() {
        let err = GroupwareError::ConnectionFailed {
            reason: "host unreachable".to_string(),
        };
        assert!(err.to_string().contains("connection failed"));
        assert!(err.to_string().contains("host unreachable"));
    }

    #[test]
    fn groupware_error_rate_limited() {
        let err = GroupwareError::RateLimited {
            retry_after_secs: Some(60),
        };
        assert!(err.to_string().contains("60s"));
    }

    #[test]
    fn credential_error_display() {
        let err = CredentialError::TokenRequestFailed {
            reason: "invalid_client".to_string(),
        };
        assert!(err.to_string().contains("invalid_client"));
    }
}
