//! Error types for the AI crate.
//!
//! `LlmError` covers every way a completion call can fail. Callers wrap it
//! with their own context via rootcause's `.context()`.

use std::fmt;

/// Errors from LLM backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// The provider could not be reached.
    ProviderUnavailable { provider: String, reason: String },
    /// The provider rejected the request.
    RequestFailed { status: Option<u16>, reason: String },
    /// The provider answered with something that is not a usable completion.
    ResponseParseFailed { reason: String },
    /// No response before the client-side timeout.
    Timeout,
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// The backend configuration is unusable.
    InvalidConfig { reason: String },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderUnavailable { provider, reason } => {
                write!(f, "LLM provider '{provider}' unavailable: {reason}")
            }
            Self::RequestFailed {
                status: Some(status),
                reason,
            } => {
                write!(f, "LLM request failed with HTTP {status}: {reason}")
            }
            Self::RequestFailed { status: None, reason } => {
                write!(f, "LLM request failed: {reason}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse LLM response: {reason}")
            }
            Self::Timeout => write!(f, "LLM request timed out"),
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid LLM configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for LlmError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_unavailable_display() {
        let err = LlmError::ProviderUnavailable {
            provider: "azure_openai".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("azure_openai"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn request_failed_includes_status_when_known() {
        let err = LlmError::RequestFailed {
            status: Some(400),
            reason: "bad function schema".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "LLM request failed with HTTP 400: bad function schema"
        );
    }

    #[test]
    fn rate_limited_display() {
        let err = LlmError::RateLimited {
            retry_after_secs: Some(12),
        };
        assert!(err.to_string().contains("12s"));
    }
}
