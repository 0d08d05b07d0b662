//! Credentials for the groupware service.
//!
//! The identity provider hands out an opaque bearer `Credential`; service
//! clients attach it to requests and never look inside. Two providers are
//! available: a pre-issued token and the OAuth2 client-credentials grant.

use crate::error::CredentialError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oauth2::basic::BasicClient;
use oauth2::{ClientId, ClientSecret, Scope, TokenResponse, TokenUrl};
use rootcause::Report;
use serde::Deserialize;
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, instrument};

/// A bearer credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Creates a credential from a bearer token.
    #[must_use]
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: None,
        }
    }

    /// Sets the expiry instant.
    #[must_use]
    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns true if the credential expires within five minutes.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        self.expires_at
            .is_some_and(|expires| expires < Utc::now() + chrono::Duration::minutes(5))
    }

    pub(crate) fn secret(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of groupware credentials.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns a credential valid for at least the next request.
    ///
    /// # Errors
    ///
    /// Returns an error if no credential can be obtained.
    async fn credential(&self) -> Result<Credential, Report<CredentialError>>;
}

/// A pre-issued token, used as-is.
#[derive(Debug, Clone)]
pub struct StaticToken {
    credential: Credential,
}

impl StaticToken {
    /// Wraps a bearer token.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            credential: Credential::bearer(access_token),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticToken {
    async fn credential(&self) -> Result<Credential, Report<CredentialError>> {
        Ok(self.credential.clone())
    }
}

/// Settings for the client-credentials grant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientCredentialsConfig {
    /// Directory (tenant) id.
    pub tenant_id: String,
    /// Application (client) id.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// Authority host.
    #[serde(default = "default_authority")]
    pub authority: String,
    /// Requested scope.
    #[serde(default = "default_scope")]
    pub scope: String,
}

fn default_authority() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_scope() -> String {
    "https://graph.microsoft.com/.default".to_string()
}

impl ClientCredentialsConfig {
    /// Returns the tenant's v2 token endpoint.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

/// OAuth2 client-credentials identity provider.
///
/// A token is reused until it is about to expire.
pub struct ClientCredentials {
    config: ClientCredentialsConfig,
    token_url: TokenUrl,
    http: reqwest::Client,
    current: Mutex<Option<Credential>>,
}

impl ClientCredentials {
    /// Creates a provider whose token requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the token URL is invalid or the HTTP
    /// client cannot be built.
    pub fn new(
        config: ClientCredentialsConfig,
        timeout: std::time::Duration,
    ) -> Result<Self, Report<CredentialError>> {
        let token_url =
            TokenUrl::new(config.token_url()).map_err(|e| CredentialError::InvalidConfig {
                reason: format!("invalid token URL: {e}"),
            })?;

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| CredentialError::InvalidConfig {
                reason: format!("HTTP client error: {e}"),
            })?;

        Ok(Self {
            config,
            token_url,
            http,
            current: Mutex::new(None),
        })
    }

    fn reusable(&self) -> Option<Credential> {
        let current = self.current.lock().ok()?;
        current.as_ref().filter(|c| !c.needs_refresh()).cloned()
    }

    fn remember(&self, credential: &Credential) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(credential.clone());
        }
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("tenant_id", &self.config.tenant_id)
            .field("client_id", &self.config.client_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IdentityProvider for ClientCredentials {
    #[instrument(skip(self), fields(tenant_id = %self.config.tenant_id))]
    async fn credential(&self) -> Result<Credential, Report<CredentialError>> {
        if let Some(credential) = self.reusable() {
            return Ok(credential);
        }

        let client = BasicClient::new(ClientId::new(self.config.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.config.client_secret.clone()))
            .set_token_uri(self.token_url.clone());

        let token = client
            .exchange_client_credentials()
            .add_scope(Scope::new(self.config.scope.clone()))
            .request_async(&self.http)
            .await
            .map_err(|e| CredentialError::TokenRequestFailed {
                reason: e.to_string(),
            })?;

        let mut credential = Credential::bearer(token.access_token().secret().clone());
        if let Some(expires_at) = token
            .expires_in()
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d)
        {
            credential = credential.expiring_at(expires_at);
        }

        debug!("acquired groupware token");
        self.remember(&credential);
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_token() {
        let credential = Credential::bearer("very-secret");
        let debug = format!("{credential:?}");
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn needs_refresh_near_expiry() {
        let expiring = Credential::bearer("t").expiring_at(Utc::now() + chrono::Duration::minutes(1));
        assert!(expiring.needs_refresh());

        let fresh = Credential::bearer("t").expiring_at(Utc::now() + chrono::Duration::hours(1));
        assert!(!fresh.needs_refresh());

        assert!(!Credential::bearer("t").needs_refresh());
    }

    #[tokio::test]
    async fn static_token_returns_same_credential() {
        let provider = StaticToken::new("abc");
        let first = provider.credential().await.expect("credential");
        let second = provider.credential().await.expect("credential");
        assert_eq!(first, second);
        assert_eq!(first.secret(), "abc");
    }

    #[test]
    fn token_url_uses_tenant() {
        let config: ClientCredentialsConfig = serde_json::from_value(serde_json::json!({
            "tenant_id": "contoso",
            "client_id": "app",
            "client_secret": "shh"
        }))
        .expect("deserialize");

        assert_eq!(
            config.token_url(),
            "https://login.microsoftonline.com/contoso/oauth2/v2.0/token"
        );
        assert_eq!(config.scope, "https://graph.microsoft.com/.default");
    }

    fn config(authority: String) -> ClientCredentialsConfig {
        ClientCredentialsConfig {
            tenant_id: "contoso".to_string(),
            client_id: "app".to_string(),
            client_secret: "shh".to_string(),
            authority,
            scope: default_scope(),
        }
    }

    #[test]
    fn client_credentials_reuses_fresh_token() {
        let provider = ClientCredentials::new(
            config(default_authority()),
            std::time::Duration::from_secs(5),
        )
        .expect("provider");

        assert!(provider.reusable().is_none());
        let credential =
            Credential::bearer("cached").expiring_at(Utc::now() + chrono::Duration::hours(1));
        provider.remember(&credential);
        assert_eq!(provider.reusable(), Some(credential));
    }

    #[tokio::test]
    async fn stalled_token_endpoint_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        // Accepts connections and never answers.
        let server = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                open.push(stream);
            }
        });

        let provider = ClientCredentials::new(
            config(format!("http://{addr}")),
            std::time::Duration::from_millis(200),
        )
        .expect("provider");

        let result = tokio::time::timeout(std::time::Duration::from_secs(10), provider.credential())
            .await
            .expect("token request should not hang");
        let err = result.unwrap_err();
        assert!(matches!(
            err.current_context(),
            CredentialError::TokenRequestFailed { .. }
        ));
        server.abort();
    }
}
