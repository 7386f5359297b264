use std::time::Duration;

use reqwest::Client;

use crate::error::Error;
use crate::error::Result;

/// Configuration for verifying access tokens issued by the identity provider
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// The expected issuer of the JWT tokens
    pub(crate) expected_issuer: String,
    /// Expected audiences - the token's audience must match at least one of these
    pub(crate) expected_audiences: Vec<String>,
    /// Time-to-live for cached JWKS (default: 1 hour)
    pub(crate) jwks_cache_ttl: Duration,
    /// Fixed JWKS location; when absent it is discovered from the issuer
    pub(crate) jwks_uri: Option<String>,
    /// Optional custom HTTP client for fetching JWKS
    pub(crate) http_client: Option<Client>,
}

const DEFAULT_JWKS_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_EXCHANGE_TIMEOUT_SECS: u64 = 10;

impl VerifierConfig {
    /// Create a new configuration with the given issuer and a single expected audience
    pub fn new(expected_issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            expected_issuer: expected_issuer.into(),
            expected_audiences: vec![audience.into()],
            jwks_cache_ttl: Duration::from_secs(DEFAULT_JWKS_CACHE_TTL_SECS),
            jwks_uri: None,
            http_client: None,
        }
    }

    /// Create a new configuration with the given issuer and multiple expected audiences
    ///
    /// # Errors
    /// Returns `Error::NoAudiencesConfigured` if the audiences vector is empty
    pub fn new_with_audiences(
        expected_issuer: impl Into<String>,
        expected_audiences: Vec<String>,
    ) -> Result<Self> {
        if expected_audiences.is_empty() {
            return Err(Error::NoAudiencesConfigured);
        }

        Ok(Self {
            expected_audiences,
            ..Self::new(expected_issuer, String::new())
        })
    }

    /// Add a single expected audience
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.expected_audiences.push(audience.into());
        self
    }

    /// Set the JWKS cache TTL
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_cache_ttl = ttl;
        self
    }

    /// Skip OpenID discovery and fetch keys from this URI
    pub fn with_jwks_uri(mut self, jwks_uri: impl Into<String>) -> Self {
        self.jwks_uri = Some(jwks_uri.into());
        self
    }

    /// Set a custom HTTP client
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }
}

/// Registration of this application as an OAuth2 client at the provider
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) token_endpoint: String,
    pub(crate) authorize_endpoint: Option<String>,
    /// Callback the provider redirects to with `?code=`
    pub(crate) redirect_uri: String,
    /// Bound on a single token-endpoint call
    pub(crate) timeout: Duration,
    pub(crate) http_client: Option<Client>,
}

impl OAuthClientConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_endpoint: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_endpoint: token_endpoint.into(),
            authorize_endpoint: None,
            redirect_uri: redirect_uri.into(),
            timeout: Duration::from_secs(DEFAULT_EXCHANGE_TIMEOUT_SECS),
            http_client: None,
        }
    }

    /// Set the provider's authorize endpoint used for login redirects
    pub fn with_authorize_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.authorize_endpoint = Some(endpoint.into());
        self
    }

    /// Set the token-endpoint request timeout (ignored with a custom client)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom HTTP client
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}
