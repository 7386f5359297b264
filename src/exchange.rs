//! Token-endpoint interactions
//!
//! Both grants share one contract: a single POST to the provider's token
//! endpoint authenticated with the client credentials, answered by
//!
//! ```json
//! {
//!   "access_token": "...",
//!   "expires_in": 3600,
//!   "token_type": "Bearer",
//!   "refresh_token": "..."
//! }
//! ```
//!
//! Anything but a `200` carrying all four keys is a failed exchange. The
//! `refresh_token` key must be present but may be `null`; providers that do
//! not rotate refresh tokens answer that way on the refresh grant.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

use crate::config::OAuthClientConfig;
use crate::error::Error;
use crate::error::Result;

const REQUIRED_FIELDS: [&str; 4] = ["access_token", "expires_in", "token_type", "refresh_token"];

/// Access/refresh token bundle issued by the provider
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenPair {
    access_token: String,
    refresh_token: Option<String>,
    token_type: String,
    expires_in: u64,
}

impl TokenPair {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        token_type: impl Into<String>,
        expires_in: u64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            token_type: token_type.into(),
            expires_in,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn expires_in(&self) -> u64 {
        self.expires_in
    }
}

/// The two grants this layer uses at the token endpoint
#[async_trait]
pub trait TokenExchangeClient: Send + Sync {
    /// `grant_type=authorization_code`
    async fn exchange_code(&self, code: &str) -> Result<TokenPair>;

    /// `grant_type=refresh_token`
    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenPair>;

    /// Where to send a user agent to start the authorization-code flow
    fn authorization_url(&self) -> Result<Url>;
}

/// [`TokenExchangeClient`] speaking form-encoded OAuth2 over reqwest
#[derive(Debug, Clone)]
pub struct HttpTokenExchangeClient {
    client: Client,
    config: OAuthClientConfig,
}

impl HttpTokenExchangeClient {
    pub fn new(config: OAuthClientConfig) -> Result<Self> {
        let client = match config.http_client.clone() {
            Some(client) => client,
            None => Client::builder().timeout(config.timeout).build()?,
        };

        Ok(Self { client, config })
    }

    async fn request_token(&self, grant_type: &str, params: &[(&str, &str)]) -> Result<TokenPair> {
        debug!(
            grant_type,
            token_endpoint = %self.config.token_endpoint,
            "requesting token"
        );

        let mut form = vec![("grant_type", grant_type)];
        form.extend_from_slice(params);

        let response = self
            .client
            .post(&self.config.token_endpoint)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&form)
            .send()
            .await
            .map_err(|e| exchange_failure(grant_type, format!("request failed: {e}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(exchange_failure(
                grant_type,
                format!("unexpected status {status}"),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| exchange_failure(grant_type, format!("unreadable body: {e}")))?;

        parse_token_response(&body).map_err(|cause| exchange_failure(grant_type, cause))
    }
}

#[async_trait]
impl TokenExchangeClient for HttpTokenExchangeClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenPair> {
        self.request_token(
            "authorization_code",
            &[("code", code), ("redirect_uri", self.config.redirect_uri.as_str())],
        )
        .await
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenPair> {
        self.request_token("refresh_token", &[("refresh_token", refresh_token)])
            .await
    }

    fn authorization_url(&self) -> Result<Url> {
        let endpoint = self.config.authorize_endpoint.as_deref().ok_or_else(|| {
            Error::InvalidConfig("no authorize endpoint configured".to_string())
        })?;

        let mut url = Url::parse(endpoint)
            .map_err(|e| Error::InvalidConfig(format!("authorize endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri);

        Ok(url)
    }
}

fn exchange_failure(grant_type: &str, cause: String) -> Error {
    warn!(grant_type, %cause, "unable to get token data");
    Error::Exchange(cause)
}

fn parse_token_response(body: &str) -> std::result::Result<TokenPair, String> {
    let value: Value = serde_json::from_str(body).map_err(|e| format!("malformed JSON: {e}"))?;

    let object = value
        .as_object()
        .ok_or_else(|| "response body is not a JSON object".to_string())?;

    if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !object.contains_key(**f)) {
        return Err(format!("missing field '{missing}'"));
    }

    serde_json::from_value(value).map_err(|e| format!("unexpected field type: {e}"))
}
