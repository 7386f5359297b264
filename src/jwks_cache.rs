use std::time::Duration;
use std::time::Instant;

use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::jwk::JwkSet;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::fetch_jwks_error;
use crate::error::openid_jwks_error;
use crate::error::Result;

#[derive(Debug, Deserialize)]
struct OpenIdConfig {
    jwks_uri: String,
}

struct CachedJwks {
    jwks: JwkSet,
    fetched_at: Instant,
}

impl CachedJwks {
    fn new(jwks: JwkSet) -> Self {
        Self {
            jwks,
            fetched_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() >= ttl
    }
}

/// Signing keys of a single issuer, cached with a TTL
pub(crate) struct JwksCache {
    issuer: String,
    /// Set up front by configuration or filled by the first discovery
    jwks_uri: RwLock<Option<String>>,
    cached: RwLock<Option<CachedJwks>>,
    ttl: Duration,
    client: Client,
}

impl JwksCache {
    pub(crate) fn new(
        issuer: impl Into<String>,
        jwks_uri: Option<String>,
        ttl: Duration,
        client: Client,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            jwks_uri: RwLock::new(jwks_uri),
            cached: RwLock::new(None),
            ttl,
            client,
        }
    }

    /// Find the key with the given id
    ///
    /// A kid missing from a still-fresh key set triggers one forced refetch,
    /// so keys rotated at the provider are picked up before the TTL runs out.
    pub(crate) async fn find_key(&self, kid: &str) -> Result<Option<Jwk>> {
        if let Some(jwks) = self.try_get_cached().await {
            if let Some(jwk) = jwks.find(kid) {
                return Ok(Some(jwk.clone()));
            }
            debug!(kid, "kid not in cached JWKS, refetching");
        }

        let jwks = self.refresh().await?;
        Ok(jwks.find(kid).cloned())
    }

    async fn try_get_cached(&self) -> Option<JwkSet> {
        let cached = self.cached.read().await;
        let cached = cached.as_ref()?;

        if cached.is_expired(self.ttl) {
            return None;
        }

        Some(cached.jwks.clone())
    }

    async fn refresh(&self) -> Result<JwkSet> {
        let jwks_uri = self.jwks_uri().await?;
        let jwks: JwkSet = self
            .client
            .get(&jwks_uri)
            .send()
            .await
            .map_err(fetch_jwks_error)?
            .error_for_status()
            .map_err(fetch_jwks_error)?
            .json()
            .await
            .map_err(fetch_jwks_error)?;

        *self.cached.write().await = Some(CachedJwks::new(jwks.clone()));

        Ok(jwks)
    }

    async fn jwks_uri(&self) -> Result<String> {
        if let Some(uri) = self.jwks_uri.read().await.as_ref() {
            return Ok(uri.clone());
        }

        let openid_url = format!(
            "{}/.well-known/openid-configuration",
            self.issuer.trim_end_matches('/')
        );
        let OpenIdConfig { jwks_uri } = self
            .client
            .get(&openid_url)
            .send()
            .await
            .map_err(openid_jwks_error)?
            .error_for_status()
            .map_err(openid_jwks_error)?
            .json()
            .await
            .map_err(openid_jwks_error)?;

        *self.jwks_uri.write().await = Some(jwks_uri.clone());

        Ok(jwks_uri)
    }
}
