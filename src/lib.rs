//! # shadow-auth
//!
//! OAuth2 authorization-code exchange, JWT validation and proactive token
//! renewal for applications that keep a local shadow record of every user
//! their identity provider signs in.
//!
//! ## Features
//!
//! - Authorization-code and refresh-token grants against a fixed token endpoint
//! - Access token verification against the issuer's JWKS, with TTL caching
//! - Explicit liveness check: verified but expired tokens are rejected
//! - Local identity records created and reconciled from verified claims
//! - Renewal sweep refreshing every identity within two minutes of expiry
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use shadow_auth::{
//!     HttpTokenExchangeClient, IdentityCache, JwtClaimsExtractor, MemoryIdentityStore,
//!     OAuthClientConfig, Principal, TokenLifecycleCoordinator, VerifierConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let extractor: JwtClaimsExtractor =
//!         JwtClaimsExtractor::new(VerifierConfig::new("https://idp.example.com", "my-app"))?;
//!     let exchange = HttpTokenExchangeClient::new(OAuthClientConfig::new(
//!         "my-app",
//!         "client-secret",
//!         "https://idp.example.com/token",
//!         "https://my-app.example.com/auth",
//!     ))?;
//!     let cache = IdentityCache::new(Arc::new(MemoryIdentityStore::new()));
//!
//!     let coordinator =
//!         TokenLifecycleCoordinator::new(Arc::new(extractor), Arc::new(exchange), cache);
//!
//!     // On the OAuth2 callback
//!     let identity = coordinator.authenticate_code("code-from-query").await?;
//!     println!("signed in: {}", identity.subject());
//!
//!     // From a scheduler
//!     let report = coordinator.renew_expiring().await?;
//!     println!("Success renews {}", report.renewed);
//!
//!     Ok(())
//! }
//! ```

mod cache;
mod claims;
mod config;
mod coordinator;
mod error;
mod exchange;
mod extractor;
mod identity;
mod jwks_cache;
mod session;
mod store;

// Re-exports for public API
pub use cache::IdentityCache;
pub use claims::AccessTokenClaims;
pub use claims::Claims;
pub use claims::TokenClaims;
pub use config::OAuthClientConfig;
pub use config::VerifierConfig;
pub use coordinator::RenewalReport;
pub use coordinator::TokenLifecycleCoordinator;
pub use coordinator::DEFAULT_LEAD_TIME_SECS;
pub use error::Error;
pub use error::ErrorKind;
pub use error::Result;
pub use exchange::HttpTokenExchangeClient;
pub use exchange::TokenExchangeClient;
pub use exchange::TokenPair;
pub use extractor::ClaimsExtractor;
pub use extractor::JwtClaimsExtractor;
pub use identity::Identity;
pub use identity::Principal;
pub use session::NoSession;
pub use session::SessionEstablisher;
pub use store::IdentityStore;
pub use store::JsonFileIdentityStore;
pub use store::MemoryIdentityStore;
