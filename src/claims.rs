use std::collections::BTreeSet;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;

/// Trait for accessing the JWT claims the lifecycle depends on
///
/// Providers disagree on where roles live; implementing this trait for a
/// provider-specific claims struct lets [`JwtClaimsExtractor`](crate::JwtClaimsExtractor)
/// validate and convert it generically.
pub trait TokenClaims {
    /// Get the issuer (iss) claim
    fn iss(&self) -> &str;

    /// Get the subject (sub) claim, if the token carries one
    fn sub(&self) -> Option<&str>;

    /// Get the expiration time (exp) claim as a Unix timestamp
    fn exp(&self) -> i64;

    /// Roles granted to the subject
    fn roles(&self) -> &[String];
}

/// Default claims layout: roles as a top-level `roles` array
#[derive(Debug, Deserialize)]
pub struct AccessTokenClaims {
    pub iss: String,
    #[serde(default)]
    pub sub: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl TokenClaims for AccessTokenClaims {
    fn iss(&self) -> &str {
        &self.iss
    }

    fn sub(&self) -> Option<&str> {
        self.sub.as_deref()
    }

    fn exp(&self) -> i64 {
        self.exp
    }

    fn roles(&self) -> &[String] {
        &self.roles
    }
}

/// Verified identity assertions extracted from an access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    subject: String,
    roles: BTreeSet<String>,
    expires_at: DateTime<Utc>,
}

impl Claims {
    pub fn new<I, S>(subject: impl Into<String>, roles: I, expires_at: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subject: subject.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            expires_at,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}
