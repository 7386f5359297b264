use std::collections::BTreeSet;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// What the authentication boundary needs to know about a signed-in caller
pub trait Principal {
    fn subject(&self) -> &str;

    fn roles(&self) -> &BTreeSet<String>;

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool;

    fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Locally persisted shadow of a provider identity, keyed by subject
///
/// Read-only outside the crate; every change goes through
/// [`IdentityCache`](crate::IdentityCache).
///
/// ```compile_fail
/// # fn touch(identity: &mut shadow_auth::Identity) {
/// identity.access_token = String::new();
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub(crate) subject: String,
    pub(crate) expires_at: DateTime<Utc>,
    pub(crate) roles: BTreeSet<String>,
    pub(crate) access_token: String,
    pub(crate) refresh_token: Option<String>,
}

impl Identity {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// A record for a subject never seen before; every other field is
    /// overwritten by the first upsert
    pub(crate) fn blank(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            expires_at: DateTime::<Utc>::UNIX_EPOCH,
            roles: BTreeSet::new(),
            access_token: String::new(),
            refresh_token: None,
        }
    }
}

impl Principal for Identity {
    fn subject(&self) -> &str {
        &self.subject
    }

    fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
