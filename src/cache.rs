use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use tracing::debug;
use tracing::error;

use crate::claims::Claims;
use crate::error::Result;
use crate::exchange::TokenPair;
use crate::identity::Identity;
use crate::store::IdentityStore;

/// Owner of the local identity records
///
/// The only place where local state is reconciled with what the provider
/// asserts. Writes are lenient: when the store refuses a write, the caller
/// gets the record as it was before instead of an error, as long as there
/// was one.
#[derive(Clone)]
pub struct IdentityCache {
    store: Arc<dyn IdentityStore>,
}

impl IdentityCache {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    pub async fn find_by_subject(&self, subject: &str) -> Result<Option<Identity>> {
        self.store.find_one_by_subject(subject).await
    }

    /// Create or update the identity for `claims.subject()`
    ///
    /// A pair without a refresh token leaves a stored one in place.
    pub async fn upsert_from_claims(&self, claims: &Claims, pair: &TokenPair) -> Result<Identity> {
        let subject = claims.subject();

        // a failed read is "not seen yet"; the store's keying resolves the race
        let existing = match self.store.find_one_by_subject(subject).await {
            Ok(existing) => existing,
            Err(e) => {
                error!(subject, error = %e, "identity lookup failed, treating as new");
                None
            }
        };

        let mut identity = existing
            .clone()
            .unwrap_or_else(|| Identity::blank(subject));

        identity.expires_at = claims.expires_at();
        identity.roles = claims.roles().clone();
        identity.access_token = pair.access_token().to_string();
        if let Some(refresh_token) = pair.refresh_token() {
            identity.refresh_token = Some(refresh_token.to_string());
        }

        match self.store.save(&identity).await {
            Ok(()) => {
                debug!(
                    subject,
                    created = existing.is_none(),
                    expires_at = %identity.expires_at,
                    "identity saved"
                );
                Ok(identity)
            }
            Err(e) => {
                error!(subject, error = %e, "error when saving identity");
                existing.ok_or(e)
            }
        }
    }

    pub async fn find_expiring_before(&self, instant: DateTime<Utc>) -> Result<Vec<Identity>> {
        self.store.find_expiring_before(instant).await
    }
}
