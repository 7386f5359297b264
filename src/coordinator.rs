//! Token lifecycle orchestration
//!
//! Two entry points drive every state change of an [`Identity`]:
//!
//! - interactive authentication, per inbound bearer token or per
//!   authorization-code callback, which materializes or refreshes the local
//!   identity from verified claims;
//! - the renewal sweep, which trades refresh tokens for new pairs for every
//!   identity about to expire.
//!
//! Refresh tokens are single use at most providers. Sweeps therefore never
//! overlap, and renewals of the same subject are serialized.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Duration;
use chrono::Utc;
use reqwest::Url;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::cache::IdentityCache;
use crate::error::Error;
use crate::error::Result;
use crate::exchange::TokenExchangeClient;
use crate::exchange::TokenPair;
use crate::extractor::ClaimsExtractor;
use crate::identity::Identity;
use crate::session::NoSession;
use crate::session::SessionEstablisher;

/// How far ahead of expiry an identity becomes a renewal candidate
pub const DEFAULT_LEAD_TIME_SECS: i64 = 120;

/// Outcome counts of one renewal sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenewalReport {
    pub candidates: usize,
    pub renewed: usize,
    /// No refresh token stored, or renewed concurrently by someone else
    pub skipped: usize,
    /// Exchange, verification or subject mismatch; retried next sweep
    pub failed: usize,
}

enum Renewal {
    Renewed,
    Skipped,
    Failed,
}

pub struct TokenLifecycleCoordinator {
    extractor: Arc<dyn ClaimsExtractor>,
    exchange: Arc<dyn TokenExchangeClient>,
    cache: IdentityCache,
    session: Arc<dyn SessionEstablisher>,
    lead_time: Duration,
    sweep: Mutex<()>,
    renewals: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TokenLifecycleCoordinator {
    pub fn new(
        extractor: Arc<dyn ClaimsExtractor>,
        exchange: Arc<dyn TokenExchangeClient>,
        cache: IdentityCache,
    ) -> Self {
        Self {
            extractor,
            exchange,
            cache,
            session: Arc::new(NoSession),
            lead_time: Duration::seconds(DEFAULT_LEAD_TIME_SECS),
            sweep: Mutex::new(()),
            renewals: Mutex::new(HashMap::new()),
        }
    }

    /// Set the boundary that binds authenticated callers to their identity
    pub fn with_session(mut self, session: Arc<dyn SessionEstablisher>) -> Self {
        self.session = session;
        self
    }

    /// Set the renewal lead time
    pub fn with_lead_time(mut self, lead_time: Duration) -> Self {
        self.lead_time = lead_time;
        self
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Only the presence of an `Authorization` header selects the JWT path
    pub fn is_authentication_request(authorization: Option<&str>) -> bool {
        authorization.is_some()
    }

    /// Where to send a user agent that has to log in
    pub fn authorization_url(&self) -> Result<Url> {
        self.exchange.authorization_url()
    }

    /// Authenticate a request carrying `Authorization: <type> <jwt>`
    ///
    /// Rejections from the extractor are returned as they are. The stored
    /// refresh token survives a re-presented access token.
    pub async fn authenticate_bearer(&self, authorization: &str) -> Result<Identity> {
        let (token_type, token) = split_authorization(authorization)?;

        let claims = self.extractor.extract(token).await?;

        let prior_refresh_token = match self.cache.find_by_subject(claims.subject()).await {
            Ok(prior) => prior.and_then(|identity| identity.refresh_token),
            Err(e) => {
                warn!(subject = claims.subject(), error = %e, "identity lookup failed");
                None
            }
        };

        let remaining = (claims.expires_at() - Utc::now()).num_seconds().max(0);
        let pair = TokenPair::new(token, prior_refresh_token, token_type, remaining as u64);

        let identity = self.cache.upsert_from_claims(&claims, &pair).await?;
        self.session.establish_session(&identity).await?;

        Ok(identity)
    }

    /// Complete the authorization-code callback
    ///
    /// Every failure collapses into [`Error::AuthenticationFailed`]; the
    /// cause is only logged.
    pub async fn authenticate_code(&self, code: &str) -> Result<Identity> {
        let pair = self.exchange.exchange_code(code).await.map_err(|e| {
            warn!(error = %e, "authorization code exchange failed");
            Error::AuthenticationFailed
        })?;

        let claims = self
            .extractor
            .extract(pair.access_token())
            .await
            .map_err(|e| {
                error!(error = %e, "provider issued an access token that does not verify");
                Error::AuthenticationFailed
            })?;

        let identity = self.cache.upsert_from_claims(&claims, &pair).await?;
        self.session.establish_session(&identity).await?;

        info!(subject = %identity.subject, "authenticated via authorization code");

        Ok(identity)
    }

    /// Renew every identity expiring within the lead time
    ///
    /// Per-identity failures are counted, never propagated. Returns
    /// [`Error::SweepInProgress`] if another sweep holds the lock, and the
    /// store's error if candidates cannot be listed.
    pub async fn renew_expiring(&self) -> Result<RenewalReport> {
        let _sweep = self.sweep.try_lock().map_err(|_| Error::SweepInProgress)?;

        let threshold = Utc::now() + self.lead_time;
        let candidates = self.cache.find_expiring_before(threshold).await?;

        let mut report = RenewalReport {
            candidates: candidates.len(),
            ..RenewalReport::default()
        };

        for candidate in &candidates {
            match self.renew(candidate).await {
                Renewal::Renewed => report.renewed += 1,
                Renewal::Skipped => report.skipped += 1,
                Renewal::Failed => report.failed += 1,
            }
        }

        info!(
            candidates = report.candidates,
            renewed = report.renewed,
            skipped = report.skipped,
            failed = report.failed,
            "renewal sweep finished"
        );

        Ok(report)
    }

    /// Sweep every `period` until `shutdown` resolves
    ///
    /// A sweep that outlasts the period delays the next one instead of
    /// overlapping it.
    pub async fn run_renewal_schedule<F>(&self, period: std::time::Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("renewal schedule stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.renew_expiring().await {
                        warn!(error = %e, "renewal sweep aborted");
                    }
                }
            }
        }
    }

    async fn renew(&self, candidate: &Identity) -> Renewal {
        let subject = candidate.subject.as_str();

        let guard = self.subject_guard(subject).await;
        let outcome = {
            let _renewing = guard.lock().await;
            self.renew_locked(candidate).await
        };
        drop(guard);
        self.release_subject_guard(subject).await;

        outcome
    }

    async fn renew_locked(&self, candidate: &Identity) -> Renewal {
        let subject = candidate.subject.as_str();

        // someone may have renewed this subject while we waited for the lock
        let current = match self.cache.find_by_subject(subject).await {
            Ok(Some(current)) => current,
            Ok(None) => candidate.clone(),
            Err(e) => {
                warn!(subject, error = %e, "identity re-read failed, using sweep snapshot");
                candidate.clone()
            }
        };

        if current.expires_at > candidate.expires_at {
            debug!(subject, "already renewed");
            return Renewal::Skipped;
        }

        let Some(refresh_token) = current.refresh_token.as_deref() else {
            debug!(subject, "no refresh token stored, cannot renew");
            return Renewal::Skipped;
        };

        let pair = match self.exchange.exchange_refresh_token(refresh_token).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(subject, error = %e, "refresh exchange failed");
                return Renewal::Failed;
            }
        };

        let claims = match self.extractor.extract(pair.access_token()).await {
            Ok(claims) => claims,
            Err(e) => {
                warn!(subject, error = %e, "refreshed access token rejected");
                return Renewal::Failed;
            }
        };

        if claims.subject() != subject {
            warn!(
                subject,
                issued_for = claims.subject(),
                "refreshed token belongs to another subject"
            );
            return Renewal::Failed;
        }

        match self.cache.upsert_from_claims(&claims, &pair).await {
            Ok(_) => {
                debug!(subject, "identity renewed");
                Renewal::Renewed
            }
            Err(e) => {
                warn!(subject, error = %e, "renewed identity could not be stored");
                Renewal::Failed
            }
        }
    }

    async fn subject_guard(&self, subject: &str) -> Arc<Mutex<()>> {
        self.renewals
            .lock()
            .await
            .entry(subject.to_string())
            .or_default()
            .clone()
    }

    async fn release_subject_guard(&self, subject: &str) {
        let mut renewals = self.renewals.lock().await;
        if renewals
            .get(subject)
            .is_some_and(|guard| Arc::strong_count(guard) == 1)
        {
            renewals.remove(subject);
        }
    }
}

fn split_authorization(header: &str) -> Result<(&str, &str)> {
    let (token_type, token) = header
        .trim()
        .split_once(' ')
        .ok_or(Error::MalformedAuthorizationHeader)?;
    let token = token.trim();

    if token_type.is_empty() || token.is_empty() || token.contains(' ') {
        return Err(Error::MalformedAuthorizationHeader);
    }

    Ok((token_type, token))
}
