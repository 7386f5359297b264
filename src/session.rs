use async_trait::async_trait;

use crate::error::Result;
use crate::identity::Identity;

/// Hosting boundary hook that binds the current caller to an identity
///
/// Web frameworks implement this over their own session or request
/// extensions. It runs after the identity has been persisted.
#[async_trait]
pub trait SessionEstablisher: Send + Sync {
    async fn establish_session(&self, identity: &Identity) -> Result<()>;
}

/// For callers with no session to bind, such as batch jobs
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSession;

#[async_trait]
impl SessionEstablisher for NoSession {
    async fn establish_session(&self, _identity: &Identity) -> Result<()> {
        Ok(())
    }
}
