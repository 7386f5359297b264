//! Persistence for [`Identity`] records
//!
//! The store is a narrow collaborator: lookup by subject, save keyed by
//! subject, and a range query on expiry. Uniqueness per subject comes from the
//! keying here, never from caller logic.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::persistence_error;
use crate::error::Result;
use crate::identity::Identity;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_one_by_subject(&self, subject: &str) -> Result<Option<Identity>>;

    /// Insert or replace the record with the same subject
    async fn save(&self, identity: &Identity) -> Result<()>;

    /// Every record with `expires_at <= instant`, in no particular order
    async fn find_expiring_before(&self, instant: DateTime<Utc>) -> Result<Vec<Identity>>;
}

/// Process-local store, lost on exit
#[derive(Default)]
pub struct MemoryIdentityStore {
    identities: RwLock<HashMap<String, Identity>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_one_by_subject(&self, subject: &str) -> Result<Option<Identity>> {
        Ok(self.identities.read().await.get(subject).cloned())
    }

    async fn save(&self, identity: &Identity) -> Result<()> {
        self.identities
            .write()
            .await
            .insert(identity.subject.clone(), identity.clone());
        Ok(())
    }

    async fn find_expiring_before(&self, instant: DateTime<Utc>) -> Result<Vec<Identity>> {
        Ok(expiring_before(self.identities.read().await.values(), instant))
    }
}

/// Store backed by a single JSON document on disk
///
/// The whole document is held in memory and rewritten on every save through
/// a sibling temp file and a rename, so readers never see a torn file.
pub struct JsonFileIdentityStore {
    path: PathBuf,
    identities: RwLock<HashMap<String, Identity>>,
}

impl JsonFileIdentityStore {
    /// Load the document at `path`; a missing file is an empty store
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let identities = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => {
                let records: Vec<Identity> =
                    serde_json::from_slice(&bytes).map_err(persistence_error)?;
                records
                    .into_iter()
                    .map(|identity| (identity.subject.clone(), identity))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(persistence_error(e)),
        };

        Ok(Self {
            path,
            identities: RwLock::new(identities),
        })
    }

    async fn write_document(&self, identities: &HashMap<String, Identity>) -> Result<()> {
        let mut records: Vec<&Identity> = identities.values().collect();
        records.sort_by(|a, b| a.subject.cmp(&b.subject));

        let bytes = serde_json::to_vec_pretty(&records).map_err(persistence_error)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(persistence_error)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(persistence_error)
    }
}

#[async_trait]
impl IdentityStore for JsonFileIdentityStore {
    async fn find_one_by_subject(&self, subject: &str) -> Result<Option<Identity>> {
        Ok(self.identities.read().await.get(subject).cloned())
    }

    async fn save(&self, identity: &Identity) -> Result<()> {
        let mut identities = self.identities.write().await;
        let previous = identities.insert(identity.subject.clone(), identity.clone());

        if let Err(e) = self.write_document(&identities).await {
            // keep memory in line with what is on disk
            match previous {
                Some(previous) => identities.insert(previous.subject.clone(), previous),
                None => identities.remove(&identity.subject),
            };
            return Err(e);
        }

        Ok(())
    }

    async fn find_expiring_before(&self, instant: DateTime<Utc>) -> Result<Vec<Identity>> {
        Ok(expiring_before(self.identities.read().await.values(), instant))
    }
}

fn expiring_before<'a>(
    identities: impl Iterator<Item = &'a Identity>,
    instant: DateTime<Utc>,
) -> Vec<Identity> {
    identities
        .filter(|identity| identity.expires_at <= instant)
        .cloned()
        .collect()
}
