// Credential store
// Keeps the credential set in secure storage with an in-memory snapshot

use std::sync::Arc;
use tokio::sync::RwLock;

use super::types::CredentialSet;
use crate::error::StorageError;
use crate::storage::{MemoryStorage, SecureStorage};

const ACCESS_TOKEN_KEY: &str = "accessToken";
const REFRESH_TOKEN_KEY: &str = "refreshToken";
const SESSION_ID_KEY: &str = "sessionId";
const ACCESS_EXPIRY_KEY: &str = "access_token_expires_in";
const REFRESH_EXPIRY_KEY: &str = "refresh_token_expires_in";

const ALL_KEYS: [&str; 5] = [
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    SESSION_ID_KEY,
    ACCESS_EXPIRY_KEY,
    REFRESH_EXPIRY_KEY,
];

/// Durable store for the current credential set
///
/// Writes go to storage and the snapshot under the same write lock, so a
/// reader sees either the old set or the new one, never a mix.
pub struct CredentialStore {
    storage: Arc<dyn SecureStorage>,
    snapshot: RwLock<Option<CredentialSet>>,
}

impl CredentialStore {
    /// Open the store, loading any persisted credential set
    pub fn open(storage: Arc<dyn SecureStorage>) -> Result<Self, StorageError> {
        let snapshot = load(storage.as_ref())?;
        if snapshot.is_some() {
            tracing::info!("Loaded stored credentials");
        }

        Ok(Self {
            storage,
            snapshot: RwLock::new(snapshot),
        })
    }

    /// Empty store backed by process memory
    pub fn in_memory() -> Self {
        Self {
            storage: Arc::new(MemoryStorage::new()),
            snapshot: RwLock::new(None),
        }
    }

    /// Replace the whole credential set
    pub async fn save(&self, credentials: CredentialSet) -> Result<(), StorageError> {
        let mut snapshot = self.snapshot.write().await;

        let storage = Arc::clone(&self.storage);
        let values = [
            credentials.access_token.clone(),
            credentials.refresh_token.clone(),
            credentials.session_id.clone(),
            credentials.access_expiry.clone(),
            credentials.refresh_expiry.clone(),
        ];
        run_blocking(move || {
            let items: Vec<(&str, &str)> = ALL_KEYS
                .iter()
                .zip(values.iter())
                .map(|(key, value)| (*key, value.as_str()))
                .collect();
            storage.set_items(&items)
        })
        .await?;

        *snapshot = Some(credentials);
        Ok(())
    }

    /// Current credential set, or `None` when logged out
    pub async fn read_all(&self) -> Option<CredentialSet> {
        self.snapshot.read().await.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.snapshot
            .read()
            .await
            .as_ref()
            .map(|c| c.access_token.clone())
    }

    /// Remove every field
    ///
    /// The in-memory snapshot is dropped even if storage fails, so the
    /// process stops using the credentials either way.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let mut snapshot = self.snapshot.write().await;
        *snapshot = None;

        let storage = Arc::clone(&self.storage);
        run_blocking(move || storage.delete_items(&ALL_KEYS)).await
    }
}

/// Run a storage call on the blocking pool; backends may fsync
async fn run_blocking<F>(op: F) -> Result<(), StorageError>
where
    F: FnOnce() -> Result<(), StorageError> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
}

/// Read the persisted set; a partial set is discarded
fn load(storage: &dyn SecureStorage) -> Result<Option<CredentialSet>, StorageError> {
    let access_token = storage.get_item(ACCESS_TOKEN_KEY)?;
    let refresh_token = storage.get_item(REFRESH_TOKEN_KEY)?;
    let session_id = storage.get_item(SESSION_ID_KEY)?;
    let access_expiry = storage.get_item(ACCESS_EXPIRY_KEY)?;
    let refresh_expiry = storage.get_item(REFRESH_EXPIRY_KEY)?;

    match (access_token, refresh_token, session_id, access_expiry, refresh_expiry) {
        (Some(access_token), Some(refresh_token), Some(session_id), Some(access_expiry), Some(refresh_expiry)) => {
            Ok(Some(CredentialSet {
                access_token,
                refresh_token,
                session_id,
                access_expiry,
                refresh_expiry,
            }))
        }
        (None, None, None, None, None) => Ok(None),
        _ => {
            tracing::warn!("Discarding incomplete stored credentials");
            storage.delete_items(&ALL_KEYS)?;
            Ok(None)
        }
    }
}
