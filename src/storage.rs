// Confidential key-value storage backing the credential store

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use dashmap::DashMap;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use crate::error::StorageError;

/// AES-GCM nonce length in bytes
const NONCE_LEN: usize = 12;

/// Required key length for AES-256
pub const KEY_LEN: usize = 32;

/// Key-value storage for secrets
///
/// Batch writes and deletes are all-or-nothing.
pub trait SecureStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_items(&self, items: &[(&str, &str)]) -> Result<(), StorageError>;

    fn delete_items(&self, keys: &[&str]) -> Result<(), StorageError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.set_items(&[(key, value)])
    }

    fn delete_item(&self, key: &str) -> Result<(), StorageError> {
        self.delete_items(&[key])
    }
}

/// Process-local storage, nothing survives a restart
///
/// Batches are applied key by key; `CredentialStore` serialises access so
/// readers never observe a half-applied batch.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).map(|entry| entry.value().clone()))
    }

    fn set_items(&self, items: &[(&str, &str)]) -> Result<(), StorageError> {
        for (key, value) in items {
            self.items.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn delete_items(&self, keys: &[&str]) -> Result<(), StorageError> {
        for key in keys {
            self.items.remove(*key);
        }
        Ok(())
    }
}

/// SQLite-backed storage with every value sealed by AES-256-GCM
///
/// Values are stored as `base64(nonce || ciphertext)` in an `auth_kv` table.
/// The database file is restricted to the owner on Unix.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    cipher: Aes256Gcm,
}

impl SqliteStorage {
    /// Open (or create) the database at `path` using a 32-byte key
    pub fn open(path: &Path, key: &[u8]) -> Result<Self, StorageError> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|_| StorageError::Crypto(format!("key must be {} bytes", KEY_LEN)))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS auth_kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            )",
        )?;
        restrict_permissions(path)?;

        tracing::debug!("Opened credential database: {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            cipher,
        })
    }

    fn seal(&self, plaintext: &str) -> Result<String, StorageError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| StorageError::Crypto("encryption failed".to_string()))?;

        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    fn unseal(&self, key: &str, stored: &str) -> Result<String, StorageError> {
        let corrupt = |reason: &str| StorageError::Corrupt {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        let raw = BASE64
            .decode(stored.as_bytes())
            .map_err(|_| corrupt("not valid base64"))?;
        if raw.len() <= NONCE_LEN {
            return Err(corrupt("value too short"));
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| {
                StorageError::Crypto(format!("cannot decrypt {} (wrong key or tampered value)", key))
            })?;

        String::from_utf8(plaintext).map_err(|_| corrupt("not valid UTF-8"))
    }
}

impl SecureStorage for SqliteStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let stored: Option<String> = {
            let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
            conn.query_row("SELECT value FROM auth_kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?
        };

        stored.map(|value| self.unseal(key, &value)).transpose()
    }

    fn set_items(&self, items: &[(&str, &str)]) -> Result<(), StorageError> {
        let sealed = items
            .iter()
            .map(|(key, value)| Ok((*key, self.seal(value)?)))
            .collect::<Result<Vec<_>, StorageError>>()?;

        let mut conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let tx = conn.transaction()?;
        for (key, value) in &sealed {
            tx.execute(
                "INSERT INTO auth_kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_items(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let tx = conn.transaction()?;
        for key in keys {
            tx.execute("DELETE FROM auth_kv WHERE key = ?1", [key])?;
        }
        tx.commit()?;
        Ok(())
    }
}

/// Read the storage key from `path`, generating one on first use
///
/// The key file holds the base64-encoded key and is created owner-only.
pub fn load_or_create_key(path: &Path) -> Result<Vec<u8>, StorageError> {
    if path.exists() {
        let encoded = fs::read_to_string(path)?;
        let key = BASE64
            .decode(encoded.trim().as_bytes())
            .map_err(|_| StorageError::Crypto(format!("key file {} is not base64", path.display())))?;
        if key.len() != KEY_LEN {
            return Err(StorageError::Crypto(format!(
                "key file {} must contain {} bytes, found {}",
                path.display(),
                KEY_LEN,
                key.len()
            )));
        }
        return Ok(key);
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let key = Aes256Gcm::generate_key(&mut OsRng);
    write_private(path, BASE64.encode(key).as_bytes())?;
    tracing::info!("Generated new credential key: {}", path.display());

    Ok(key.to_vec())
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    fs::write(path, contents)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
