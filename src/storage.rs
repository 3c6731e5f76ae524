//! Persistence Medium
//!
//! Expiring key/value entries backing the token and preference stores.
//! An entry either lives for the current browsing session (the process) or
//! until a fixed instant. On disk, entries are encrypted with Windows DPAPI.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

#[cfg(windows)]
use windows::Win32::Security::Cryptography::{
    CryptProtectData, CryptUnprotectData, CRYPTPROTECT_UI_FORBIDDEN,
};
#[cfg(windows)]
use windows::Win32::Security::Cryptography::CRYPT_INTEGER_BLOB;

/// How long a stored entry survives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifetime {
    /// Dropped when the browsing session ends
    Session,
    /// Dropped at the given instant
    Until(DateTime<Utc>),
}

impl Lifetime {
    /// Expire `days` from now
    pub fn days(days: i64) -> Self {
        Lifetime::Until(Utc::now() + Duration::days(days))
    }

    pub fn is_expired(&self) -> bool {
        match self {
            Lifetime::Session => false,
            Lifetime::Until(at) => Utc::now() >= *at,
        }
    }
}

/// A key/value medium with per-entry expiry
pub trait Storage: Send + Sync {
    /// Read a live entry; expired entries read as absent
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write an entry, replacing any previous value and lifetime
    fn set(&self, key: &str, value: &str, lifetime: Lifetime) -> Result<(), StorageError>;

    /// Delete an entry if present
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Lifetime of a live entry
    fn lifetime(&self, key: &str) -> Result<Option<Lifetime>, StorageError>;

    /// Drop every session-scoped entry, as closing the browser would
    fn end_session(&self);
}

/// In-memory storage; everything is lost with the instance
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, (String, Lifetime)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_entry(&self, key: &str) -> Result<Option<(String, Lifetime)>, StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        let expired = matches!(entries.get(key), Some((_, lifetime)) if lifetime.is_expired());
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).cloned())
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.live_entry(key)?.map(|(value, _)| value))
    }

    fn set(&self, key: &str, value: &str, lifetime: Lifetime) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        entries.insert(key.to_string(), (value.to_string(), lifetime));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Unavailable)?;
        entries.remove(key);
        Ok(())
    }

    fn lifetime(&self, key: &str) -> Result<Option<Lifetime>, StorageError> {
        Ok(self.live_entry(key)?.map(|(_, lifetime)| lifetime))
    }

    fn end_session(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|_, (_, lifetime)| *lifetime != Lifetime::Session);
        }
    }
}

/// On-disk entry for expiring values
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Disk-backed storage. Entries with an expiry are encrypted on disk;
/// session-scoped entries never leave process memory.
pub struct FileStorage {
    storage_path: PathBuf,
    session: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Create storage rooted at `storage_path`
    pub fn with_path(storage_path: impl Into<PathBuf>) -> Self {
        let storage_path = storage_path.into();

        if let Err(e) = std::fs::create_dir_all(&storage_path) {
            error!("Failed to create storage directory: {}", e);
        }

        debug!("File storage initialized at: {:?}", storage_path);

        Self {
            storage_path,
            session: Mutex::new(HashMap::new()),
        }
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.storage_path.join(format!("{}.dat", key))
    }

    fn read_entry(&self, key: &str) -> Result<Option<StoredEntry>, StorageError> {
        let file_path = self.file_path(key);

        let encrypted = match std::fs::read(&file_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e.to_string())),
        };

        let decrypted = self.decrypt(&encrypted)?;

        let json = String::from_utf8(decrypted)
            .map_err(|e| StorageError::Decryption(e.to_string()))?;

        let entry: StoredEntry = serde_json::from_str(&json)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        if Utc::now() >= entry.expires_at {
            debug!("Stored entry expired for key: {}", key);
            self.delete_file(key)?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    fn write_entry(&self, key: &str, entry: &StoredEntry) -> Result<(), StorageError> {
        let json = serde_json::to_string(entry)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let encrypted = self.encrypt(json.as_bytes())?;

        std::fs::write(self.file_path(key), encrypted)
            .map_err(|e| StorageError::Io(e.to_string()))?;

        info!("Saved encrypted entry for key: {}", key);
        Ok(())
    }

    fn delete_file(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.file_path(key)) {
            Ok(()) => {
                debug!("Deleted stored entry for key: {}", key);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }

    fn session_value(&self, key: &str) -> Result<Option<String>, StorageError> {
        let session = self.session.lock().map_err(|_| StorageError::Unavailable)?;
        Ok(session.get(key).cloned())
    }

    #[cfg(windows)]
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        use std::ptr::null_mut;

        let input = CRYPT_INTEGER_BLOB {
            cbData: data.len() as u32,
            pbData: data.as_ptr() as *mut u8,
        };

        let mut output = CRYPT_INTEGER_BLOB {
            cbData: 0,
            pbData: null_mut(),
        };

        unsafe {
            let result = CryptProtectData(
                &input,
                None,
                None,
                None,
                None,
                CRYPTPROTECT_UI_FORBIDDEN,
                &mut output,
            );

            if result.is_err() {
                return Err(StorageError::Encryption("DPAPI encryption failed".into()));
            }

            let encrypted =
                std::slice::from_raw_parts(output.pbData, output.cbData as usize).to_vec();

            // Buffer is owned by DPAPI
            windows::Win32::Foundation::LocalFree(windows::Win32::Foundation::HLOCAL(
                output.pbData as *mut std::ffi::c_void,
            ));

            Ok(encrypted)
        }
    }

    #[cfg(windows)]
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        use std::ptr::null_mut;

        let input = CRYPT_INTEGER_BLOB {
            cbData: data.len() as u32,
            pbData: data.as_ptr() as *mut u8,
        };

        let mut output = CRYPT_INTEGER_BLOB {
            cbData: 0,
            pbData: null_mut(),
        };

        unsafe {
            let result = CryptUnprotectData(
                &input,
                None,
                None,
                None,
                None,
                CRYPTPROTECT_UI_FORBIDDEN,
                &mut output,
            );

            if result.is_err() {
                return Err(StorageError::Decryption("DPAPI decryption failed".into()));
            }

            let decrypted =
                std::slice::from_raw_parts(output.pbData, output.cbData as usize).to_vec();

            windows::Win32::Foundation::LocalFree(windows::Win32::Foundation::HLOCAL(
                output.pbData as *mut std::ffi::c_void,
            ));

            Ok(decrypted)
        }
    }

    #[cfg(not(windows))]
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        // No OS keystore off Windows; stored as plaintext
        Ok(data.to_vec())
    }

    #[cfg(not(windows))]
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        Ok(data.to_vec())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if let Some(value) = self.session_value(key)? {
            return Ok(Some(value));
        }
        Ok(self.read_entry(key)?.map(|entry| entry.value))
    }

    fn set(&self, key: &str, value: &str, lifetime: Lifetime) -> Result<(), StorageError> {
        match lifetime {
            Lifetime::Session => {
                self.delete_file(key)?;
                let mut session = self.session.lock().map_err(|_| StorageError::Unavailable)?;
                session.insert(key.to_string(), value.to_string());
                Ok(())
            }
            Lifetime::Until(expires_at) => {
                if let Ok(mut session) = self.session.lock() {
                    session.remove(key);
                }
                self.write_entry(
                    key,
                    &StoredEntry {
                        value: value.to_string(),
                        expires_at,
                    },
                )
            }
        }
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if let Ok(mut session) = self.session.lock() {
            session.remove(key);
        }
        self.delete_file(key)
    }

    fn lifetime(&self, key: &str) -> Result<Option<Lifetime>, StorageError> {
        if self.session_value(key)?.is_some() {
            return Ok(Some(Lifetime::Session));
        }
        Ok(self
            .read_entry(key)?
            .map(|entry| Lifetime::Until(entry.expires_at)))
    }

    fn end_session(&self) {
        if let Ok(mut session) = self.session.lock() {
            session.clear();
        }
    }
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Storage unavailable")]
    Unavailable,
}
