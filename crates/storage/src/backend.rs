//! Persistence substrate for emulated storage areas
//!
//! Storage areas are written against [`KeyValueBackend`], a synchronous
//! string-keyed store with index-based key enumeration. Two backends are
//! provided: an in-memory map for tests and short-lived hosts, and a sled
//! database for hosts that need the data to survive restarts.

use parking_lot::RwLock;
use sled::Db;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Backend error types
#[derive(Debug, Error)]
pub enum BackendError {
    /// Sled database error
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// Stored key or value is not valid UTF-8
    #[error("Invalid UTF-8 in stored data: {0}")]
    InvalidUtf8(String),
}

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Synchronous key-value store keyed by opaque text
///
/// Mirrors the contract of a browser's `localStorage`: point reads and
/// writes by exact key, plus enumeration through `len` and `key(index)`.
pub trait KeyValueBackend: Send + Sync {
    /// Get the text stored under `key`
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing an absent key is not an error
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Number of keys currently stored
    fn len(&self) -> Result<usize>;

    /// Key at position `index` in the backend's enumeration order
    fn key(&self, index: usize) -> Result<Option<String>>;

    /// Check if the backend holds no keys
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Snapshot of every key, in enumeration order
    fn keys(&self) -> Result<Vec<String>> {
        let len = self.len()?;
        let mut keys = Vec::with_capacity(len);
        for index in 0..len {
            if let Some(key) = self.key(index)? {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

/// In-memory backend with sorted key enumeration
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }

    fn key(&self, index: usize) -> Result<Option<String>> {
        Ok(self.entries.read().keys().nth(index).cloned())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

/// Sled backend configuration
#[derive(Debug, Clone)]
pub struct SledConfig {
    /// Database path
    pub path: String,
    /// Cache capacity in bytes
    pub cache_capacity: u64,
    /// Enable compression
    pub use_compression: bool,
    /// Background flush interval in milliseconds; `None` disables background
    /// flushing, leaving persistence to explicit [`SledBackend::flush`] calls
    pub flush_every_ms: Option<u64>,
}

impl Default for SledConfig {
    fn default() -> Self {
        Self {
            path: "text_pwa_storage.db".to_string(),
            cache_capacity: 16 * 1024 * 1024, // 16MB
            use_compression: true,
            flush_every_ms: Some(500),
        }
    }
}

impl SledConfig {
    /// Create a new configuration with a custom path
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    /// Set cache capacity in bytes
    pub fn cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Enable or disable compression
    pub fn use_compression(mut self, enabled: bool) -> Self {
        self.use_compression = enabled;
        self
    }

    /// Set flush interval in milliseconds
    pub fn flush_every_ms(mut self, ms: Option<u64>) -> Self {
        self.flush_every_ms = ms;
        self
    }
}

/// Backend persisted in a sled database
#[derive(Clone)]
pub struct SledBackend {
    db: Arc<Db>,
}

impl SledBackend {
    /// Open (or create) a sled database with configuration
    pub fn open(config: SledConfig) -> Result<Self> {
        let db = sled::Config::new()
            .path(&config.path)
            .cache_capacity(config.cache_capacity)
            .use_compression(config.use_compression)
            .flush_every_ms(config.flush_every_ms)
            .open()?;
        tracing::debug!(path = %config.path, "opened sled storage backend");

        Ok(Self { db: Arc::new(db) })
    }

    /// Create a temporary sled database (for testing)
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn decode(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| BackendError::InvalidUtf8(e.to_string()))
}

impl KeyValueBackend for SledBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.db.get(key.as_bytes())?.map(|bytes| decode(&bytes)).transpose()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.db.insert(key.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.db.remove(key.as_bytes())?;
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.db.len())
    }

    fn key(&self, index: usize) -> Result<Option<String>> {
        match self.db.iter().keys().nth(index) {
            Some(key) => Ok(Some(decode(&key?)?)),
            None => Ok(None),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for key in self.db.iter().keys() {
            keys.push(decode(&key?)?);
        }
        Ok(keys)
    }
}
