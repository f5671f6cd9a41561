//! Emulated extension storage areas
//!
//! A [`StorageArea`] exposes the extension platform's `storage.<area>` API on
//! top of a [`KeyValueBackend`]. Every physical key is prefixed with
//! `"<namespace>-<area>-"`, so `local` and `sync` can share one backend
//! without seeing each other's keys. Values are stored as JSON text.
//!
//! Operations are async to mirror the platform's callback contract: the
//! work happens when the future is first polled, and the future yields to
//! the scheduler once before resolving, so completion is never observed in
//! the same scheduling turn as the call.

use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::backend::{BackendError, KeyValueBackend};
use crate::events::{ChangeListeners, StorageChange, StorageChanges};

/// Storage area error types
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend error
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key selector of an unsupported shape
    #[error("Invalid keys: {0}")]
    InvalidKeys(String),
}

/// Result type for storage area operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Which keys a `get` call should return
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StorageKeys {
    /// Every entry in the area
    #[default]
    All,
    /// A single key, omitted from the result if absent
    One(String),
    /// Several keys, absent ones omitted
    Many(Vec<String>),
    /// Key → default value; every key appears in the result
    Defaults(Map<String, Value>),
}

impl StorageKeys {
    /// Interpret a dynamic JSON key selector
    ///
    /// `null` selects everything, a string one key, an array of strings a
    /// list, and an object a key → default mapping.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::All),
            Value::String(key) => Ok(Self::One(key)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(key) => Ok(key),
                    other => Err(StorageError::InvalidKeys(format!(
                        "expected string key, got {}",
                        other
                    ))),
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::Many),
            Value::Object(defaults) => Ok(Self::Defaults(defaults)),
            other => Err(StorageError::InvalidKeys(format!("unsupported selector {}", other))),
        }
    }
}

impl From<&str> for StorageKeys {
    fn from(key: &str) -> Self {
        Self::One(key.to_string())
    }
}

impl From<String> for StorageKeys {
    fn from(key: String) -> Self {
        Self::One(key)
    }
}

impl From<Vec<String>> for StorageKeys {
    fn from(keys: Vec<String>) -> Self {
        Self::Many(keys)
    }
}

impl From<Vec<&str>> for StorageKeys {
    fn from(keys: Vec<&str>) -> Self {
        Self::Many(keys.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for StorageKeys {
    fn from(keys: [&str; N]) -> Self {
        Self::Many(keys.iter().map(|k| (*k).to_string()).collect())
    }
}

impl From<Map<String, Value>> for StorageKeys {
    fn from(defaults: Map<String, Value>) -> Self {
        Self::Defaults(defaults)
    }
}

impl From<Option<StorageKeys>> for StorageKeys {
    fn from(keys: Option<StorageKeys>) -> Self {
        keys.unwrap_or(Self::All)
    }
}

/// Storage emulation configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Prefix placed before the area name in every physical key
    pub namespace_prefix: String,
    /// Emit change events from `remove` and `clear`
    pub notify_on_remove: bool,
    /// Capacity of the change event broadcast channel
    pub event_buffer: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            namespace_prefix: "chrome-storage".to_string(),
            notify_on_remove: true,
            event_buffer: 64,
        }
    }
}

impl StorageConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the namespace prefix
    pub fn namespace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.namespace_prefix = prefix.into();
        self
    }

    /// Enable or disable change events for `remove` and `clear`
    pub fn notify_on_remove(mut self, enabled: bool) -> Self {
        self.notify_on_remove = enabled;
        self
    }

    /// Set the change event buffer size
    pub fn event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size;
        self
    }

    /// Physical key prefix for an area
    ///
    /// The area name is escaped so it never contains the `-` separator; no
    /// area's prefix can then be the start of another area's prefix.
    pub fn area_prefix(&self, area: &str) -> String {
        format!("{}-{}-", self.namespace_prefix, escape_area_name(area))
    }
}

/// Escape `%` and `-` in an area name
fn escape_area_name(area: &str) -> String {
    let mut escaped = String::with_capacity(area.len());
    for c in area.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '-' => escaped.push_str("%2D"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Parse stored text, falling back to the raw text as a string
fn decode_value(raw: String) -> Value {
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(_) => Value::String(raw),
    }
}

/// One namespaced storage area
#[derive(Clone)]
pub struct StorageArea {
    name: String,
    prefix: String,
    backend: Arc<dyn KeyValueBackend>,
    listeners: ChangeListeners,
    notify_on_remove: bool,
}

impl std::fmt::Debug for StorageArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageArea")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl StorageArea {
    /// Create an area over `backend`, reporting changes to `listeners`
    pub fn new(
        name: impl Into<String>,
        config: &StorageConfig,
        backend: Arc<dyn KeyValueBackend>,
        listeners: ChangeListeners,
    ) -> Self {
        let name = name.into();
        let prefix = config.area_prefix(&name);
        Self {
            name,
            prefix,
            backend,
            listeners,
            notify_on_remove: config.notify_on_remove,
        }
    }

    /// Area name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical key prefix of this area
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn physical_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.backend.get_item(&self.physical_key(key))?.map(decode_value))
    }

    /// Physical keys currently belonging to this area
    fn physical_keys(&self) -> Result<Vec<String>> {
        Ok(self
            .backend
            .keys()?
            .into_iter()
            .filter(|key| key.starts_with(&self.prefix))
            .collect())
    }

    /// Read entries selected by `keys`
    pub async fn get(&self, keys: impl Into<StorageKeys>) -> Result<Map<String, Value>> {
        let result = self.get_now(keys.into())?;
        tokio::task::yield_now().await;
        Ok(result)
    }

    fn get_now(&self, keys: StorageKeys) -> Result<Map<String, Value>> {
        let mut result = Map::new();

        match keys {
            StorageKeys::All => {
                for physical in self.physical_keys()? {
                    if let Some(raw) = self.backend.get_item(&physical)? {
                        let key = physical[self.prefix.len()..].to_string();
                        result.insert(key, decode_value(raw));
                    }
                }
            }
            StorageKeys::One(key) => {
                if let Some(value) = self.read(&key)? {
                    result.insert(key, value);
                }
            }
            StorageKeys::Many(keys) => {
                for key in keys {
                    if let Some(value) = self.read(&key)? {
                        result.insert(key, value);
                    }
                }
            }
            StorageKeys::Defaults(defaults) => {
                for (key, default) in defaults {
                    let value = self.read(&key)?.unwrap_or(default);
                    result.insert(key, value);
                }
            }
        }

        Ok(result)
    }

    /// Write `items` and notify listeners once with every change
    pub async fn set(&self, items: Map<String, Value>) -> Result<StorageChanges> {
        let changes = self.set_now(items)?;
        tokio::task::yield_now().await;
        Ok(changes)
    }

    fn set_now(&self, items: Map<String, Value>) -> Result<StorageChanges> {
        let mut changes = StorageChanges::new();

        for (key, new_value) in items {
            let old_value = self.read(&key)?;
            let text = serde_json::to_string(&new_value)?;
            self.backend.set_item(&self.physical_key(&key), &text)?;
            changes.insert(key, StorageChange { old_value, new_value: Some(new_value) });
        }

        tracing::debug!(area = %self.name, keys = changes.len(), "storage set");
        self.listeners.notify(&self.name, changes.clone());
        Ok(changes)
    }

    /// Remove the given keys; absent keys are ignored
    pub async fn remove(&self, keys: impl Into<RemoveKeys>) -> Result<StorageChanges> {
        let changes = self.remove_now(keys.into().0)?;
        tokio::task::yield_now().await;
        Ok(changes)
    }

    fn remove_now(&self, keys: Vec<String>) -> Result<StorageChanges> {
        let mut changes = StorageChanges::new();

        for key in keys {
            let physical = self.physical_key(&key);
            if let Some(raw) = self.backend.get_item(&physical)? {
                self.backend.remove_item(&physical)?;
                changes.insert(
                    key,
                    StorageChange { old_value: Some(decode_value(raw)), new_value: None },
                );
            }
        }

        tracing::debug!(area = %self.name, keys = changes.len(), "storage remove");
        if self.notify_on_remove && !changes.is_empty() {
            self.listeners.notify(&self.name, changes.clone());
        }
        Ok(changes)
    }

    /// Remove every entry of this area
    pub async fn clear(&self) -> Result<StorageChanges> {
        let changes = self.clear_now()?;
        tokio::task::yield_now().await;
        Ok(changes)
    }

    fn clear_now(&self) -> Result<StorageChanges> {
        let mut changes = StorageChanges::new();

        // Collect first: removing while enumerating shifts indices.
        for physical in self.physical_keys()? {
            if let Some(raw) = self.backend.get_item(&physical)? {
                self.backend.remove_item(&physical)?;
                let key = physical[self.prefix.len()..].to_string();
                changes.insert(
                    key,
                    StorageChange { old_value: Some(decode_value(raw)), new_value: None },
                );
            }
        }

        tracing::debug!(area = %self.name, keys = changes.len(), "storage clear");
        if self.notify_on_remove && !changes.is_empty() {
            self.listeners.notify(&self.name, changes.clone());
        }
        Ok(changes)
    }
}

/// Keys accepted by [`StorageArea::remove`]: one key or a list
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveKeys(pub Vec<String>);

impl From<&str> for RemoveKeys {
    fn from(key: &str) -> Self {
        Self(vec![key.to_string()])
    }
}

impl From<String> for RemoveKeys {
    fn from(key: String) -> Self {
        Self(vec![key])
    }
}

impl From<Vec<String>> for RemoveKeys {
    fn from(keys: Vec<String>) -> Self {
        Self(keys)
    }
}

impl From<Vec<&str>> for RemoveKeys {
    fn from(keys: Vec<&str>) -> Self {
        Self(keys.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for RemoveKeys {
    fn from(keys: [&str; N]) -> Self {
        Self(keys.iter().map(|k| (*k).to_string()).collect())
    }
}
