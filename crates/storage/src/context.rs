//! Storage emulation context
//!
//! One [`StorageEmulation`] is created at startup and lives for the whole
//! process. It owns the persistence backend, the listener registry shared by
//! all of its areas, and the areas themselves.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::area::{StorageArea, StorageConfig};
use crate::backend::KeyValueBackend;
use crate::events::ChangeListeners;

/// Name of the device-local storage area
pub const LOCAL_AREA: &str = "local";

/// Name of the synced storage area
pub const SYNC_AREA: &str = "sync";

/// Owner of every emulated storage area of one process
pub struct StorageEmulation {
    config: StorageConfig,
    backend: Arc<dyn KeyValueBackend>,
    listeners: ChangeListeners,
    areas: RwLock<HashMap<String, StorageArea>>,
}

impl std::fmt::Debug for StorageEmulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEmulation")
            .field("config", &self.config)
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl StorageEmulation {
    /// Create the context with the `local` and `sync` areas
    pub fn new(config: StorageConfig, backend: Arc<dyn KeyValueBackend>) -> Self {
        let listeners = ChangeListeners::new(config.event_buffer);
        let emulation = Self {
            config,
            backend,
            listeners,
            areas: RwLock::new(HashMap::new()),
        };
        emulation.area(LOCAL_AREA);
        emulation.area(SYNC_AREA);
        emulation
    }

    /// The `local` area
    pub fn local(&self) -> StorageArea {
        self.area(LOCAL_AREA)
    }

    /// The `sync` area
    pub fn sync(&self) -> StorageArea {
        self.area(SYNC_AREA)
    }

    /// Get an area by name, creating it on first use
    pub fn area(&self, name: &str) -> StorageArea {
        if let Some(area) = self.areas.read().get(name) {
            return area.clone();
        }

        self.areas
            .write()
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(area = name, "creating storage area");
                StorageArea::new(name, &self.config, self.backend.clone(), self.listeners.clone())
            })
            .clone()
    }

    /// Names of the areas created so far, sorted
    pub fn area_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.areas.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// The `onChanged` registry shared by every area
    pub fn on_changed(&self) -> &ChangeListeners {
        &self.listeners
    }

    /// The persistence backend
    pub fn backend(&self) -> &Arc<dyn KeyValueBackend> {
        &self.backend
    }

    /// Configuration in use
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Drop every change listener
    ///
    /// Areas keep working afterwards but notify nobody.
    pub fn dispose(&self) {
        self.listeners.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::events::{Listener, StorageChanges};
    use crate::area::StorageKeys;
    use parking_lot::Mutex;
    use serde_json::{json, Map, Value};

    fn items(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_areas_are_isolated() {
        let emulation = StorageEmulation::new(StorageConfig::default(), Arc::new(MemoryBackend::new()));

        emulation.sync().set(items(json!({ "k": "synced" }))).await.unwrap();

        assert!(emulation.local().get("k").await.unwrap().is_empty());
        assert_eq!(
            emulation.sync().get("k").await.unwrap().get("k"),
            Some(&json!("synced"))
        );
    }

    #[tokio::test]
    async fn test_listener_registry_is_shared_across_areas() {
        let emulation = StorageEmulation::new(StorageConfig::default(), Arc::new(MemoryBackend::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener: Listener = Arc::new(move |_: &StorageChanges, area: &str| {
            sink.lock().push(area.to_string());
        });
        emulation.on_changed().add_listener(listener);

        emulation.local().set(items(json!({ "a": 1 }))).await.unwrap();
        emulation.sync().set(items(json!({ "a": 1 }))).await.unwrap();
        emulation.area("managed").set(items(json!({ "a": 1 }))).await.unwrap();

        assert_eq!(*seen.lock(), vec!["local", "sync", "managed"]);
        assert_eq!(emulation.area_names(), vec!["local", "managed", "sync"]);
    }

    #[tokio::test]
    async fn test_dispose_keeps_areas_working() {
        let emulation = StorageEmulation::new(StorageConfig::default(), Arc::new(MemoryBackend::new()));
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        emulation
            .on_changed()
            .add_listener(Arc::new(move |_: &StorageChanges, _: &str| *counter.lock() += 1));

        emulation.dispose();
        emulation.local().set(items(json!({ "a": 1 }))).await.unwrap();

        assert_eq!(*calls.lock(), 0);
        assert_eq!(emulation.local().get("a").await.unwrap().get("a"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_named_areas_do_not_overlap() {
        let emulation = StorageEmulation::new(StorageConfig::default(), Arc::new(MemoryBackend::new()));

        emulation.area("sync-old").set(items(json!({ "k": 1 }))).await.unwrap();
        emulation.sync().set(items(json!({ "k": 2 }))).await.unwrap();

        assert_eq!(emulation.sync().get(StorageKeys::All).await.unwrap().len(), 1);
        emulation.sync().clear().await.unwrap();
        assert_eq!(
            emulation.area("sync-old").get("k").await.unwrap().get("k"),
            Some(&json!(1))
        );
    }

    #[test]
    fn test_custom_namespace() {
        let config = StorageConfig::new().namespace_prefix("text");
        let emulation = StorageEmulation::new(config, Arc::new(MemoryBackend::new()));
        assert_eq!(emulation.local().prefix(), "text-local-");
        assert_eq!(emulation.config().namespace_prefix, "text");
    }
}
