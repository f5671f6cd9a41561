//! Platform API traits
//!
//! The editor talks to `storage`, `runtime` and `i18n` only through these
//! traits, so a host-provided implementation and the emulation are
//! interchangeable behind [`crate::ExtensionPlatform`].

use async_trait::async_trait;
use serde_json::{Map, Value};
use storage::{ChangeListeners, RemoveKeys, StorageArea, StorageChanges, StorageEmulation, StorageKeys};

use crate::i18n::MessageCatalog;
use crate::runtime::{InstalledDetails, Runtime};
use crate::Result;

/// One named storage area
#[async_trait]
pub trait StorageAreaApi: Send + Sync {
    /// Area name, e.g. `local`
    fn name(&self) -> &str;

    /// Read keys, filling in defaults for missing ones
    async fn get(&self, keys: StorageKeys) -> Result<Map<String, Value>>;

    /// Write every item and report what changed
    async fn set(&self, items: Map<String, Value>) -> Result<StorageChanges>;

    /// Remove keys and report what existed
    async fn remove(&self, keys: RemoveKeys) -> Result<StorageChanges>;

    /// Remove every key of the area
    async fn clear(&self) -> Result<StorageChanges>;
}

/// The `storage` API
pub trait StorageApi: Send + Sync {
    /// Device-local area
    fn local(&self) -> Box<dyn StorageAreaApi>;

    /// Synced area
    fn sync(&self) -> Box<dyn StorageAreaApi>;

    /// Area by name
    fn area(&self, name: &str) -> Box<dyn StorageAreaApi>;

    /// Change listeners shared by every area
    fn on_changed(&self) -> &ChangeListeners;
}

/// The `runtime` API
#[async_trait]
pub trait RuntimeApi: Send + Sync {
    /// Install details on the first run, `None` afterwards
    async fn on_installed(&self) -> Result<Option<InstalledDetails>>;

    /// Error of the last API call, if any
    fn last_error(&self) -> Option<String>;
}

/// The `i18n` API
pub trait I18nApi: Send + Sync {
    /// Localized message with `$1`..`$9` substituted; empty if unknown
    fn get_message(&self, name: &str, substitutions: &[&str]) -> String;

    /// UI language, e.g. `en-US`
    fn ui_language(&self) -> &str;
}

#[async_trait]
impl StorageAreaApi for StorageArea {
    fn name(&self) -> &str {
        StorageArea::name(self)
    }

    async fn get(&self, keys: StorageKeys) -> Result<Map<String, Value>> {
        Ok(StorageArea::get(self, keys).await?)
    }

    async fn set(&self, items: Map<String, Value>) -> Result<StorageChanges> {
        Ok(StorageArea::set(self, items).await?)
    }

    async fn remove(&self, keys: RemoveKeys) -> Result<StorageChanges> {
        Ok(StorageArea::remove(self, keys).await?)
    }

    async fn clear(&self) -> Result<StorageChanges> {
        Ok(StorageArea::clear(self).await?)
    }
}

impl StorageApi for StorageEmulation {
    fn local(&self) -> Box<dyn StorageAreaApi> {
        Box::new(StorageEmulation::local(self))
    }

    fn sync(&self) -> Box<dyn StorageAreaApi> {
        Box::new(StorageEmulation::sync(self))
    }

    fn area(&self, name: &str) -> Box<dyn StorageAreaApi> {
        Box::new(StorageEmulation::area(self, name))
    }

    fn on_changed(&self) -> &ChangeListeners {
        StorageEmulation::on_changed(self)
    }
}

#[async_trait]
impl RuntimeApi for Runtime {
    async fn on_installed(&self) -> Result<Option<InstalledDetails>> {
        Ok(Runtime::on_installed(self).await?)
    }

    fn last_error(&self) -> Option<String> {
        Runtime::last_error(self)
    }
}

impl I18nApi for MessageCatalog {
    fn get_message(&self, name: &str, substitutions: &[&str]) -> String {
        MessageCatalog::get_message(self, name, substitutions)
    }

    fn ui_language(&self) -> &str {
        MessageCatalog::ui_language(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use storage::{MemoryBackend, StorageConfig};

    fn storage_api() -> Box<dyn StorageApi> {
        Box::new(StorageEmulation::new(StorageConfig::default(), Arc::new(MemoryBackend::new())))
    }

    #[tokio::test]
    async fn test_emulated_storage_through_trait_objects() {
        let storage = storage_api();
        let local = storage.local();
        assert_eq!(local.name(), "local");

        let mut items = Map::new();
        items.insert("wrap".to_string(), json!(true));
        let changes = local.set(items).await.unwrap();
        assert_eq!(changes["wrap"].new_value, Some(json!(true)));

        let got = storage.local().get("wrap".into()).await.unwrap();
        assert_eq!(got.get("wrap"), Some(&json!(true)));
        assert!(storage.sync().get(StorageKeys::All).await.unwrap().is_empty());

        let removed = local.remove(vec!["wrap", "absent"].into()).await.unwrap();
        assert_eq!(removed.len(), 1);
        assert!(storage.area("local").get(StorageKeys::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_emulated_runtime_and_i18n_through_trait_objects() {
        let runtime: Box<dyn RuntimeApi> =
            Box::new(Runtime::new(Arc::new(MemoryBackend::new()), "pwa-installed"));
        assert!(runtime.on_installed().await.unwrap().is_some());
        assert!(runtime.on_installed().await.unwrap().is_none());
        assert!(runtime.last_error().is_none());

        let i18n: Box<dyn I18nApi> = Box::new(MessageCatalog::with_builtin("en-US", "en"));
        assert_eq!(i18n.ui_language(), "en-US");
        assert_eq!(i18n.get_message("searchCounting", &["2", "7"]), "2 of 7");
    }
}
