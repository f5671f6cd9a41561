//! Platform configuration

use serde::Deserialize;
use storage::StorageConfig;

/// Configuration of the emulated extension platform
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlatformConfig {
    /// Prefix of every storage area namespace
    pub namespace_prefix: String,
    /// Physical key recording that the application was installed
    pub installed_marker_key: String,
    /// Locale used when the UI language has no catalog
    pub default_locale: String,
    /// UI language reported to the application, e.g. `en-US`
    pub ui_language: String,
    /// Emit change events for `remove` and `clear`
    pub notify_on_remove: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            namespace_prefix: "chrome-storage".to_string(),
            installed_marker_key: "pwa-installed".to_string(),
            default_locale: "en".to_string(),
            ui_language: "en-US".to_string(),
            notify_on_remove: true,
        }
    }
}

impl PlatformConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage namespace prefix
    pub fn namespace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.namespace_prefix = prefix.into();
        self
    }

    /// Set the installed marker key
    pub fn installed_marker_key(mut self, key: impl Into<String>) -> Self {
        self.installed_marker_key = key.into();
        self
    }

    /// Set the fallback locale
    pub fn default_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = locale.into();
        self
    }

    /// Set the UI language
    pub fn ui_language(mut self, language: impl Into<String>) -> Self {
        self.ui_language = language.into();
        self
    }

    /// Enable or disable change events for removals
    pub fn notify_on_remove(mut self, enabled: bool) -> Self {
        self.notify_on_remove = enabled;
        self
    }

    /// Storage configuration derived from this config
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig::new()
            .namespace_prefix(self.namespace_prefix.clone())
            .notify_on_remove(self.notify_on_remove)
    }
}
