//! Extension platform emulation for the Text PWA
//!
//! The editor is written against an extension platform's `storage`,
//! `runtime` and `i18n` APIs, expressed here as the traits in [`api`]. When
//! the host provides them natively that implementation is used; otherwise
//! [`EmulatedPlatform`] supplies them on top of a key-value backend.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod i18n;
pub mod runtime;

use std::sync::Arc;
use storage::{
    BackendError, KeyValueBackend, MemoryBackend, SledBackend, SledConfig, StorageEmulation,
    StorageError,
};
use thiserror::Error;

pub use api::{I18nApi, RuntimeApi, StorageApi, StorageAreaApi};
pub use config::PlatformConfig;
pub use i18n::{Message, MessageCatalog, Messages};
pub use runtime::{InstallReason, InstalledDetails, Runtime};

/// Platform error types
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Storage area error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Backend error
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Message catalog could not be parsed
    #[error("Catalog error: {0}")]
    Catalog(#[from] serde_json::Error),

    /// Error reported by a host-provided implementation
    #[error("Native platform error: {0}")]
    Native(String),
}

/// Result type for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Which implementation provides the platform APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    /// Supplied by the host
    Native,
    /// Emulated over a key-value backend
    Emulated,
}

/// The platform APIs the editor depends on
pub trait ExtensionPlatform: Send + Sync {
    /// Which implementation this is
    fn kind(&self) -> PlatformKind;

    /// `storage` API
    fn storage(&self) -> &dyn StorageApi;

    /// `runtime` API
    fn runtime(&self) -> &dyn RuntimeApi;

    /// `i18n` API
    fn i18n(&self) -> &dyn I18nApi;
}

/// Platform APIs emulated over a key-value backend
#[derive(Debug)]
pub struct EmulatedPlatform {
    config: PlatformConfig,
    storage: StorageEmulation,
    runtime: Runtime,
    i18n: MessageCatalog,
}

impl EmulatedPlatform {
    /// Create the emulation over `backend`
    pub fn new(config: PlatformConfig, backend: Arc<dyn KeyValueBackend>) -> Self {
        let storage = StorageEmulation::new(config.storage_config(), backend.clone());
        let runtime = Runtime::new(backend, config.installed_marker_key.clone());
        let i18n = MessageCatalog::with_builtin(config.ui_language.clone(), config.default_locale.clone());

        Self { config, storage, runtime, i18n }
    }

    /// Create the emulation over a sled database that survives restarts
    pub fn open(config: PlatformConfig, sled: SledConfig) -> Result<Self> {
        let backend = SledBackend::open(sled)?;
        Ok(Self::new(config, Arc::new(backend)))
    }

    /// Create the emulation over a fresh in-memory backend
    pub fn in_memory(config: PlatformConfig) -> Self {
        Self::new(config, Arc::new(MemoryBackend::new()))
    }

    /// Configuration in use
    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// The storage emulation itself
    pub fn storage_emulation(&self) -> &StorageEmulation {
        &self.storage
    }

    /// The runtime emulation itself
    pub fn runtime_emulation(&self) -> &Runtime {
        &self.runtime
    }

    /// The message catalog itself, for loading extra locales
    pub fn catalog(&self) -> &MessageCatalog {
        &self.i18n
    }

    /// Drop every storage change listener
    pub fn dispose(&self) {
        self.storage.dispose();
    }
}

impl ExtensionPlatform for EmulatedPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Emulated
    }

    fn storage(&self) -> &dyn StorageApi {
        &self.storage
    }

    fn runtime(&self) -> &dyn RuntimeApi {
        &self.runtime
    }

    fn i18n(&self) -> &dyn I18nApi {
        &self.i18n
    }
}

/// Use the native platform when the host has one, otherwise emulate it
pub fn select_platform(
    native: Option<Arc<dyn ExtensionPlatform>>,
    config: PlatformConfig,
    backend: Arc<dyn KeyValueBackend>,
) -> Arc<dyn ExtensionPlatform> {
    match native {
        Some(platform) => {
            tracing::debug!("using native extension platform");
            platform
        }
        None => {
            tracing::info!(ui_language = %config.ui_language, "emulating extension platform");
            Arc::new(EmulatedPlatform::new(config, backend))
        }
    }
}
