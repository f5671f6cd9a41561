//! Text PWA compatibility layer
//!
//! Lets the Text editor run as an installable web application: the
//! extension platform APIs it expects are emulated by [`app_platform`] on
//! top of [`storage`], and [`asset_cache`] keeps the application shell
//! available offline.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use app_platform;
pub use asset_cache;
pub use storage;

pub use app_platform::{select_platform, EmulatedPlatform, ExtensionPlatform, PlatformConfig};
pub use app_platform::{I18nApi, RuntimeApi, StorageApi, StorageAreaApi};
pub use asset_cache::{AssetCache, AssetCacheConfig, AssetCacheController};
pub use storage::{StorageArea, StorageEmulation};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over `default_directive` (e.g. `"info"` or
/// `"asset_cache=debug"`). Fails if a global subscriber is already set.
pub fn init_tracing(default_directive: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
}
