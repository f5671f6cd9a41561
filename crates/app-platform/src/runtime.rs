//! Runtime emulation
//!
//! Only first-install detection is emulated. The marker lives in the same
//! backend as the storage areas, outside every area namespace, so clearing
//! an area never makes the application look freshly installed.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::{BackendError, KeyValueBackend};

/// Value written under the installed marker key
const MARKER_VALUE: &str = "true";

/// Why `onInstalled` fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallReason {
    /// First run against this backend
    Install,
}

/// Payload delivered to `onInstalled`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledDetails {
    /// Install reason
    pub reason: InstallReason,
}

/// Emulated runtime API
#[derive(Clone)]
pub struct Runtime {
    backend: Arc<dyn KeyValueBackend>,
    marker_key: String,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime").field("marker_key", &self.marker_key).finish()
    }
}

impl Runtime {
    /// Create a runtime backed by `backend`
    pub fn new(backend: Arc<dyn KeyValueBackend>, marker_key: impl Into<String>) -> Self {
        Self { backend, marker_key: marker_key.into() }
    }

    /// Whether the installed marker has been written
    pub fn is_installed(&self) -> Result<bool, BackendError> {
        Ok(self.backend.get_item(&self.marker_key)?.is_some())
    }

    /// Report a first install exactly once per backend
    ///
    /// The marker is written before the future yields, so a second call made
    /// while the first is still pending already sees it.
    pub async fn on_installed(&self) -> Result<Option<InstalledDetails>, BackendError> {
        let fresh = !self.is_installed()?;
        if fresh {
            self.backend.set_item(&self.marker_key, MARKER_VALUE)?;
            tracing::info!(marker = %self.marker_key, "first install recorded");
        }

        tokio::task::yield_now().await;

        Ok(fresh.then_some(InstalledDetails { reason: InstallReason::Install }))
    }

    /// Error of the last API call; never set by the emulation
    pub fn last_error(&self) -> Option<String> {
        None
    }
}
