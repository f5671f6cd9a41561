//! Worker registration
//!
//! The controller holds the active worker and routes requests through it.
//! A newly registered worker replaces the active one only after it has
//! installed; a failed install leaves the previous worker in charge.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::fetcher::{FetchError, Fetcher};
use crate::http::{Request, Response};
use crate::worker::{AssetCache, Result};

/// Routes requests through the active [`AssetCache`]
pub struct AssetCacheController {
    fetcher: Arc<dyn Fetcher>,
    active: RwLock<Option<Arc<AssetCache>>>,
}

impl AssetCacheController {
    /// Create a controller with no active worker
    ///
    /// `fetcher` serves requests until a worker has activated.
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher, active: RwLock::new(None) }
    }

    /// Install and activate `worker`, replacing the current one
    ///
    /// Returns the generations deleted by activation.
    pub async fn register(&self, worker: Arc<AssetCache>) -> Result<Vec<String>> {
        worker.install().await?;

        let previous = self
            .active
            .read()
            .clone()
            .filter(|previous| !Arc::ptr_eq(previous, &worker));

        // The old worker stops writing before its generation is deleted;
        // requests still routed to it go straight to the network.
        if let Some(previous) = &previous {
            previous.retire();
            previous.settle().await;
        }

        let deleted = match worker.activate().await {
            Ok(deleted) => deleted,
            Err(e) => {
                if let Some(previous) = &previous {
                    previous.reinstate();
                }
                return Err(e);
            }
        };
        *self.active.write() = Some(worker.clone());

        tracing::info!(generation = %worker.generation(), "asset cache registered");
        Ok(deleted)
    }

    /// Route a request through the active worker, or the network if none
    pub async fn fetch(&self, request: Request) -> std::result::Result<Response, FetchError> {
        let active = self.active.read().clone();
        match active {
            Some(worker) => worker.handle_fetch(request).await,
            None => self.fetcher.fetch(&request).await,
        }
    }

    /// The active worker, if any
    pub fn active(&self) -> Option<Arc<AssetCache>> {
        self.active.read().clone()
    }

    /// Generation name of the active worker
    pub fn active_generation(&self) -> Option<String> {
        self.active.read().as_ref().map(|worker| worker.generation().to_string())
    }

    /// Wait for the active worker's background writes
    pub async fn settle(&self) {
        let active = self.active.read().clone();
        if let Some(worker) = active {
            worker.settle().await;
        }
    }
}
