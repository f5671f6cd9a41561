//! Offline asset cache worker
//!
//! One [`AssetCache`] owns one cache generation. Its lifecycle follows the
//! background worker it stands in for:
//!
//! 1. `install` fetches every manifest resource and, only if all of them
//!    succeed, writes them to the new generation in a single batch.
//! 2. `activate` deletes every other generation and starts intercepting.
//! 3. `handle_fetch` answers from the generation first and falls back to the
//!    network, storing successful read-only responses in the background.
//!
//! Entries are keyed by absolute URL: paths are resolved against the
//! configured origin, so `/index.html` and `http://localhost:8080/index.html`
//! name the same entry.

use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::fetcher::{FetchError, Fetcher};
use crate::generations::{CacheError, CacheStorage};
use crate::http::{resolve_url, Request, Response};

/// Asset cache error types
#[derive(Debug, Error)]
pub enum AssetCacheError {
    /// A manifest resource could not be fetched
    #[error("Install of {generation} failed at {url}: {reason}")]
    InstallFailed {
        /// Generation being installed
        generation: String,
        /// Resource that failed
        url: String,
        /// Network error or unexpected status
        reason: String,
    },

    /// Activation requested before a successful install
    #[error("Generation {0} is not installed")]
    NotInstalled(String),

    /// Cache storage error
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Manifest could not be parsed
    #[error("Invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Result type for asset cache operations
pub type Result<T> = std::result::Result<T, AssetCacheError>;

/// Resources cached by the editor shell
pub const DEFAULT_MANIFEST: &[&str] = &[
    "/index.html",
    "/css/app.css",
    "/css/print.css",
    "/js/app.js",
    "/js/editor-cm.js",
    "/js/i18n-template.js",
    "/js/search.js",
    "/js/settings.js",
    "/js/tabs.js",
    "/js/util.js",
    "/third_party/jquery/jquery-1.8.3.min.js",
    "/third_party/material-components-web/material-components-web.min.js",
    "/third_party/material-components-web/material-components-web.min.css",
    "/third_party/material-design-icons/iconfont/material-icons.css",
    "/third_party/codemirror.next/codemirror.next.bin.js",
];

/// Asset cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssetCacheConfig {
    /// Prefix of every generation name
    pub cache_prefix: String,
    /// Version tag of this generation
    pub version: String,
    /// Origin that relative URLs are resolved against when keying entries
    pub origin: String,
    /// Resources fetched at install time
    pub manifest: Vec<String>,
}

impl Default for AssetCacheConfig {
    fn default() -> Self {
        Self {
            cache_prefix: "text-dev".to_string(),
            version: "0.9.3".to_string(),
            origin: "http://localhost:8080".to_string(),
            manifest: DEFAULT_MANIFEST.iter().map(|url| (*url).to_string()).collect(),
        }
    }
}

impl AssetCacheConfig {
    /// Create a configuration for `version` with the default manifest
    pub fn new(version: impl Into<String>) -> Self {
        Self { version: version.into(), ..Default::default() }
    }

    /// Parse a JSON manifest; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the generation name prefix
    pub fn cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    /// Set the origin used to key relative URLs
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Replace the manifest
    pub fn manifest<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.manifest = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Generation name, e.g. `text-dev-v0.9.3`
    pub fn generation_name(&self) -> String {
        format!("{}-v{}", self.cache_prefix, self.version)
    }
}

/// Lifecycle state of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Created, not yet installed
    New,
    /// Every resource stored; waiting to activate
    Installed,
    /// Intercepting requests from its generation
    Active,
    /// Install failed or superseded by a newer worker
    Redundant,
}

/// Outcome of a successful install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Generation that was populated
    pub generation: String,
    /// Number of resources stored
    pub resources: usize,
}

/// Cache worker for one generation
pub struct AssetCache {
    config: AssetCacheConfig,
    generation: String,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    state: RwLock<WorkerState>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetCache")
            .field("generation", &self.generation)
            .field("state", &self.state())
            .finish()
    }
}

impl AssetCache {
    /// Create a worker for the generation described by `config`
    pub fn new(
        config: AssetCacheConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let generation = config.generation_name();
        Self {
            config,
            generation,
            storage,
            fetcher,
            state: RwLock::new(WorkerState::New),
            background: Mutex::new(Vec::new()),
        }
    }

    /// Name of this worker's generation
    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// Configuration in use
    pub fn config(&self) -> &AssetCacheConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.write() = state;
    }

    /// Mark the worker as superseded; it stops intercepting
    ///
    /// Once this returns, no new background write can start; writes already
    /// started are awaited by [`AssetCache::settle`].
    pub fn retire(&self) {
        self.set_state(WorkerState::Redundant);
    }

    /// Undo [`AssetCache::retire`] when the successor failed to activate
    pub(crate) fn reinstate(&self) {
        let mut state = self.state.write();
        if *state == WorkerState::Redundant {
            *state = WorkerState::Active;
        }
    }

    /// The request as stored: same method, absolute URL
    fn keyed(&self, request: &Request) -> Request {
        Request { url: resolve_url(&self.config.origin, &request.url), ..request.clone() }
    }

    fn install_failed(&self, url: &str, reason: String) -> AssetCacheError {
        tracing::warn!(generation = %self.generation, url, reason = %reason, "asset install failed");
        self.set_state(WorkerState::Redundant);
        AssetCacheError::InstallFailed {
            generation: self.generation.clone(),
            url: url.to_string(),
            reason,
        }
    }

    /// Fetch and store every manifest resource
    ///
    /// Nothing is written unless every fetch returns status 200. Installing
    /// an already installed or active worker is a no-op.
    pub async fn install(&self) -> Result<InstallReport> {
        match self.state() {
            WorkerState::Installed | WorkerState::Active => {
                return Ok(InstallReport {
                    generation: self.generation.clone(),
                    resources: self.config.manifest.len(),
                });
            }
            WorkerState::New | WorkerState::Redundant => {}
        }

        tracing::info!(
            generation = %self.generation,
            resources = self.config.manifest.len(),
            "installing asset cache"
        );

        let mut entries = Vec::with_capacity(self.config.manifest.len());
        for url in &self.config.manifest {
            let request = Request::get(url.as_str());
            let response = match self.fetcher.fetch(&request).await {
                Ok(response) => response,
                Err(e) => return Err(self.install_failed(url, e.to_string())),
            };
            if !response.is_ok() {
                return Err(self.install_failed(url, format!("HTTP {}", response.status)));
            }
            entries.push((self.keyed(&request), response));
        }

        let resources = entries.len();
        if let Err(e) = self.storage.put_all(&self.generation, entries).await {
            self.set_state(WorkerState::Redundant);
            return Err(e.into());
        }

        self.set_state(WorkerState::Installed);
        tracing::info!(generation = %self.generation, resources, "asset cache installed");

        Ok(InstallReport { generation: self.generation.clone(), resources })
    }

    /// Delete every other generation and start intercepting
    ///
    /// Returns the names of the deleted generations.
    pub async fn activate(&self) -> Result<Vec<String>> {
        match self.state() {
            WorkerState::Installed => {}
            WorkerState::Active => return Ok(Vec::new()),
            WorkerState::New | WorkerState::Redundant => {
                return Err(AssetCacheError::NotInstalled(self.generation.clone()));
            }
        }

        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if name != self.generation && self.storage.delete(&name).await? {
                tracing::info!(generation = %name, "deleted stale asset cache");
                deleted.push(name);
            }
        }

        self.set_state(WorkerState::Active);
        tracing::info!(generation = %self.generation, "asset cache active");
        Ok(deleted)
    }

    /// Answer a request, cache first
    ///
    /// Network failures on a cache miss are returned unchanged. Successful
    /// read-only responses are copied into the generation by a background
    /// task whose failure never reaches the caller.
    pub async fn handle_fetch(&self, request: Request) -> std::result::Result<Response, FetchError> {
        if self.state() != WorkerState::Active {
            return self.fetcher.fetch(&request).await;
        }

        let keyed = self.keyed(&request);
        match self.storage.match_request(&self.generation, &keyed).await {
            Ok(Some(cached)) => {
                tracing::debug!(key = %keyed.cache_key(), "asset cache hit");
                return Ok(cached);
            }
            Ok(None) => tracing::debug!(key = %keyed.cache_key(), "asset cache miss"),
            Err(e) => tracing::warn!(key = %keyed.cache_key(), error = %e, "asset cache lookup failed"),
        }

        let response = self.fetcher.fetch(&request).await?;

        if response.is_ok() && request.method.is_read_only() {
            self.store_in_background(keyed, response.clone());
        }

        Ok(response)
    }

    fn store_in_background(&self, request: Request, response: Response) {
        // Held until the task is registered so `retire` cannot slip in between.
        let state = self.state.read();
        if *state != WorkerState::Active {
            tracing::debug!(key = %request.cache_key(), "worker retired, response not stored");
            return;
        }

        let storage = self.storage.clone();
        let generation = self.generation.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = storage.put(&generation, &request, response).await {
                tracing::warn!(
                    generation = %generation,
                    key = %request.cache_key(),
                    error = %e,
                    "background cache write failed"
                );
            }
        });

        let mut background = self.background.lock();
        background.retain(|task| !task.is_finished());
        background.push(handle);
        drop(state);
    }

    /// Wait for every pending background cache write
    pub async fn settle(&self) {
        let pending: Vec<JoinHandle<()>> = std::mem::take(&mut *self.background.lock());
        for task in pending {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "background cache write panicked");
            }
        }
    }
}
