//! Offline asset cache for the Text PWA
//!
//! Stores the application shell in a versioned cache generation so the
//! editor can start without a network connection, and answers requests
//! cache first once a generation is active.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod controller;
pub mod fetcher;
pub mod generations;
pub mod http;
pub mod worker;

pub use controller::AssetCacheController;
pub use fetcher::{FetchError, Fetcher, HttpFetcher, HttpFetcherConfig};
pub use generations::{CacheError, CacheStorage, MemoryCacheStorage, SledCacheStorage};
pub use http::{resolve_url, Method, Request, Response};
pub use worker::{
    AssetCache, AssetCacheConfig, AssetCacheError, InstallReport, WorkerState, DEFAULT_MANIFEST,
};
