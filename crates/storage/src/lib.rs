//! Storage layer for the Text PWA
//!
//! This crate emulates the extension platform's `storage` API: namespaced
//! storage areas over a synchronous key-value backend, with batched change
//! notification.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod area;
pub mod backend;
pub mod context;
pub mod events;

pub use area::{RemoveKeys, StorageArea, StorageConfig, StorageError, StorageKeys};
pub use backend::{BackendError, KeyValueBackend, MemoryBackend, SledBackend, SledConfig};
pub use context::{StorageEmulation, LOCAL_AREA, SYNC_AREA};
pub use events::{ChangeEvent, ChangeListeners, Listener, StorageChange, StorageChanges};
