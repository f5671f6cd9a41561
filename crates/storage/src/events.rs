//! Change notification for emulated storage areas
//!
//! Every mutating storage call produces one batched [`StorageChanges`] map.
//! The map is delivered synchronously to each registered listener and, for
//! async consumers, published on a broadcast channel.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Old and new value of a single key touched by a mutating call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    /// Value before the call, absent if the key did not exist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    /// Value after the call, absent if the key was removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

/// Changed key → change record, for one call
pub type StorageChanges = BTreeMap<String, StorageChange>;

/// A change batch tagged with the area it happened in
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Name of the storage area
    pub area: String,
    /// Changes made by the call
    pub changes: StorageChanges,
}

/// Callback invoked with the changes and the area name
pub type Listener = Arc<dyn Fn(&StorageChanges, &str) + Send + Sync>;

/// Default capacity of the broadcast channel
const DEFAULT_EVENT_BUFFER: usize = 64;

struct Registry {
    listeners: RwLock<Vec<Listener>>,
    events: RwLock<Option<broadcast::Sender<ChangeEvent>>>,
}

/// Listener registry shared by every area of one storage context
///
/// Listeners are kept in registration order and compared by identity
/// (the address of the shared closure). Registering the same listener twice
/// makes it fire twice; removing it drops the first registration only.
#[derive(Clone)]
pub struct ChangeListeners {
    inner: Arc<Registry>,
}

impl fmt::Debug for ChangeListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeListeners")
            .field("listeners", &self.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Default for ChangeListeners {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl ChangeListeners {
    /// Create a registry whose broadcast channel buffers `buffer_size` events
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _rx) = broadcast::channel(buffer_size.max(1));
        Self {
            inner: Arc::new(Registry {
                listeners: RwLock::new(Vec::new()),
                events: RwLock::new(Some(tx)),
            }),
        }
    }

    /// Register a listener
    pub fn add_listener(&self, listener: Listener) {
        if self.is_disposed() {
            tracing::debug!("ignoring listener registered after disposal");
            return;
        }
        self.inner.listeners.write().push(listener);
    }

    /// Unregister the first registration of `listener`
    ///
    /// Returns `false` if the listener was not registered.
    pub fn remove_listener(&self, listener: &Listener) -> bool {
        let mut listeners = self.inner.listeners.write();
        match listeners.iter().position(|l| same_listener(l, listener)) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    /// Check whether `listener` is registered
    pub fn has_listener(&self, listener: &Listener) -> bool {
        self.inner
            .listeners
            .read()
            .iter()
            .any(|l| same_listener(l, listener))
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.inner.listeners.read().len()
    }

    /// Check if no listener is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribe to change events
    ///
    /// After [`dispose`](Self::dispose) the returned receiver is already
    /// closed.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        match self.inner.events.read().as_ref() {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = broadcast::channel(1);
                drop(tx);
                rx
            }
        }
    }

    /// Drop every listener and close the event channel
    pub fn dispose(&self) {
        self.inner.listeners.write().clear();
        self.inner.events.write().take();
        tracing::debug!("storage change listeners disposed");
    }

    /// Check whether the registry has been disposed
    pub fn is_disposed(&self) -> bool {
        self.inner.events.read().is_none()
    }

    /// Deliver one change batch to every listener, then to subscribers
    ///
    /// Empty batches are delivered too; callers decide whether a call that
    /// changed nothing is worth reporting.
    pub(crate) fn notify(&self, area: &str, changes: StorageChanges) {
        // Snapshot so listeners may (un)register while being called.
        let listeners: Vec<Listener> = self.inner.listeners.read().clone();
        for listener in &listeners {
            listener(&changes, area);
        }

        if let Some(tx) = self.inner.events.read().as_ref() {
            let _ = tx.send(ChangeEvent { area: area.to_string(), changes });
        }
    }
}
