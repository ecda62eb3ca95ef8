//! Process-wide registry of live generations
//!
//! Maps an assistant message id to the token its generation observes.
//! Entries exist only while the generation runs and are never persisted.
//! A fired entry stays until its generation releases it, so the row is
//! known to have a writer until that writer has settled it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::storage::MessageId;

/// The cancellation side of one registration.
///
/// The epoch distinguishes successive registrations under the same id, so
/// a finished generation cannot release a handle that replaced its own.
#[derive(Clone, Debug)]
pub struct CancellationHandle {
    token: CancellationToken,
    epoch: u64,
}

impl CancellationHandle {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
struct Entry {
    handle: CancellationHandle,
    fired: bool,
}

#[derive(Debug, Default)]
pub struct CancellationRegistry {
    handles: Mutex<HashMap<MessageId, Entry>>,
    next_epoch: AtomicU64,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<MessageId, Entry>> {
        // Every critical section is a single map operation, so a poisoned
        // map is still consistent.
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh_entry(&self) -> (CancellationHandle, Entry) {
        let handle = CancellationHandle {
            token: CancellationToken::new(),
            epoch: self.next_epoch.fetch_add(1, Ordering::Relaxed),
        };
        let entry = Entry {
            handle: handle.clone(),
            fired: false,
        };
        (handle, entry)
    }

    /// Register a fresh handle for `message_id`. An existing handle for the
    /// same id is cancelled and replaced.
    pub fn register(&self, message_id: &MessageId) -> CancellationHandle {
        let (handle, entry) = self.fresh_entry();
        let previous = self.handles().insert(message_id.clone(), entry);
        if let Some(previous) = previous {
            debug!(message_id = %message_id, "replacing live cancellation handle");
            previous.handle.token.cancel();
        }
        handle
    }

    /// Register a handle for `message_id` unless one is already present,
    /// fired or not.
    pub fn try_register(&self, message_id: &MessageId) -> Option<CancellationHandle> {
        let mut handles = self.handles();
        if handles.contains_key(message_id) {
            return None;
        }
        let (handle, entry) = self.fresh_entry();
        handles.insert(message_id.clone(), entry);
        Some(handle)
    }

    /// Fire the handle for `message_id`. Returns false when there is no
    /// handle or it was already fired, which covers unknown, finished and
    /// stopping ids alike.
    ///
    /// The entry is kept until the generation releases it.
    pub fn trigger(&self, message_id: &MessageId) -> bool {
        let mut handles = self.handles();
        match handles.get_mut(message_id) {
            Some(entry) if !entry.fired => {
                entry.fired = true;
                entry.handle.token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Remove the entry for `message_id` if present.
    pub fn release(&self, message_id: &MessageId) {
        self.handles().remove(message_id);
    }

    /// Remove the entry only if it is still `handle`'s registration.
    pub fn release_handle(&self, message_id: &MessageId, handle: &CancellationHandle) {
        let mut handles = self.handles();
        if handles.get(message_id).map(|e| e.handle.epoch) == Some(handle.epoch) {
            handles.remove(message_id);
        }
    }

    /// True while a generation owns `message_id`, including one that has
    /// been told to stop but has not settled the row yet.
    pub fn is_live(&self, message_id: &MessageId) -> bool {
        self.handles().contains_key(message_id)
    }

    pub fn len(&self) -> usize {
        self.handles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
