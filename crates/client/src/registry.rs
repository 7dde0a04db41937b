//! Connection registry
//!
//! Table of in-flight streaming connections keyed by a fingerprint of
//! (endpoint, message, chat id). A key is held first as a pending slot
//! (acquired before the network call) and then as an active slot carrying
//! the transport handle. Removal always closes the handle first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use superai_connectors::http::DEFAULT_CHAT_ID;
use superai_connectors::TransportHandle;
use tracing::{debug, info, warn};

use crate::error::ChatError;

enum Slot {
    Pending,
    Active(TransportHandle),
}

struct Registered {
    generation: u64,
    slot: Slot,
}

impl Registered {
    fn close(&self) {
        if let Slot::Active(handle) = &self.slot {
            handle.close();
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    slots: DashMap<String, Registered>,
    next_generation: AtomicU64,
}

/// Shared connection table (cheap to Clone).
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

/// Deterministic fingerprint of a streaming request.
pub fn compute_key(endpoint: &str, message: &str, chat_id: Option<&str>) -> String {
    format!(
        "{}_{}_{}",
        endpoint,
        message,
        chat_id.unwrap_or(DEFAULT_CHAT_ID)
    )
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` with a pending slot. Fails if the key is pending or active.
    pub fn try_acquire(&self, key: &str) -> Result<ConnectionLease, ChatError> {
        match self.inner.slots.entry(key.to_string()) {
            Entry::Occupied(_) => {
                warn!(
                    component = "registry",
                    event = "registry.duplicate",
                    key = %key,
                    "Request already in flight"
                );
                Err(ChatError::DuplicateRequest {
                    key: key.to_string(),
                })
            }
            Entry::Vacant(vacant) => {
                let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
                vacant.insert(Registered {
                    generation,
                    slot: Slot::Pending,
                });
                debug!(
                    component = "registry",
                    event = "registry.acquired",
                    key = %key,
                    generation,
                    "Connection key acquired"
                );
                Ok(ConnectionLease {
                    registry: self.clone(),
                    key: key.to_string(),
                    generation,
                })
            }
        }
    }

    /// Attach a live handle to whatever slot currently holds `key`.
    /// Returns `false` (and closes the handle) if the key is not held.
    pub fn register(&self, key: &str, handle: TransportHandle) -> bool {
        self.register_inner(key, None, handle)
    }

    fn register_inner(&self, key: &str, generation: Option<u64>, handle: TransportHandle) -> bool {
        if let Some(mut entry) = self.inner.slots.get_mut(key) {
            let current = match generation {
                Some(g) => g == entry.generation,
                None => true,
            };
            if current {
                entry.slot = Slot::Active(handle);
                return true;
            }
        }
        debug!(
            component = "registry",
            event = "registry.register_after_release",
            key = %key,
            "Key released before registration, closing handle"
        );
        handle.close();
        false
    }

    /// Close and remove the connection for `key`. No-op when absent.
    pub fn release(&self, key: &str) {
        if self
            .inner
            .slots
            .remove_if(key, |_, registered| {
                registered.close();
                true
            })
            .is_some()
        {
            debug!(
                component = "registry",
                event = "registry.released",
                key = %key,
                "Connection released"
            );
        }
    }

    fn release_generation(&self, key: &str, generation: u64) {
        let removed = self.inner.slots.remove_if(key, |_, registered| {
            if registered.generation != generation {
                return false;
            }
            registered.close();
            true
        });
        if removed.is_some() {
            debug!(
                component = "registry",
                event = "registry.released",
                key = %key,
                generation,
                "Connection released"
            );
        }
    }

    /// Close every connection. Used on shutdown.
    pub fn release_all(&self) {
        let keys: Vec<String> = self
            .inner
            .slots
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        if keys.is_empty() {
            return;
        }
        info!(
            component = "registry",
            event = "registry.release_all",
            count = keys.len(),
            "Releasing all connections"
        );
        for key in keys {
            self.release(&key);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.slots.contains_key(key)
    }

    /// Whether `key` holds a live handle (not just a pending claim).
    pub fn is_active(&self, key: &str) -> bool {
        self.inner
            .slots
            .get(key)
            .is_some_and(|entry| matches!(entry.slot, Slot::Active(_)))
    }

    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.is_empty()
    }
}

/// Scoped claim on a registry key. Dropping it releases the key, unless
/// the key has since been released and re-acquired by someone else.
pub struct ConnectionLease {
    registry: ConnectionRegistry,
    key: String,
    generation: u64,
}

impl ConnectionLease {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Promote the pending slot to active. Closes `handle` if this lease
    /// has been superseded.
    pub fn register(&self, handle: TransportHandle) -> bool {
        self.registry
            .register_inner(&self.key, Some(self.generation), handle)
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        self.registry.release_generation(&self.key, self.generation);
    }
}

impl std::fmt::Debug for ConnectionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLease")
            .field("key", &self.key)
            .field("generation", &self.generation)
            .finish()
    }
}
