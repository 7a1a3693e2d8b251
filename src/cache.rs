//! Token cache abstraction and the default in-process store.
//!
//! Auth controllers persist acquired tokens here keyed by a digest of the
//! credentials, so a rebuilt controller with the same credentials can pick
//! up a still-valid token without re-authenticating.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Store for serialized tokens with optional per-entry TTL.
pub trait TokenCache: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Option<Value>;

    /// Insert or replace an entry. `ttl` of `None` means no expiry.
    fn set(&self, key: &str, value: Value, ttl: Option<Duration>);

    /// Returns whether the entry existed.
    fn delete(&self, key: &str) -> bool;

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Mutex-guarded in-memory cache, the default when no external store is
/// wired in. Expired entries are dropped lazily on access.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Value, Option<Instant>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some((_, Some(deadline))) if *deadline <= Instant::now() => {
                entries.remove(key);
                None
            }
            Some((value, _)) => Some(value.clone()),
            None => None,
        }
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        if let Ok(mut entries) = self.entries.lock() {
            let deadline = ttl.map(|ttl| Instant::now() + ttl);
            entries.insert(key.to_string(), (value, deadline));
        }
    }

    fn delete(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|mut entries| entries.remove(key).is_some())
            .unwrap_or(false)
    }
}
