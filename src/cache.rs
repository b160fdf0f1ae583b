//! Time-bounded read cache with explicit scope invalidation.
//!
//! Availability and difference reads are advisory for display, so they may
//! be served stale up to the configured TTL. Mutations must call
//! `invalidate` for the scopes they touch before the next read is
//! considered valid.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Invalidation scope. A mutation names the narrowest scope that covers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Global catalog tables (equipment, crew, folders).
    Catalog,
    Project(i64),
    Event(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub scope: Scope,
    pub name: String,
}

impl CacheKey {
    pub fn new(scope: Scope, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
        }
    }
}

struct Entry {
    value: Value,
    stored_at: Instant,
}

pub struct ReadCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl ReadCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch a fresh entry; an expired one is dropped and reported as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: CacheKey, value: Value) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every entry stored under the scope.
    pub fn invalidate(&self, scope: Scope) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.retain(|key, _| key.scope != scope);
    }

    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
