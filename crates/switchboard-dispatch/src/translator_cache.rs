//! Cached translator state keyed by schema name.
//!
//! Anything derived from the set of active schemas lives here and is
//! dropped whenever that set changes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct TranslatorCache {
    entries: Mutex<HashMap<String, serde_json::Value>>,
    invalidations: AtomicU64,
}

impl TranslatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, schema_name: &str) -> Option<serde_json::Value> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(schema_name)
            .cloned()
    }

    pub fn insert(&self, schema_name: impl Into<String>, value: serde_json::Value) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(schema_name.into(), value);
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of times the cache has been cleared.
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::SeqCst)
    }
}
