use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Fetched resources keyed by resource id (`"aws/accounts"`, `"analytics/dashboard"`).
///
/// Values are stored type-erased and cloned out on hit. Every mutation of a
/// resource must invalidate its key, or the whole prefix it lives under.
#[derive(Default)]
pub struct ResourceCache {
    entries: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<V: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<V> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).and_then(|v| v.downcast_ref::<V>()).cloned()
    }

    pub fn insert<V: Clone + Send + Sync + 'static>(&self, key: &str, value: V) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), Arc::new(value));
    }

    /// Returns the cached value or runs `fetch` and caches its success.
    /// Errors are never cached.
    pub fn get_or_fetch<V, E, F>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(v) = self.get::<V>(key) {
            return Ok(v);
        }
        let value = fetch()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn invalidate_prefix(&self, prefix: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|k, _| !k.starts_with(prefix));
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
