//! In-memory named cache stores.
//!
//! ```text
//! CacheStorage (caches)
//!     └── Cache (by name)
//!             └── key (URL) → CacheEntry
//! ```

use crate::fetch::{Response, ResponseType};
use hashbrown::HashMap;

/// A cached request/response pair.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Request URL.
    pub url: String,

    /// Response status.
    pub status: u16,

    /// Response status text.
    pub status_text: String,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Vec<u8>,

    /// Response tainting.
    pub response_type: ResponseType,
}

impl CacheEntry {
    /// Snapshot a response under `url`.
    pub fn new(url: &str, response: &Response) -> Self {
        Self {
            url: url.to_string(),
            status: response.status,
            status_text: response.status_text.clone(),
            headers: response.headers.clone(),
            body: response.body.clone(),
            response_type: response.response_type,
        }
    }

    /// Rebuild the response, marked as served from cache.
    pub fn to_response(&self) -> Response {
        Response {
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            response_type: self.response_type,
            from_cache: true,
        }
    }
}

/// A cache instance.
#[derive(Debug, Default)]
pub struct Cache {
    /// Cache name.
    pub name: String,

    /// Cached entries.
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// Create a new cache.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Match a request by key.
    pub fn match_request(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Store a response, replacing any previous entry for the key.
    pub fn put(&mut self, key: &str, response: &Response) {
        self.entries
            .insert(key.to_string(), CacheEntry::new(key, response));
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Cache storage (caches global).
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: HashMap<String, Cache>,
}

impl CacheStorage {
    /// Create new cache storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a cache (creates if doesn't exist).
    pub fn open(&mut self, name: &str) -> &mut Cache {
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name))
    }

    /// Get an existing cache.
    pub fn get(&self, name: &str) -> Option<&Cache> {
        self.caches.get(name)
    }

    /// Check if cache exists.
    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Delete a cache.
    pub fn delete(&mut self, name: &str) -> bool {
        self.caches.remove(name).is_some()
    }

    /// All cache names, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.keys().cloned().collect();
        names.sort();
        names
    }
}
