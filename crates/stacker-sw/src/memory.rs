//! In-memory [`WorkerHost`] with a scripted network.

use crate::cache::CacheStorage;
use crate::fetch::{Request, Response};
use crate::host::{CacheHandle, HostFuture, WorkerHost};
use hashbrown::HashMap;
use stacker_common::StackerError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Notify, RwLock};
use tracing::trace;

/// How the scripted network answers a URL.
#[derive(Debug, Clone)]
pub enum NetworkRoute {
    /// Answer immediately.
    Respond(Response),
    /// Fail with a transport error.
    Fail(String),
    /// Never answer.
    Hang,
    /// Answer once the gate is notified.
    Gated { gate: Arc<Notify>, response: Response },
}

/// Cache storage and network living in process memory.
#[derive(Debug, Default)]
pub struct MemoryHost {
    storage: Arc<RwLock<CacheStorage>>,
    routes: Mutex<HashMap<String, NetworkRoute>>,
    offline: AtomicBool,
    /// Shared with every handle so writes fail host-wide.
    fail_writes: Arc<AtomicBool>,
    fetches: Mutex<Vec<String>>,
    skip_waiting_calls: AtomicUsize,
    claim_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MemoryHost {
    /// Create an empty host; every URL fails until routed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the network answer for a URL.
    pub fn route(&self, url: &str, route: NetworkRoute) {
        lock(&self.routes).insert(url.to_string(), route);
    }

    /// Answer a URL with `200 OK` and `body`.
    pub fn respond(&self, url: &str, body: &str) {
        self.route(url, NetworkRoute::Respond(Response::ok(body)));
    }

    /// Take the whole network down (or bring it back).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make every cache write fail (quota exceeded), or succeed again.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Place an entry directly into a store.
    pub async fn seed(&self, cache_name: &str, url: &str, response: Response) {
        self.storage.write().await.open(cache_name).put(url, &response);
    }

    /// Stored response for a key, bypassing the worker.
    pub async fn cached(&self, cache_name: &str, url: &str) -> Option<Response> {
        self.storage
            .read()
            .await
            .get(cache_name)
            .and_then(|cache| cache.match_request(url))
            .map(|entry| entry.to_response())
    }

    /// Sorted keys of a store, empty if it does not exist.
    pub async fn cache_keys(&self, cache_name: &str) -> Vec<String> {
        self.storage
            .read()
            .await
            .get(cache_name)
            .map(|cache| cache.keys())
            .unwrap_or_default()
    }

    pub async fn has_cache(&self, cache_name: &str) -> bool {
        self.storage.read().await.has(cache_name)
    }

    /// Number of network fetches attempted.
    pub fn network_calls(&self) -> usize {
        lock(&self.fetches).len()
    }

    /// Number of network fetches attempted for one URL.
    pub fn network_calls_for(&self, url: &str) -> usize {
        lock(&self.fetches).iter().filter(|u| *u == url).count()
    }

    pub fn skip_waiting_calls(&self) -> usize {
        self.skip_waiting_calls.load(Ordering::SeqCst)
    }

    pub fn claim_calls(&self) -> usize {
        self.claim_calls.load(Ordering::SeqCst)
    }
}

/// Handle onto one named store of a [`MemoryHost`].
#[derive(Debug)]
struct MemoryCache {
    name: String,
    storage: Arc<RwLock<CacheStorage>>,
    fail_writes: Arc<AtomicBool>,
}

impl CacheHandle for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn match_request<'a>(&'a self, request: &'a Request) -> HostFuture<'a, Option<Response>> {
        Box::pin(async move {
            let storage = self.storage.read().await;
            Ok(storage
                .get(&self.name)
                .and_then(|cache| cache.match_request(&request.cache_key()))
                .map(|entry| entry.to_response()))
        })
    }

    fn put<'a>(&'a self, request: &'a Request, response: Response) -> HostFuture<'a, ()> {
        Box::pin(async move {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StackerError::cache(format!("quota exceeded in {}", self.name)).into());
            }
            let mut storage = self.storage.write().await;
            storage.open(&self.name).put(&request.cache_key(), &response);
            Ok(())
        })
    }

    fn keys(&self) -> HostFuture<'_, Vec<String>> {
        Box::pin(async move {
            let storage = self.storage.read().await;
            Ok(storage
                .get(&self.name)
                .map(|cache| cache.keys())
                .unwrap_or_default())
        })
    }
}

impl WorkerHost for MemoryHost {
    fn open_cache<'a>(&'a self, name: &'a str) -> HostFuture<'a, Arc<dyn CacheHandle>> {
        Box::pin(async move {
            self.storage.write().await.open(name);
            let handle: Arc<dyn CacheHandle> = Arc::new(MemoryCache {
                name: name.to_string(),
                storage: self.storage.clone(),
                fail_writes: self.fail_writes.clone(),
            });
            Ok(handle)
        })
    }

    fn cache_names(&self) -> HostFuture<'_, Vec<String>> {
        Box::pin(async move { Ok(self.storage.read().await.keys()) })
    }

    fn delete_cache<'a>(&'a self, name: &'a str) -> HostFuture<'a, bool> {
        Box::pin(async move { Ok(self.storage.write().await.delete(name)) })
    }

    fn fetch<'a>(&'a self, request: &'a Request) -> HostFuture<'a, Response> {
        Box::pin(async move {
            let url = request.url.as_str().to_string();
            trace!(url = %url, "Network fetch");
            lock(&self.fetches).push(url.clone());

            if self.offline.load(Ordering::SeqCst) {
                return Err(StackerError::network(format!("offline: {}", url)).into());
            }

            let route = lock(&self.routes).get(&url).cloned();
            match route {
                Some(NetworkRoute::Respond(response)) => Ok(response),
                Some(NetworkRoute::Fail(reason)) => Err(StackerError::network(reason).into()),
                Some(NetworkRoute::Hang) => {
                    futures::future::pending::<()>().await;
                    Err(StackerError::network(format!("hung: {}", url)).into())
                }
                Some(NetworkRoute::Gated { gate, response }) => {
                    gate.notified().await;
                    Ok(response)
                }
                None => Err(StackerError::network(format!("no route to {}", url)).into()),
            }
        })
    }

    fn skip_waiting(&self) -> HostFuture<'_, ()> {
        self.skip_waiting_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }

    fn claim_clients(&self) -> HostFuture<'_, ()> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SwError;
    use url::Url;

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_open_creates_store() {
        let host = MemoryHost::new();
        let cache = host.open_cache("runtime").await.unwrap();
        assert_eq!(cache.name(), "runtime");
        assert_eq!(host.cache_names().await.unwrap(), vec!["runtime".to_string()]);
    }

    #[tokio::test]
    async fn test_put_then_match() {
        let host = MemoryHost::new();
        let cache = host.open_cache("runtime").await.unwrap();
        let request = get("https://hours.example/api");

        cache.put(&request, Response::ok("[]")).await.unwrap();
        let hit = cache.match_request(&request).await.unwrap().unwrap();
        assert!(hit.from_cache);
        assert_eq!(hit.body_text(), "[]");
    }

    #[tokio::test]
    async fn test_scripted_network() {
        let host = MemoryHost::new();
        host.respond("https://hours.example/a", "a");
        host.route(
            "https://hours.example/b",
            NetworkRoute::Fail("connection reset".to_string()),
        );

        let a = host.fetch(&get("https://hours.example/a")).await.unwrap();
        assert_eq!(a.body_text(), "a");
        assert!(host.fetch(&get("https://hours.example/b")).await.is_err());
        assert!(host.fetch(&get("https://hours.example/c")).await.is_err());
        assert_eq!(host.network_calls(), 3);
        assert_eq!(host.network_calls_for("https://hours.example/a"), 1);
    }

    #[tokio::test]
    async fn test_offline_overrides_routes() {
        let host = MemoryHost::new();
        host.respond("https://hours.example/a", "a");
        host.set_offline(true);
        let err = host.fetch(&get("https://hours.example/a")).await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_failed_writes_leave_store_unchanged() {
        let host = MemoryHost::new();
        let cache = host.open_cache("runtime").await.unwrap();
        let request = get("https://hours.example/api");

        host.fail_writes(true);
        let err = cache.put(&request, Response::ok("[]")).await.unwrap_err();
        assert!(matches!(err, SwError::Cache(_)));
        assert!(host.cache_keys("runtime").await.is_empty());

        host.fail_writes(false);
        cache.put(&request, Response::ok("[]")).await.unwrap();
        assert_eq!(host.cache_keys("runtime").await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cache() {
        let host = MemoryHost::new();
        host.seed("old", "https://hours.example/a", Response::ok("a")).await;
        assert!(host.delete_cache("old").await.unwrap());
        assert!(!host.delete_cache("old").await.unwrap());
        assert!(!host.has_cache("old").await);
    }
}
