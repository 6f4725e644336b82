//! Capabilities the worker needs from its host.
//!
//! Everything the handlers touch outside their own memory goes through
//! [`WorkerHost`]: opening, listing and deleting cache stores, network
//! fetches, and the two lifecycle calls. Tests run the handlers against
//! [`crate::memory::MemoryHost`].

use crate::fetch::{Request, Response};
use crate::SwResult;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Future returned by host operations.
pub type HostFuture<'a, T> = BoxFuture<'a, SwResult<T>>;

/// An open, named cache store.
///
/// Writes are atomic per key; concurrent writers to the same key leave the
/// last one in place.
pub trait CacheHandle: Send + Sync {
    /// Name the store was opened under.
    fn name(&self) -> &str;

    /// Stored response for the request, if any.
    fn match_request<'a>(&'a self, request: &'a Request) -> HostFuture<'a, Option<Response>>;

    /// Store a response for the request.
    fn put<'a>(&'a self, request: &'a Request, response: Response) -> HostFuture<'a, ()>;

    /// Keys of every stored entry.
    fn keys(&self) -> HostFuture<'_, Vec<String>>;
}

/// Host capabilities for cache storage, network and lifecycle.
pub trait WorkerHost: Send + Sync + 'static {
    /// Open a cache store, creating it if absent.
    fn open_cache<'a>(&'a self, name: &'a str) -> HostFuture<'a, Arc<dyn CacheHandle>>;

    /// Names of every cache store at this origin.
    fn cache_names(&self) -> HostFuture<'_, Vec<String>>;

    /// Delete a whole store. Returns whether it existed.
    fn delete_cache<'a>(&'a self, name: &'a str) -> HostFuture<'a, bool>;

    /// Fetch from the network. Transport failures are errors; HTTP error
    /// statuses are responses.
    fn fetch<'a>(&'a self, request: &'a Request) -> HostFuture<'a, Response>;

    /// Leave the waiting slot without waiting for controlled pages to close.
    fn skip_waiting(&self) -> HostFuture<'_, ()>;

    /// Start controlling every open page in scope.
    fn claim_clients(&self) -> HostFuture<'_, ()>;
}
