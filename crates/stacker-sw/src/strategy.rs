//! Caching strategies run by the fetch handler.
//!
//! Lookups consult the runtime store, then this version's precache. Writes
//! only go to the runtime store and never abort serving the response.

use crate::config::WorkerConfig;
use crate::fetch::{CacheMode, Destination, Request, Response};
use crate::host::WorkerHost;
use crate::SwResult;
use futures::future::{join_all, BoxFuture};
use stacker_common::with_timeout;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Work a fetch event keeps alive after its response has been handed over.
///
/// The host awaits [`WaitUntil::settle`] before considering the event done.
#[derive(Default)]
pub struct WaitUntil {
    tasks: Vec<BoxFuture<'static, ()>>,
}

impl WaitUntil {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: BoxFuture<'static, ()>) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run every pending task to completion.
    pub async fn settle(self) {
        join_all(self.tasks).await;
    }
}

impl fmt::Debug for WaitUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitUntil")
            .field("pending", &self.tasks.len())
            .finish()
    }
}

/// Network fetch bounded by the configured deadline.
pub async fn network_fetch<H: WorkerHost>(
    host: &H,
    config: &WorkerConfig,
    request: &Request,
) -> SwResult<Response> {
    match config.fetch_timeout {
        Some(limit) => with_timeout(limit, || host.fetch(request)).await?,
        None => host.fetch(request).await,
    }
}

/// Stored response from the runtime store or the current precache.
pub async fn lookup<H: WorkerHost>(
    host: &H,
    config: &WorkerConfig,
    request: &Request,
) -> Option<Response> {
    match try_lookup(host, config, request).await {
        Ok(hit) => hit,
        Err(e) => {
            warn!(url = %request.url, error = %e, "Cache lookup failed, treating as miss");
            None
        }
    }
}

async fn try_lookup<H: WorkerHost>(
    host: &H,
    config: &WorkerConfig,
    request: &Request,
) -> SwResult<Option<Response>> {
    let runtime = host.open_cache(&config.cache_names.runtime).await?;
    if let Some(hit) = runtime.match_request(request).await? {
        return Ok(Some(hit));
    }
    // Opening would create the precache before install, so check first.
    let names = host.cache_names().await?;
    if !names.contains(&config.cache_names.precache) {
        return Ok(None);
    }
    let precache = host.open_cache(&config.cache_names.precache).await?;
    precache.match_request(request).await
}

/// Store a copy in the runtime store; failures are logged, never returned.
pub async fn store_runtime<H: WorkerHost>(
    host: &H,
    config: &WorkerConfig,
    request: &Request,
    response: Response,
) {
    let result: SwResult<()> = async {
        let runtime = host.open_cache(&config.cache_names.runtime).await?;
        runtime.put(request, response).await
    }
    .await;
    match result {
        Ok(()) => debug!(url = %request.url, "Stored in runtime cache"),
        Err(e) => warn!(url = %request.url, error = %e, "Runtime cache write failed"),
    }
}

/// The configured offline page, if one was precached.
pub async fn offline_page<H: WorkerHost>(host: &H, config: &WorkerConfig) -> Option<Response> {
    let path = config.offline_fallback.as_deref()?;
    let url = match config.resolve(path) {
        Ok(url) => url,
        Err(e) => {
            warn!(path, error = %e, "Offline fallback path does not resolve");
            return None;
        }
    };
    lookup(host, config, &Request::get(url)).await
}

/// Always from the network; nothing is read from or written to a store.
pub async fn network_only<H: WorkerHost>(
    host: &H,
    config: &WorkerConfig,
    request: &Request,
) -> SwResult<Response> {
    network_fetch(host, config, request).await
}

/// Documents: network first, then the cached document (when the policy
/// stores documents), then the offline page, then a synthesized 503.
pub async fn network_first<H: WorkerHost>(
    host: &H,
    config: &WorkerConfig,
    request: &Request,
) -> Response {
    let policy = config.document_policy;
    let outgoing = if policy.stores_documents() {
        request.clone()
    } else {
        request.clone().with_cache_mode(CacheMode::NoStore)
    };

    match network_fetch(host, config, &outgoing).await {
        Ok(response) => {
            if policy.stores_documents() && response.is_cacheable() {
                store_runtime(host, config, request, response.clone()).await;
            }
            response
        }
        Err(e) => {
            debug!(url = %request.url, error = %e, "Document fetch failed, falling back");
            if policy.stores_documents() {
                if let Some(hit) = lookup(host, config, request).await {
                    return hit;
                }
            }
            if let Some(page) = offline_page(host, config).await {
                return page;
            }
            Response::app_unavailable()
        }
    }
}

/// Static sub-resources: a stored copy short-circuits the network.
pub async fn cache_first<H: WorkerHost>(
    host: &H,
    config: &WorkerConfig,
    request: &Request,
) -> SwResult<Response> {
    if let Some(hit) = lookup(host, config, request).await {
        debug!(url = %request.url, "Cache hit");
        return Ok(hit);
    }

    match network_fetch(host, config, request).await {
        Ok(response) => {
            if response.is_cacheable() {
                store_runtime(host, config, request, response.clone()).await;
            }
            Ok(response)
        }
        Err(e) if request.destination == Destination::Document => {
            offline_page(host, config).await.ok_or(e)
        }
        Err(e) => Err(e),
    }
}

/// Serve the stored copy at once and refresh it in the background; with no
/// stored copy wait for the network, and answer 503 "Offline" if that fails.
pub async fn stale_while_revalidate<H: WorkerHost>(
    host: &Arc<H>,
    config: &Arc<WorkerConfig>,
    request: &Request,
    wait_until: &mut WaitUntil,
) -> Response {
    let cached = lookup(host.as_ref(), config, request).await;
    let refresh = revalidate(host.clone(), config.clone(), request.clone());

    match cached {
        Some(hit) => {
            debug!(url = %request.url, "Serving stale, revalidating");
            wait_until.push(Box::pin(async move {
                refresh.await;
            }));
            hit
        }
        None => refresh.await.unwrap_or_else(Response::offline),
    }
}

async fn revalidate<H: WorkerHost>(
    host: Arc<H>,
    config: Arc<WorkerConfig>,
    request: Request,
) -> Option<Response> {
    match network_fetch(host.as_ref(), &config, &request).await {
        Ok(response) => {
            if response.is_same_origin_cacheable() {
                store_runtime(host.as_ref(), &config, &request, response.clone()).await;
            }
            Some(response)
        }
        Err(e) => {
            debug!(url = %request.url, error = %e, "Revalidation failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ResponseType;
    use crate::memory::{MemoryHost, NetworkRoute};
    use stacker_core::{DocumentPolicy, ShellConfig};
    use std::time::Duration;
    use tokio::sync::Notify;
    use url::Url;

    const RUNTIME: &str = "hour-stacker-runtime";
    const PRECACHE: &str = "hour-stacker-precache-abc123";

    fn config_with(shell: ShellConfig) -> Arc<WorkerConfig> {
        let location = Url::parse("https://hours.example/sw.js?v=abc123").unwrap();
        Arc::new(WorkerConfig::from_location(&location, &shell))
    }

    fn config() -> Arc<WorkerConfig> {
        config_with(ShellConfig::default())
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_cache_first_hit_skips_network() {
        let host = MemoryHost::new();
        let url = "https://hours.example/logo.png";
        host.seed(RUNTIME, url, Response::ok("png")).await;
        host.respond(url, "fresh png");

        let request = get(url).with_destination(Destination::Image);
        let response = cache_first(&host, &config(), &request).await.unwrap();

        assert!(response.from_cache);
        assert_eq!(response.body_text(), "png");
        assert_eq!(host.network_calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_serves_precached_shell() {
        let host = MemoryHost::new();
        let url = "https://hours.example/icon-192x192.png";
        host.seed(PRECACHE, url, Response::ok("icon")).await;

        let request = get(url).with_destination(Destination::Image);
        let response = cache_first(&host, &config(), &request).await.unwrap();
        assert_eq!(response.body_text(), "icon");
        assert_eq!(host.network_calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_stores_only_exact_200() {
        let host = MemoryHost::new();
        host.respond("https://hours.example/a.css", "a");
        host.route(
            "https://hours.example/missing.css",
            NetworkRoute::Respond(Response::new(404, "nope")),
        );
        host.route(
            "https://cdn.example/b.css",
            NetworkRoute::Respond(Response::ok("").with_type(ResponseType::Opaque)),
        );

        for url in [
            "https://hours.example/a.css",
            "https://hours.example/missing.css",
            "https://cdn.example/b.css",
        ] {
            let request = get(url).with_destination(Destination::Style);
            cache_first(&host, &config(), &request).await.unwrap();
        }

        assert_eq!(
            host.cache_keys(RUNTIME).await,
            vec!["https://hours.example/a.css".to_string()]
        );
    }

    #[tokio::test]
    async fn test_cache_first_serves_response_when_store_is_full() {
        let host = MemoryHost::new();
        host.respond("https://hours.example/a.css", "a");
        host.fail_writes(true);

        let request = get("https://hours.example/a.css").with_destination(Destination::Style);
        let response = cache_first(&host, &config(), &request).await.unwrap();

        assert_eq!(response.body_text(), "a");
        assert!(host.cache_keys(RUNTIME).await.is_empty());
    }

    #[tokio::test]
    async fn test_cache_first_miss_offline_propagates() {
        let host = MemoryHost::new();
        host.set_offline(true);
        let request = get("https://hours.example/app.js").with_destination(Destination::Script);
        assert!(cache_first(&host, &config(), &request).await.is_err());
    }

    #[tokio::test]
    async fn test_cache_first_document_falls_back_to_offline_page() {
        let config = config_with(ShellConfig {
            offline_fallback: Some("/offline.html".to_string()),
            ..Default::default()
        });
        let host = MemoryHost::new();
        host.seed(PRECACHE, "https://hours.example/offline.html", Response::ok("offline"))
            .await;
        host.set_offline(true);

        let request = get("https://hours.example/page").with_destination(Destination::Document);
        let response = cache_first(&host, &config, &request).await.unwrap();
        assert_eq!(response.body_text(), "offline");
    }

    #[tokio::test]
    async fn test_network_first_caches_documents() {
        let host = MemoryHost::new();
        host.respond("https://hours.example/", "<html>v1</html>");
        let request = Request::navigate(Url::parse("https://hours.example/").unwrap());

        let online = network_first(&host, &config(), &request).await;
        assert_eq!(online.body_text(), "<html>v1</html>");
        assert!(!online.from_cache);

        host.set_offline(true);
        let offline = network_first(&host, &config(), &request).await;
        assert!(offline.from_cache);
        assert_eq!(offline.body_text(), "<html>v1</html>");
    }

    #[tokio::test]
    async fn test_network_first_offline_page_then_503() {
        let host = MemoryHost::new();
        host.set_offline(true);
        let request = Request::navigate(Url::parse("https://hours.example/archive").unwrap());

        let bare = network_first(&host, &config(), &request).await;
        assert_eq!(bare.status, 503);
        assert_eq!(bare.header("content-type"), Some("text/plain"));

        let with_page = config_with(ShellConfig {
            offline_fallback: Some("/offline.html".to_string()),
            ..Default::default()
        });
        host.seed(PRECACHE, "https://hours.example/offline.html", Response::ok("offline"))
            .await;
        let page = network_first(&host, &with_page, &request).await;
        assert_eq!(page.body_text(), "offline");
    }

    #[tokio::test]
    async fn test_no_store_policy_never_caches_documents() {
        let config = config_with(ShellConfig {
            document_policy: DocumentPolicy::NoStoreWithOfflinePage,
            ..Default::default()
        });
        let host = MemoryHost::new();
        host.respond("https://hours.example/", "<html></html>");
        let request = Request::navigate(Url::parse("https://hours.example/").unwrap());

        network_first(&host, &config, &request).await;
        assert!(host.cache_keys(RUNTIME).await.is_empty());

        host.set_offline(true);
        assert_eq!(network_first(&host, &config, &request).await.status, 503);
    }

    #[tokio::test]
    async fn test_network_only_ignores_cache() {
        let host = MemoryHost::new();
        let url = "https://hours.example/_next/static/chunks/app.js";
        host.seed(RUNTIME, url, Response::ok("stale")).await;
        host.respond(url, "fresh");

        let response = network_only(&host, &config(), &get(url)).await.unwrap();
        assert_eq!(response.body_text(), "fresh");

        host.set_offline(true);
        assert!(network_only(&host, &config(), &get(url)).await.is_err());
    }

    #[tokio::test]
    async fn test_swr_returns_cached_before_network() {
        let host = Arc::new(MemoryHost::new());
        let url = "https://hours.example/api/totals";
        let gate = Arc::new(Notify::new());
        host.seed(RUNTIME, url, Response::ok("old")).await;
        host.route(
            url,
            NetworkRoute::Gated {
                gate: gate.clone(),
                response: Response::ok("new"),
            },
        );

        let mut wait_until = WaitUntil::new();
        let response = stale_while_revalidate(&host, &config(), &get(url), &mut wait_until).await;
        assert_eq!(response.body_text(), "old");
        assert_eq!(wait_until.len(), 1);
        assert_eq!(host.cached(RUNTIME, url).await.unwrap().body_text(), "old");

        gate.notify_one();
        wait_until.settle().await;
        assert_eq!(host.cached(RUNTIME, url).await.unwrap().body_text(), "new");
    }

    #[tokio::test]
    async fn test_swr_does_not_store_errors_or_cors() {
        let host = Arc::new(MemoryHost::new());
        host.route(
            "https://hours.example/api/broken",
            NetworkRoute::Respond(Response::new(500, "boom")),
        );
        host.route(
            "https://hours.example/api/cors",
            NetworkRoute::Respond(Response::ok("x").with_type(ResponseType::Cors)),
        );

        let mut wait_until = WaitUntil::new();
        for url in ["https://hours.example/api/broken", "https://hours.example/api/cors"] {
            stale_while_revalidate(&host, &config(), &get(url), &mut wait_until).await;
        }
        assert!(wait_until.is_empty());
        assert!(host.cache_keys(RUNTIME).await.is_empty());
    }

    #[tokio::test]
    async fn test_swr_cold_and_offline_is_503() {
        let host = Arc::new(MemoryHost::new());
        host.set_offline(true);
        let mut wait_until = WaitUntil::new();
        let response = stale_while_revalidate(
            &host,
            &config(),
            &get("https://hours.example/api/x"),
            &mut wait_until,
        )
        .await;
        assert_eq!(response.status, 503);
        assert_eq!(response.body_text(), "Offline");
    }

    #[tokio::test]
    async fn test_deadline_turns_hang_into_fallback() {
        let config = config_with(ShellConfig {
            fetch_timeout_ms: Some(20),
            ..Default::default()
        });
        let host = MemoryHost::new();
        host.route("https://hours.example/", NetworkRoute::Hang);

        let request = Request::navigate(Url::parse("https://hours.example/").unwrap());
        let response = tokio::time::timeout(
            Duration::from_secs(5),
            network_first(&host, &config, &request),
        )
        .await
        .unwrap();
        assert_eq!(response.status, 503);
    }

    #[tokio::test]
    async fn test_lookup_does_not_create_precache() {
        let host = MemoryHost::new();
        assert!(lookup(&host, &config(), &get("https://hours.example/x")).await.is_none());
        assert!(!host.has_cache(PRECACHE).await);
    }
}
