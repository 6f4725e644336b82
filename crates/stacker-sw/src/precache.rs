//! Install: populate this version's precache with the app shell.

use crate::config::WorkerConfig;
use crate::fetch::{Request, Response};
use crate::host::WorkerHost;
use crate::strategy::network_fetch;
use crate::{SwError, SwResult};
use futures::future::try_join_all;
use tracing::{debug, info, warn};

/// Outcome of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Store that was populated.
    pub cache_name: String,
    /// Keys stored, in configuration order.
    pub urls: Vec<String>,
}

/// Fetch every shell asset and store them all, or store nothing.
///
/// Any same-named store left by an earlier install is kept when a fetch
/// fails. Once every asset is in hand the store is replaced wholesale, so
/// a failed write leaves no store at all. On success the worker asks to
/// leave the waiting slot.
pub async fn install<H: WorkerHost>(host: &H, config: &WorkerConfig) -> SwResult<InstallReport> {
    let cache_name = &config.cache_names.precache;
    info!(cache = %cache_name, assets = config.precache_urls.len(), "Installing precache");

    let requests = config
        .precache_urls
        .iter()
        .map(|path| config.resolve(path).map(Request::get))
        .collect::<SwResult<Vec<_>>>()?;

    let responses = try_join_all(requests.iter().map(|request| fetch_asset(host, config, request)))
        .await?;

    if host.delete_cache(cache_name).await? {
        debug!(cache = %cache_name, "Replaced existing precache");
    }

    if let Err(e) = populate(host, cache_name, &requests, responses).await {
        warn!(cache = %cache_name, error = %e, "Precache write failed, discarding store");
        host.delete_cache(cache_name).await?;
        return Err(e);
    }

    host.skip_waiting().await?;
    info!(cache = %cache_name, "Precache installed");

    Ok(InstallReport {
        cache_name: cache_name.clone(),
        urls: requests.iter().map(Request::cache_key).collect(),
    })
}

async fn fetch_asset<H: WorkerHost>(
    host: &H,
    config: &WorkerConfig,
    request: &Request,
) -> SwResult<Response> {
    let url = request.url.to_string();
    let response = network_fetch(host, config, request)
        .await
        .map_err(|e| SwError::Install {
            url: url.clone(),
            reason: e.to_string(),
        })?;
    if !response.is_ok() {
        return Err(SwError::Install {
            url,
            reason: format!("status {}", response.status),
        });
    }
    Ok(response)
}

async fn populate<H: WorkerHost>(
    host: &H,
    cache_name: &str,
    requests: &[Request],
    responses: Vec<Response>,
) -> SwResult<()> {
    let cache = host.open_cache(cache_name).await?;
    for (request, response) in requests.iter().zip(responses) {
        cache.put(request, response).await?;
    }
    Ok(())
}
