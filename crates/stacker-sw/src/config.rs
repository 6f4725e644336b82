//! Immutable configuration handed to every worker handler.

use crate::SwResult;
use stacker_core::{CacheNames, DocumentPolicy, ShellConfig, VersionTag};
use std::time::Duration;
use tracing::info;
use url::Url;

/// Per-worker configuration, fixed for the worker's lifetime.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Deployment this worker belongs to.
    pub version: VersionTag,

    /// Origin the worker serves; relative paths resolve against it.
    pub origin: Url,

    /// Precache and runtime store names.
    pub cache_names: CacheNames,

    /// Paths stored at install time.
    pub precache_urls: Vec<String>,

    /// Path prefix of content-hashed build output, never cached.
    pub build_asset_prefix: String,

    /// Offline page for navigations.
    pub offline_fallback: Option<String>,

    /// Navigation caching policy.
    pub document_policy: DocumentPolicy,

    /// Deadline for each network fetch inside a strategy.
    pub fetch_timeout: Option<Duration>,
}

impl WorkerConfig {
    /// Build the configuration for an explicit version.
    pub fn new(origin: Url, version: VersionTag, shell: &ShellConfig) -> Self {
        let cache_names = CacheNames::new(&shell.app_name, &version);
        Self {
            version,
            origin,
            cache_names,
            precache_urls: shell.shell_urls(),
            build_asset_prefix: shell.build_asset_prefix.clone(),
            offline_fallback: shell.offline_fallback.clone(),
            document_policy: shell.document_policy,
            fetch_timeout: shell.fetch_timeout(),
        }
    }

    /// Build the configuration from the worker's own script URL, which
    /// carries the version tag as a query parameter.
    pub fn from_location(location: &Url, shell: &ShellConfig) -> Self {
        let version = VersionTag::from_script_url(location, &shell.version_param);
        let mut origin = location.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);
        info!(version = %version, origin = %origin, "Worker configured");
        Self::new(origin, version, shell)
    }

    /// Resolve a configured path against the origin.
    pub fn resolve(&self, path: &str) -> SwResult<Url> {
        Ok(self.origin.join(path)?)
    }

    /// Whether a URL path falls under the build-asset prefix.
    pub fn is_build_asset(&self, url: &Url) -> bool {
        url.path().starts_with(&self.build_asset_prefix)
    }
}
