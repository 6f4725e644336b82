//! Offline shell configuration

use regex::Regex;
use serde::{Deserialize, Serialize};
use stacker_common::{Result, StackerError};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// How navigation requests are cached by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentPolicy {
    /// Network-first; successful documents are kept for offline replay.
    #[default]
    CacheForOffline,
    /// Network-first; documents are never stored.
    NetworkOnly,
    /// Documents are fetched with `no-store` and never stored; failures
    /// serve the offline page.
    NoStoreWithOfflinePage,
}

impl DocumentPolicy {
    /// Whether successful document responses go into the runtime store.
    pub fn stores_documents(&self) -> bool {
        matches!(self, DocumentPolicy::CacheForOffline)
    }
}

/// Shell configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Prefix for every cache store name
    pub app_name: String,

    /// Path of the worker script
    pub script_path: String,

    /// Query parameter carrying the version tag on the script URL
    pub version_param: String,

    /// Environment variable the build tool exports the tag under
    pub version_env: String,

    /// Path prefix of content-hashed build output
    pub build_asset_prefix: String,

    /// Path prefix of lazily loaded script chunks
    pub chunk_path: String,

    /// App shell assets stored at install time
    pub precache_urls: Vec<String>,

    /// Page served to navigations when offline
    pub offline_fallback: Option<String>,

    /// Navigation caching policy
    pub document_policy: DocumentPolicy,

    /// Network deadline inside caching strategies, in milliseconds
    pub fetch_timeout_ms: Option<u64>,

    /// Stylesheet hrefs re-checked after load
    pub stylesheet_pattern: String,

    /// Delay before the stylesheet watchdog reloads, in milliseconds
    pub stylesheet_reload_delay_ms: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            app_name: "hour-stacker".to_string(),
            script_path: "/sw.js".to_string(),
            version_param: "v".to_string(),
            version_env: "NEXT_PUBLIC_SW_VERSION".to_string(),
            build_asset_prefix: "/_next/".to_string(),
            chunk_path: "/_next/static/chunks/".to_string(),
            precache_urls: vec![
                "/manifest.json".to_string(),
                "/favicon.ico".to_string(),
                "/icon-192x192.png".to_string(),
                "/icon-512x512.png".to_string(),
            ],
            offline_fallback: None,
            document_policy: DocumentPolicy::default(),
            fetch_timeout_ms: Some(8_000),
            stylesheet_pattern: r"globals_.+\.css$".to_string(),
            stylesheet_reload_delay_ms: 150,
        }
    }
}

impl ShellConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading shell config");
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| StackerError::config_with_source("invalid shell config", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants every consumer relies on.
    pub fn validate(&self) -> Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(StackerError::config("app_name must not be empty"));
        }
        if self.version_param.is_empty() {
            return Err(StackerError::config("version_param must not be empty"));
        }
        for (field, path) in [
            ("script_path", &self.script_path),
            ("build_asset_prefix", &self.build_asset_prefix),
            ("chunk_path", &self.chunk_path),
        ] {
            if !path.starts_with('/') {
                return Err(StackerError::config(format!(
                    "{} must be an absolute path, got {:?}",
                    field, path
                )));
            }
        }
        for url in self.precache_urls.iter().chain(self.offline_fallback.iter()) {
            if !url.starts_with('/') {
                return Err(StackerError::config(format!(
                    "precached path must be absolute, got {:?}",
                    url
                )));
            }
        }
        if self.fetch_timeout_ms == Some(0) {
            return Err(StackerError::config("fetch_timeout_ms must be positive"));
        }
        self.stylesheet_regex()?;
        Ok(())
    }

    /// Every URL the install step stores, offline fallback included.
    pub fn shell_urls(&self) -> Vec<String> {
        let mut urls = self.precache_urls.clone();
        if let Some(ref fallback) = self.offline_fallback {
            if !urls.contains(fallback) {
                urls.push(fallback.clone());
            }
        }
        urls
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }

    pub fn stylesheet_reload_delay(&self) -> Duration {
        Duration::from_millis(self.stylesheet_reload_delay_ms)
    }

    /// Compiled stylesheet pattern.
    pub fn stylesheet_regex(&self) -> Result<Regex> {
        Regex::new(&self.stylesheet_pattern)
            .map_err(|e| StackerError::config_with_source("invalid stylesheet_pattern", e))
    }
}
