//! Recovery watchdogs.
//!
//! Both work without the worker, for when the update machinery itself is
//! what broke: the page is running HTML that references build assets the
//! current deployment no longer serves.

use crate::host::{PageHost, Prompt};
use futures::future::join_all;
use regex::Regex;
use serde_json::Value as JsonValue;
use stacker_common::{Result, StackerError};
use stacker_core::ShellConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Message of a rejected dynamic import for a missing chunk.
const CHUNK_FAILED_PATTERN: &str = r"(?i)Loading chunk [^ ]+ failed";

/// Error name the bundler gives failed chunk loads.
const CHUNK_LOAD_ERROR: &str = "ChunkLoadError";

/// Watches script load errors and unhandled rejections for failed build
/// assets, and offers a hard reload once per page load.
pub struct AssetLoadWatchdog<P: PageHost> {
    page: Arc<P>,
    chunk_path: String,
    chunk_failed: Regex,
    shown: bool,
}

impl<P: PageHost> AssetLoadWatchdog<P> {
    pub fn new(page: Arc<P>, shell: &ShellConfig) -> Result<Self> {
        let chunk_failed = Regex::new(CHUNK_FAILED_PATTERN)
            .map_err(|e| StackerError::config_with_source("invalid chunk error pattern", e))?;
        Ok(Self {
            page,
            chunk_path: shell.chunk_path.clone(),
            chunk_failed,
            shown: false,
        })
    }

    /// Whether the prompt has been shown on this page load.
    pub fn has_prompted(&self) -> bool {
        self.shown
    }

    /// A `<script>` element failed to load. Returns whether it was a chunk.
    pub fn on_script_error(&mut self, src: &str) -> bool {
        if !src.contains(&self.chunk_path) {
            return false;
        }
        warn!(src, "Build chunk failed to load");
        self.prompt();
        true
    }

    /// An unhandled promise rejection. Returns whether it was a chunk load
    /// failure.
    pub fn on_unhandled_rejection(&mut self, reason: &JsonValue) -> bool {
        if !self.is_chunk_failure(reason) {
            return false;
        }
        warn!(?reason, "Chunk load rejected");
        self.prompt();
        true
    }

    fn is_chunk_failure(&self, reason: &JsonValue) -> bool {
        let Some(reason) = reason.as_object() else {
            return false;
        };
        if reason.get("name").and_then(JsonValue::as_str) == Some(CHUNK_LOAD_ERROR) {
            return true;
        }
        match reason.get("message") {
            Some(JsonValue::String(message)) => self.chunk_failed.is_match(message),
            Some(other) => self.chunk_failed.is_match(&other.to_string()),
            None => false,
        }
    }

    fn prompt(&mut self) {
        if self.shown {
            return;
        }
        self.shown = true;
        self.page.show_prompt(Prompt::AssetsFailed);
    }

    /// The user accepted the prompt: drop every registration and cache
    /// store, then reload. Failures along the way do not stop the reload.
    pub async fn hard_reload(&self) {
        match self.page.unregister_all().await {
            Ok(count) => debug!(count, "Unregistered workers"),
            Err(e) => warn!(error = %e, "Unregistering workers failed"),
        }
        match self.page.clear_caches().await {
            Ok(count) => debug!(count, "Cleared cache stores"),
            Err(e) => warn!(error = %e, "Clearing caches failed"),
        }
        info!("Hard reload");
        self.page.reload();
    }
}

/// Re-fetches the global stylesheet on load and reloads without the worker
/// if the deployment no longer serves it.
pub struct StylesheetWatchdog<P: PageHost> {
    page: Arc<P>,
    pattern: Regex,
    delay: Duration,
    triggered: bool,
}

impl<P: PageHost> StylesheetWatchdog<P> {
    pub fn new(page: Arc<P>, shell: &ShellConfig) -> Result<Self> {
        Ok(Self {
            page,
            pattern: shell.stylesheet_regex()?,
            delay: shell.stylesheet_reload_delay(),
            triggered: false,
        })
    }

    /// Stylesheet hrefs this watchdog verifies.
    pub fn watched<'a>(&self, hrefs: &'a [Url]) -> Vec<&'a Url> {
        hrefs
            .iter()
            .filter(|href| self.pattern.is_match(href.as_str()))
            .collect()
    }

    /// Check every watched stylesheet link. Returns whether a reload was
    /// issued.
    pub async fn check(&mut self, hrefs: &[Url]) -> bool {
        if self.triggered {
            return false;
        }
        let watched = self.watched(hrefs);
        if watched.is_empty() {
            return false;
        }

        let page = self.page.as_ref();
        let results = join_all(watched.iter().map(|href| page.fetch_no_store(href))).await;

        let mut missing = false;
        for (href, result) in watched.iter().zip(results) {
            match result {
                Ok(status) if (200..300).contains(&status) => {}
                Ok(status) => {
                    warn!(%href, status, "Global stylesheet missing, reloading without worker");
                    missing = true;
                }
                Err(e) => {
                    warn!(%href, error = %e, "Global stylesheet fetch failed, reloading without worker");
                    missing = true;
                }
            }
        }
        if !missing {
            return false;
        }

        self.triggered = true;
        if let Err(e) = self.page.unregister_all().await {
            warn!(error = %e, "Unregistering workers failed");
        }
        tokio::time::sleep(self.delay).await;
        self.page.reload();
        true
    }
}
