//! Deployment version tags and the cache names derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use url::Url;

/// Build environment variables consulted for a commit identifier, in order:
/// hosting platform, CI, generic.
pub const BUILD_SHA_VARS: [&str; 3] = ["VERCEL_GIT_COMMIT_SHA", "GITHUB_SHA", "COMMIT_SHA"];

/// Tag used when the worker cannot recover one from its own URL.
pub const DEV_TAG: &str = "dev";

/// Opaque per-deployment version string. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionTag(String);

impl VersionTag {
    /// Wrap a tag, rejecting blank input.
    pub fn new(tag: impl Into<String>) -> Option<Self> {
        let tag = tag.into();
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The local development tag.
    pub fn dev() -> Self {
        Self(DEV_TAG.to_string())
    }

    /// Resolve the build-time tag through `lookup`, falling back to the
    /// current Unix time in milliseconds.
    pub fn resolve_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        for var in BUILD_SHA_VARS {
            if let Some(tag) = lookup(var).and_then(Self::new) {
                debug!(var, tag = %tag, "Resolved version tag from build environment");
                return tag;
            }
        }
        Self::timestamp()
    }

    /// Resolve the build-time tag from the process environment.
    pub fn from_env() -> Self {
        Self::resolve_with(|var| std::env::var(var).ok())
    }

    /// Tag derived from the current time.
    pub fn timestamp() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(millis.to_string())
    }

    /// Recover the tag from the worker's own script URL (`/sw.js?v=<tag>`).
    ///
    /// A missing or blank parameter yields [`DEV_TAG`].
    pub fn from_script_url(url: &Url, param: &str) -> Self {
        url.query_pairs()
            .find(|(key, _)| key == param)
            .and_then(|(_, value)| Self::new(value.into_owned()))
            .unwrap_or_else(Self::dev)
    }

    /// Like [`VersionTag::from_script_url`], for an unparsed href.
    pub fn from_script_href(href: &str, param: &str) -> Self {
        match Url::parse(href) {
            Ok(url) => Self::from_script_url(&url, param),
            Err(e) => {
                warn!(href, error = %e, "Unparsable worker URL, using dev tag");
                Self::dev()
            }
        }
    }

    /// Registration URL for the worker script carrying this tag.
    pub fn registration_url(&self, script_path: &str, param: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair(param, &self.0)
            .finish();
        format!("{}?{}", script_path, query)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_dev(&self) -> bool {
        self.0 == DEV_TAG
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VersionTag {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "version tag must not be empty".to_string())
    }
}

impl From<VersionTag> for String {
    fn from(tag: VersionTag) -> Self {
        tag.0
    }
}

/// Names of the two cache stores a worker version keeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheNames {
    /// Versioned app shell store.
    pub precache: String,
    /// Version-independent runtime store.
    pub runtime: String,
}

impl CacheNames {
    pub fn new(app_name: &str, version: &VersionTag) -> Self {
        Self {
            precache: format!("{}-precache-{}", app_name, version),
            runtime: format!("{}-runtime", app_name),
        }
    }

    /// Stores that survive activation.
    pub fn keep_list(&self) -> [&str; 2] {
        [self.precache.as_str(), self.runtime.as_str()]
    }

    pub fn keeps(&self, name: &str) -> bool {
        self.keep_list().contains(&name)
    }
}
