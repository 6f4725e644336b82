//! Version tag resolution for builds.

use serde::Serialize;
use stacker_core::{CacheNames, ShellConfig, VersionTag};
use std::process::{Command, Stdio};
use tracing::debug;

/// Short SHA of the checked-out commit, if git is available.
pub fn git_short_sha() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        debug!(status = %output.status, "git rev-parse failed");
        return None;
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!sha.is_empty()).then_some(sha)
}

/// Pick the tag: explicit value, then git (when asked), then the build
/// environment, then a timestamp.
pub fn resolve<F>(explicit: Option<&str>, git: Option<String>, lookup: F) -> VersionTag
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(tag) = explicit.and_then(VersionTag::new) {
        return tag;
    }
    if let Some(tag) = git.and_then(VersionTag::new) {
        return tag;
    }
    VersionTag::resolve_with(lookup)
}

/// Everything derived from a tag.
#[derive(Debug, Serialize)]
pub struct Derived {
    pub tag: String,
    pub script_url: String,
    pub precache: String,
    pub runtime: String,
}

impl Derived {
    pub fn new(shell: &ShellConfig, tag: &VersionTag) -> Self {
        let names = CacheNames::new(&shell.app_name, tag);
        Self {
            tag: tag.to_string(),
            script_url: tag.registration_url(&shell.script_path, &shell.version_param),
            precache: names.precache,
            runtime: names.runtime,
        }
    }
}
