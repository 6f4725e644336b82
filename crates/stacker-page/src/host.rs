//! Capabilities the page side needs from the browser.

use serde_json::Value as JsonValue;
use stacker_sw::{ClientMessage, HostFuture, SwResult, WorkerId};
use url::Url;

/// A dismissible prompt offering the user a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// A new worker is waiting to take over.
    UpdateAvailable,
    /// Build assets failed to load after a deploy.
    AssetsFailed,
}

impl Prompt {
    pub fn title(&self) -> &'static str {
        match self {
            Prompt::UpdateAvailable => "Update available",
            Prompt::AssetsFailed => "Update required",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Prompt::UpdateAvailable => "A new version of Hour Stacker is ready.",
            Prompt::AssetsFailed => "Some resources failed to load. Reload to update.",
        }
    }

    /// Label of the accept action.
    pub fn action(&self) -> &'static str {
        "Reload"
    }
}

/// Browser capabilities used by the update controller and the watchdogs.
pub trait PageHost: Send + Sync + 'static {
    /// Surface a prompt. The user's answer comes back through the owner of
    /// the prompt (e.g. [`crate::UpdateController::accept`]).
    fn show_prompt(&self, prompt: Prompt);

    /// Post a message to one worker instance.
    fn post_message(&self, worker: WorkerId, message: ClientMessage) -> SwResult<()>;

    /// Full page reload.
    fn reload(&self);

    /// Dispatch a custom event on the window.
    fn dispatch_event(&self, name: &str, detail: JsonValue);

    /// Ask the registration to look for a newer script.
    fn check_for_update(&self) -> HostFuture<'_, ()>;

    /// Unregister every worker registration. Returns how many there were.
    fn unregister_all(&self) -> HostFuture<'_, usize>;

    /// Delete every cache store. Returns how many there were.
    fn clear_caches(&self) -> HostFuture<'_, usize>;

    /// Fetch bypassing every cache; resolves to the HTTP status.
    fn fetch_no_store<'a>(&'a self, url: &'a Url) -> HostFuture<'a, u16>;
}
