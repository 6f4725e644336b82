//! # Stacker Page
//!
//! The page half of Hour Stacker's offline shell: it registers the worker,
//! prompts when an update is waiting, reloads once the new worker takes
//! control, and recovers from asset references broken by a deploy.
//!
//! ## Components
//!
//! - [`UpdateController`]: no-update / update-waiting / reloading
//! - [`AssetLoadWatchdog`]: failed chunk loads → one-time hard-reload prompt
//! - [`StylesheetWatchdog`]: missing global stylesheet → unregister and reload
//! - [`PageHost`]: the browser capabilities all of the above use

pub mod events;
pub mod host;
pub mod memory;
pub mod update;
pub mod watchdog;

pub use events::{request_start_correction, start_correction};
pub use host::{PageHost, Prompt};
pub use memory::{MemoryPage, PageAction};
pub use update::{UpdateController, UpdateState};
pub use watchdog::{AssetLoadWatchdog, StylesheetWatchdog};

use stacker_core::{ShellConfig, VersionTag};

/// Registration URL of the worker script for a build's version tag.
pub fn script_url(shell: &ShellConfig, version: &VersionTag) -> String {
    version.registration_url(&shell.script_path, &shell.version_param)
}
