//! Hour Stacker Core Library
//!
//! This crate provides the shell configuration, version tag resolution,
//! cache naming, and page event payloads shared by the worker and the page.

pub mod config;
pub mod types;
pub mod version;

pub use config::{DocumentPolicy, ShellConfig};
pub use types::ShiftStartCorrection;
pub use version::{CacheNames, VersionTag};
