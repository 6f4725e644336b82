//! # Stacker Service Worker
//!
//! The offline app-shell worker for Hour Stacker.
//!
//! ## Features
//!
//! - **Precache**: versioned app-shell store populated all-or-nothing on install
//! - **Garbage collection**: activation deletes every store outside the keep list
//! - **Fetch routing**: network-only build assets, network-first documents,
//!   cache-first static sub-resources, stale-while-revalidate for the rest
//! - **Messages**: `{ "type": "SKIP_WAITING" }` from the page
//! - **Registration model**: installing / waiting / active slots and their events
//!
//! ## Architecture
//!
//! ```text
//! ServiceWorker<H: WorkerHost>
//!     ├── WorkerConfig (version tag, cache names, routing knobs)
//!     └── dispatch(WorkerEvent)
//!             ├── Install  → precache::install
//!             ├── Activate → gc::activate
//!             ├── Fetch    → routing::classify → strategy::*
//!             └── Message  → skip_waiting
//!
//! WorkerHost
//!     ├── open_cache / cache_names / delete_cache
//!     ├── fetch
//!     └── skip_waiting / claim_clients
//! ```

use std::time::Duration;
use stacker_common::StackerError;
use thiserror::Error;

pub mod cache;
pub mod config;
pub mod fetch;
pub mod gc;
pub mod host;
pub mod lifecycle;
pub mod memory;
pub mod message;
pub mod precache;
pub mod registration;
pub mod routing;
pub mod strategy;
pub mod worker;

pub use config::WorkerConfig;
pub use fetch::{CacheMode, Destination, Request, RequestMode, Response, ResponseType};
pub use gc::ActivationReport;
pub use host::{CacheHandle, HostFuture, WorkerHost};
pub use memory::{MemoryHost, NetworkRoute};
pub use message::ClientMessage;
pub use precache::InstallReport;
pub use registration::{
    Registration, RegistrationEvent, RegistrationSnapshot, WorkerId, WorkerInfo, WorkerState,
};
pub use routing::Route;
pub use strategy::WaitUntil;
pub use worker::{EventOutcome, FetchOutcome, ServiceWorker, WorkerEvent};

// ==================== Errors ====================

/// Errors that can occur in service worker operations.
#[derive(Error, Debug)]
pub enum SwError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Install failed fetching {url}: {reason}")]
    Install { url: String, reason: String },

    #[error("Network request timed out after {0:?}")]
    Timeout(Duration),

    #[error("State error: {0}")]
    InvalidState(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Common(StackerError),
}

impl SwError {
    /// Whether the failure came from the network side (transport or deadline).
    pub fn is_network(&self) -> bool {
        matches!(self, SwError::Network(_) | SwError::Timeout(_))
    }
}

impl From<StackerError> for SwError {
    fn from(err: StackerError) -> Self {
        match err {
            StackerError::Timeout(limit) => SwError::Timeout(limit),
            StackerError::Network { message, .. } => SwError::Network(message),
            StackerError::Cache { message, .. } => SwError::Cache(message),
            other => SwError::Common(other),
        }
    }
}

/// Result type alias for worker operations.
pub type SwResult<T> = Result<T, SwError>;
