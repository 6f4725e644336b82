//! # Stacker Common
//!
//! Common utilities, error types, and logging configuration shared by the
//! Hour Stacker offline shell crates.
//!
//! ## Features
//!
//! - Unified error type with backtrace support
//! - Logging configuration and setup
//! - Deadline helper for network operations

use std::time::Duration;
use thiserror::Error;

pub mod deadline;
pub mod logging;

pub use deadline::with_timeout;
pub use logging::{init_logging, LogConfig, LogFormat};

/// Unified error type for Hour Stacker.
#[derive(Error, Debug)]
pub enum StackerError {
    /// Network-related errors.
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Cache storage errors.
    #[error("Cache error: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors.
    #[error("Config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout errors.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        trace: Option<backtrace::Backtrace>,
    },
}

impl StackerError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source.
    pub fn config_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error with backtrace.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            trace: Some(backtrace::Backtrace::new()),
        }
    }
}

/// Result type alias for Hour Stacker operations.
pub type Result<T> = std::result::Result<T, StackerError>;
