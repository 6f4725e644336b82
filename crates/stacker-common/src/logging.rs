//! Logging setup for the Hour Stacker tools.
//!
//! Everything is written to stderr; stdout belongs to the tool's results.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event, for build logs that get parsed.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Source file and line on each event, plus worker span timings.
    pub verbose: bool,
    /// Directive string (e.g. "stacker_sw=debug"). `RUST_LOG` is used when unset.
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            verbose: false,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Debug level with locations and span timings.
    pub fn debug() -> Self {
        Self {
            level: Level::DEBUG,
            verbose: true,
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.to_string());
        match self.filter {
            Some(ref directives) => EnvFilter::try_new(directives).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }
}

/// Install the global subscriber. Call once, at startup.
pub fn init_logging(config: LogConfig) {
    let span_events = if config.verbose {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = match config.format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(config.verbose)
            .with_line_number(config.verbose)
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(span_events)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(layer)
        .init();
}
