//! Event dispatch: one entry point per lifecycle event kind.

use crate::config::WorkerConfig;
use crate::fetch::{Request, Response};
use crate::gc::{self, ActivationReport};
use crate::host::WorkerHost;
use crate::message::ClientMessage;
use crate::precache::{self, InstallReport};
use crate::routing::{self, Route};
use crate::strategy::{self, WaitUntil};
use crate::SwResult;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};

/// Events the host delivers to the worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Message(JsonValue),
}

/// What handling an event produced.
#[derive(Debug)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivationReport),
    Fetch(FetchOutcome),
    /// Whether the message was understood.
    Message(bool),
}

/// Result of the fetch handler.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted; the host fetches normally.
    Passthrough,
    /// Respond with this response, then settle `wait_until`.
    Respond {
        response: Response,
        route: Route,
        wait_until: WaitUntil,
    },
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Passthrough => None,
            FetchOutcome::Respond { response, .. } => Some(response),
        }
    }

    pub fn route(&self) -> Route {
        match self {
            FetchOutcome::Passthrough => Route::Passthrough,
            FetchOutcome::Respond { route, .. } => *route,
        }
    }

    /// Take the response after settling any background work.
    pub async fn settle(self) -> Option<Response> {
        match self {
            FetchOutcome::Passthrough => None,
            FetchOutcome::Respond {
                response,
                wait_until,
                ..
            } => {
                wait_until.settle().await;
                Some(response)
            }
        }
    }
}

/// A running worker bound to a host and its configuration.
pub struct ServiceWorker<H: WorkerHost> {
    host: Arc<H>,
    config: Arc<WorkerConfig>,
}

impl<H: WorkerHost> Clone for ServiceWorker<H> {
    fn clone(&self) -> Self {
        Self {
            host: self.host.clone(),
            config: self.config.clone(),
        }
    }
}

impl<H: WorkerHost> ServiceWorker<H> {
    pub fn new(host: Arc<H>, config: WorkerConfig) -> Self {
        Self {
            host,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Handle one event. The returned future resolves only once the
    /// handler's own work is complete; fetch background work is returned
    /// in the `wait_until` of [`FetchOutcome::Respond`].
    pub async fn dispatch(&self, event: WorkerEvent) -> SwResult<EventOutcome> {
        match event {
            WorkerEvent::Install => self.install().await.map(EventOutcome::Installed),
            WorkerEvent::Activate => self.activate().await.map(EventOutcome::Activated),
            WorkerEvent::Fetch(request) => self.fetch(request).await.map(EventOutcome::Fetch),
            WorkerEvent::Message(data) => self.message(&data).await.map(EventOutcome::Message),
        }
    }

    pub async fn install(&self) -> SwResult<InstallReport> {
        let span = info_span!("install", version = %self.config.version);
        precache::install(self.host.as_ref(), &self.config)
            .instrument(span)
            .await
    }

    pub async fn activate(&self) -> SwResult<ActivationReport> {
        let span = info_span!("activate", version = %self.config.version);
        gc::activate(self.host.as_ref(), &self.config)
            .instrument(span)
            .await
    }

    pub async fn fetch(&self, request: Request) -> SwResult<FetchOutcome> {
        let route = routing::classify(&request, &self.config);
        debug!(url = %request.url, method = %request.method, %route, "Routing request");

        let host = self.host.as_ref();
        let mut wait_until = WaitUntil::new();
        let response = match route {
            Route::Passthrough => return Ok(FetchOutcome::Passthrough),
            Route::NetworkOnly => strategy::network_only(host, &self.config, &request).await?,
            Route::NetworkFirst => strategy::network_first(host, &self.config, &request).await,
            Route::CacheFirst => strategy::cache_first(host, &self.config, &request).await?,
            Route::StaleWhileRevalidate => {
                strategy::stale_while_revalidate(&self.host, &self.config, &request, &mut wait_until)
                    .await
            }
        };

        Ok(FetchOutcome::Respond {
            response,
            route,
            wait_until,
        })
    }

    pub async fn message(&self, data: &JsonValue) -> SwResult<bool> {
        match ClientMessage::from_value(data) {
            Some(ClientMessage::SkipWaiting) => {
                debug!("Skip-waiting requested by page");
                self.host.skip_waiting().await?;
                Ok(true)
            }
            None => {
                debug!(?data, "Ignoring unknown message");
                Ok(false)
            }
        }
    }
}
