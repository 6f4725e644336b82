//! Drive a worker through a registration's slots.
//!
//! [`register`] builds a worker from its script URL and installs it;
//! [`activate`] promotes whatever is waiting. The registration emits the
//! events pages observe along the way.

use crate::config::WorkerConfig;
use crate::gc::ActivationReport;
use crate::host::WorkerHost;
use crate::registration::{Registration, WorkerId};
use crate::worker::ServiceWorker;
use crate::{SwError, SwResult};
use stacker_core::ShellConfig;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// Install `worker` as the registration's next version.
///
/// On success the worker sits in the waiting slot. On failure it becomes
/// redundant and whatever was active stays in control.
pub async fn install<H: WorkerHost>(
    registration: &mut Registration,
    worker: &ServiceWorker<H>,
    script_url: Url,
) -> SwResult<WorkerId> {
    let id = registration.begin_install(script_url);
    match worker.install().await {
        Ok(report) => {
            info!(worker = %id, cache = %report.cache_name, "Worker installed");
            registration
                .install_complete()
                .ok_or_else(|| SwError::InvalidState("installing slot emptied during install".into()))
        }
        Err(e) => {
            warn!(worker = %id, error = %e, "Install failed, worker is redundant");
            registration.install_failed();
            Err(e)
        }
    }
}

/// Run the waiting worker's activate handler, then promote it.
pub async fn activate<H: WorkerHost>(
    registration: &mut Registration,
    worker: &ServiceWorker<H>,
) -> SwResult<ActivationReport> {
    if registration.waiting.is_none() {
        return Err(SwError::InvalidState("no worker is waiting".into()));
    }
    let report = worker.activate().await?;
    registration.activate();
    Ok(report)
}

/// Register a script: configure a worker from its URL, install it, and
/// return it ready to be activated.
pub async fn register<H: WorkerHost>(
    registration: &mut Registration,
    host: Arc<H>,
    shell: &ShellConfig,
    script_url: Url,
) -> SwResult<ServiceWorker<H>> {
    let worker = ServiceWorker::new(host, WorkerConfig::from_location(&script_url, shell));
    install(registration, &worker, script_url).await?;
    Ok(worker)
}
