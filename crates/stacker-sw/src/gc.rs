//! Activate: drop every cache store this version does not own.

use crate::config::WorkerConfig;
use crate::host::WorkerHost;
use crate::SwResult;
use tracing::{debug, info};

/// Outcome of an activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Stores deleted, sorted.
    pub deleted: Vec<String>,
    /// Stores left in place, sorted.
    pub kept: Vec<String>,
}

/// Delete every store outside the keep list.
///
/// Only whole stores are removed; entries inside the runtime store are
/// untouched. Stores from any other version tag go, newer or older.
pub async fn collect<H: WorkerHost>(host: &H, config: &WorkerConfig) -> SwResult<ActivationReport> {
    let mut report = ActivationReport::default();
    let mut names = host.cache_names().await?;
    names.sort();

    for name in names {
        if config.cache_names.keeps(&name) {
            report.kept.push(name);
        } else if host.delete_cache(&name).await? {
            debug!(cache = %name, "Deleted stale cache");
            report.deleted.push(name);
        }
    }
    Ok(report)
}

/// Garbage-collect, then take control of every open page.
pub async fn activate<H: WorkerHost>(host: &H, config: &WorkerConfig) -> SwResult<ActivationReport> {
    let report = collect(host, config).await?;
    host.claim_clients().await?;
    info!(
        version = %config.version,
        deleted = report.deleted.len(),
        "Worker activated"
    );
    Ok(report)
}
