//! Deadline utilities.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Run an operation with a timeout.
///
/// Expiry drops the operation's future and reports [`crate::StackerError::Timeout`].
pub async fn with_timeout<T, F, Fut>(
    timeout: Duration,
    operation: F,
) -> Result<T, crate::StackerError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    tokio::time::timeout(timeout, operation())
        .await
        .map_err(|_| {
            debug!(?timeout, "Deadline expired");
            crate::StackerError::Timeout(timeout)
        })
}
