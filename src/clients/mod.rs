// ABOUTME: Narrow contracts consumed from the external execution engines, plus adapters.
// ABOUTME: Each adapter turns one collaborator contract into a TaskBackend for the router.

pub mod automation;
pub mod durable;
pub mod queue;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::error::BackendError;

/// Errors a collaborator client reports back to its adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("not found")]
    NotFound,

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("rejected: {0}")]
    Rejected(String),

    /// The task itself ended in failure (durable `result()` throwing).
    #[error("task failed: {0}")]
    Failed(String),
}

impl ClientError {
    /// Convert for calls where "not found" and "failed" have no special meaning.
    pub(crate) fn into_backend_error(self) -> BackendError {
        match self {
            ClientError::Unavailable(msg) => BackendError::Unavailable(msg),
            ClientError::Rejected(msg) => BackendError::Rejected(msg),
            ClientError::NotFound => BackendError::Rejected("not found".to_string()),
            ClientError::Failed(msg) => BackendError::Rejected(msg),
        }
    }
}

/// Run one collaborator call under the adapter's time budget.
pub(crate) async fn bounded<T, F>(limit: Duration, call: F) -> Result<Result<T, ClientError>, BackendError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| BackendError::TimedOut(limit))
}
