// ABOUTME: Error types surfaced by the router and the backend client adapters.
// ABOUTME: Separates "task does not exist" from "could not ask the backend".

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::orchestrator::types::Backend;

/// Failure of a single call into a backend adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend could not be reached at all.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend call timed out after {0:?}")]
    TimedOut(Duration),

    /// The backend answered but refused the request.
    #[error("backend rejected request: {0}")]
    Rejected(String),
}

impl BackendError {
    /// True when the backend never gave an answer.
    pub fn is_transport(&self) -> bool {
        matches!(self, BackendError::Unavailable(_) | BackendError::TimedOut(_))
    }
}

/// Why one backend did not resolve an id during unhinted probing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    NotFound { backend: Backend },
    Failed { backend: Backend, error: BackendError },
}

impl ProbeFailure {
    pub fn backend(&self) -> Backend {
        match self {
            ProbeFailure::NotFound { backend } | ProbeFailure::Failed { backend, .. } => *backend,
        }
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeFailure::NotFound { backend } => write!(f, "{}: not found", backend),
            ProbeFailure::Failed { backend, error } => write!(f, "{}: {}", backend, error),
        }
    }
}

fn join_attempts(attempts: &[ProbeFailure]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors returned by `Router` operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid task: {0}")]
    InvalidTask(String),

    /// The classified backend failed to start the task. Never retried on
    /// another backend.
    #[error("failed to schedule task on {backend}: {source}")]
    Scheduling {
        backend: Backend,
        #[source]
        source: BackendError,
    },

    /// No probed backend recognized the id. `attempts` holds one entry per
    /// backend asked, in probe order.
    #[error("task {id} not found ({})", join_attempts(.attempts))]
    NotFound {
        id: String,
        attempts: Vec<ProbeFailure>,
    },

    /// A hinted backend could not be reached.
    #[error("{backend} unavailable while looking up task {id}: {source}")]
    BackendUnavailable {
        backend: Backend,
        id: String,
        #[source]
        source: BackendError,
    },

    /// A hinted backend answered but refused the request.
    #[error("{backend} refused request for task {id}: {source}")]
    Backend {
        backend: Backend,
        id: String,
        #[source]
        source: BackendError,
    },
}

impl OrchestratorError {
    /// True for a `NotFound` where at least one backend could not be asked,
    /// so the task may still exist.
    pub fn is_inconclusive(&self) -> bool {
        match self {
            OrchestratorError::NotFound { attempts, .. } => attempts.iter().any(|a| {
                matches!(a, ProbeFailure::Failed { error, .. } if error.is_transport())
            }),
            _ => false,
        }
    }

    /// Backend the error is attributed to, when a single one is involved.
    pub fn backend(&self) -> Option<Backend> {
        match self {
            OrchestratorError::Scheduling { backend, .. }
            | OrchestratorError::BackendUnavailable { backend, .. }
            | OrchestratorError::Backend { backend, .. } => Some(*backend),
            OrchestratorError::NotFound { attempts, .. } if attempts.len() == 1 => {
                Some(attempts[0].backend())
            }
            _ => None,
        }
    }

    /// Map a failed call on a hinted backend to the matching variant.
    pub(crate) fn from_hinted(backend: Backend, id: &str, error: BackendError) -> Self {
        if error.is_transport() {
            OrchestratorError::BackendUnavailable {
                backend,
                id: id.to_string(),
                source: error,
            }
        } else {
            OrchestratorError::Backend {
                backend,
                id: id.to_string(),
                source: error,
            }
        }
    }
}
