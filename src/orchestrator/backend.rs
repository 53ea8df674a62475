// ABOUTME: Backend trait that every execution-engine adapter implements.
// ABOUTME: The router sees only start / query_status / request_cancel through it.

use async_trait::async_trait;

use super::types::{Backoff, Integration, TaskDescription};
use crate::error::BackendError;

/// Everything a backend may use to start a task. Backends ignore the fields
/// they have no concept of.
#[derive(Debug, Clone)]
pub struct StartRequest<'a> {
    pub id: Option<&'a str>,
    pub task_type: &'a str,
    pub payload: &'a serde_json::Value,
    pub queue_hint: Option<&'a str>,
    pub priority: Option<i32>,
    pub delay_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub backoff: Option<&'a Backoff>,
    pub integration: Option<&'a Integration>,
}

impl<'a> StartRequest<'a> {
    pub fn from_task(task: &'a TaskDescription) -> Self {
        Self {
            id: task.id.as_deref(),
            task_type: &task.task_type,
            payload: &task.payload,
            queue_hint: task.queue_hint.as_deref(),
            priority: task.priority,
            delay_ms: task.delay_ms,
            max_attempts: task.retry_policy.as_ref().map(|p| p.max_attempts),
            backoff: task.retry_policy.as_ref().and_then(|p| p.backoff.as_ref()),
            integration: task.integration.as_ref(),
        }
    }
}

/// Backend-native view of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendStatus {
    pub state: String,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusLookup {
    Found(BackendStatus),
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    /// Known to the backend but already finished.
    AlreadyTerminal,
    NotFound,
}

/// The capability surface the router needs from an execution engine.
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Start the task and return the id the backend knows it by.
    async fn start(&self, request: &StartRequest<'_>) -> Result<String, BackendError>;

    async fn query_status(&self, id: &str) -> Result<StatusLookup, BackendError>;

    async fn request_cancel(&self, id: &str) -> Result<CancelOutcome, BackendError>;
}
