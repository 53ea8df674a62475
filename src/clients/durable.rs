// ABOUTME: Contract consumed from the durable workflow engine and its TaskBackend adapter.
// ABOUTME: Derives status from is_running/result and cancels by signalling the workflow.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::{ClientError, bounded};
use crate::config::DurableConfig;
use crate::error::BackendError;
use crate::orchestrator::backend::{
    BackendStatus, CancelOutcome, StartRequest, StatusLookup, TaskBackend,
};
use crate::orchestrator::types::Backoff;

/// Options passed alongside a workflow start.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowStartOptions {
    pub task_queue: String,
    pub max_attempts: Option<u32>,
    pub backoff: Option<Backoff>,
}

/// Client for the durable/stateful workflow engine.
#[async_trait]
pub trait DurableWorkflowClient: Send + Sync {
    /// Start a workflow and return its id.
    async fn start(
        &self,
        workflow_type: &str,
        workflow_id: &str,
        args: &serde_json::Value,
        options: &WorkflowStartOptions,
    ) -> Result<String, ClientError>;

    async fn is_running(&self, workflow_id: &str) -> Result<bool, ClientError>;

    /// Result of a finished workflow. `ClientError::Failed` when it failed.
    async fn result(&self, workflow_id: &str) -> Result<serde_json::Value, ClientError>;

    async fn signal(
        &self,
        workflow_id: &str,
        name: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<(), ClientError>;
}

/// Exposes a `DurableWorkflowClient` to the router.
pub struct DurableAdapter {
    client: Arc<dyn DurableWorkflowClient>,
    config: DurableConfig,
    call_timeout: Duration,
}

impl DurableAdapter {
    pub fn new(
        client: Arc<dyn DurableWorkflowClient>,
        config: DurableConfig,
        call_timeout: Duration,
    ) -> Self {
        Self {
            client,
            config,
            call_timeout,
        }
    }

    /// Workflow ids are mandatory for the durable engine; derive one from the
    /// task type when the caller gave none.
    fn workflow_id(request: &StartRequest<'_>) -> String {
        match request.id {
            Some(id) => id.to_string(),
            None if request.task_type.is_empty() => format!("task-{}", Uuid::new_v4()),
            None => format!("{}-{}", request.task_type, Uuid::new_v4()),
        }
    }

    async fn is_running(&self, id: &str) -> Result<Option<bool>, BackendError> {
        match bounded(self.call_timeout, self.client.is_running(id)).await? {
            Ok(running) => Ok(Some(running)),
            Err(ClientError::NotFound) => Ok(None),
            Err(e) => Err(e.into_backend_error()),
        }
    }
}

#[async_trait]
impl TaskBackend for DurableAdapter {
    async fn start(&self, request: &StartRequest<'_>) -> Result<String, BackendError> {
        let workflow_id = Self::workflow_id(request);
        let options = WorkflowStartOptions {
            task_queue: request
                .queue_hint
                .map(str::to_string)
                .unwrap_or_else(|| self.config.task_queue.clone()),
            max_attempts: request.max_attempts,
            backoff: request.backoff.cloned(),
        };

        let id = bounded(
            self.call_timeout,
            self.client
                .start(request.task_type, &workflow_id, request.payload, &options),
        )
        .await?
        .map_err(ClientError::into_backend_error)?;

        log::debug!(
            "[DurableAdapter] Started workflow {} on task queue {}",
            id,
            options.task_queue
        );
        Ok(id)
    }

    async fn query_status(&self, id: &str) -> Result<StatusLookup, BackendError> {
        let running = match self.is_running(id).await? {
            Some(running) => running,
            None => return Ok(StatusLookup::NotFound),
        };

        if running {
            return Ok(StatusLookup::Found(BackendStatus {
                state: "running".to_string(),
                raw: serde_json::json!({ "workflow_id": id, "running": true }),
            }));
        }

        let status = match bounded(self.call_timeout, self.client.result(id)).await? {
            Ok(value) => BackendStatus {
                state: "completed".to_string(),
                raw: value,
            },
            Err(ClientError::Failed(message)) => BackendStatus {
                state: "failed".to_string(),
                raw: serde_json::json!({ "error": message }),
            },
            Err(ClientError::NotFound) => return Ok(StatusLookup::NotFound),
            Err(e) => return Err(e.into_backend_error()),
        };
        Ok(StatusLookup::Found(status))
    }

    /// Cancellation is a signal the workflow handles on its own schedule, so
    /// `Cancelled` means "requested": the workflow keeps reporting running,
    /// and accepting further cancels, until the engine acts on it.
    async fn request_cancel(&self, id: &str) -> Result<CancelOutcome, BackendError> {
        match self.is_running(id).await? {
            None => return Ok(CancelOutcome::NotFound),
            Some(false) => return Ok(CancelOutcome::AlreadyTerminal),
            Some(true) => {}
        }

        match bounded(
            self.call_timeout,
            self.client.signal(id, &self.config.cancel_signal, None),
        )
        .await?
        {
            Ok(()) => {
                log::info!("[DurableAdapter] Sent {} signal to {}", self.config.cancel_signal, id);
                Ok(CancelOutcome::Cancelled)
            }
            Err(ClientError::NotFound) => Ok(CancelOutcome::NotFound),
            // Finished between the running check and the signal.
            Err(ClientError::Failed(_)) => Ok(CancelOutcome::AlreadyTerminal),
            Err(e) => Err(e.into_backend_error()),
        }
    }
}
