// ABOUTME: Contract consumed from the webhook-driven automation system and its TaskBackend adapter.
// ABOUTME: Triggers automation workflows, reads execution status and stops executions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ClientError, bounded};
use crate::config::AutomationConfig;
use crate::error::BackendError;
use crate::orchestrator::backend::{
    BackendStatus, CancelOutcome, StartRequest, StatusLookup, TaskBackend,
};
use crate::orchestrator::types::Webhook;

/// A request to run one automation workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutomationTrigger {
    pub workflow_id: String,
    pub task_name: String,
    /// Caller-supplied id, for systems that accept one.
    pub execution_id: Option<String>,
    pub payload: serde_json::Value,
    pub webhook: Option<Webhook>,
    pub source: String,
}

/// Execution record as reported by the automation system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub finished: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Client for the automation system.
#[async_trait]
pub trait AutomationClient: Send + Sync {
    async fn schedule(&self, trigger: &AutomationTrigger) -> Result<String, ClientError>;

    async fn get_execution_status(&self, id: &str) -> Result<ExecutionStatus, ClientError>;

    /// `true` when the execution was stopped, `false` when it had already ended.
    async fn stop_execution(&self, id: &str) -> Result<bool, ClientError>;
}

/// Exposes an `AutomationClient` to the router.
pub struct AutomationAdapter {
    client: Arc<dyn AutomationClient>,
    config: AutomationConfig,
    call_timeout: Duration,
}

impl AutomationAdapter {
    pub fn new(
        client: Arc<dyn AutomationClient>,
        config: AutomationConfig,
        call_timeout: Duration,
    ) -> Self {
        Self {
            client,
            config,
            call_timeout,
        }
    }
}

#[async_trait]
impl TaskBackend for AutomationAdapter {
    async fn start(&self, request: &StartRequest<'_>) -> Result<String, BackendError> {
        let integration = request.integration.ok_or_else(|| {
            BackendError::Rejected("automation task has no integration block".to_string())
        })?;
        let workflow_id = integration.automation_workflow_id.trim();
        if workflow_id.is_empty() {
            return Err(BackendError::Rejected(
                "automation task has an empty workflow id".to_string(),
            ));
        }

        let trigger = AutomationTrigger {
            workflow_id: workflow_id.to_string(),
            task_name: request.task_type.to_string(),
            execution_id: request.id.map(str::to_string),
            payload: request.payload.clone(),
            webhook: integration.webhook.clone(),
            source: self.config.source.clone(),
        };

        let id = bounded(self.call_timeout, self.client.schedule(&trigger))
            .await?
            .map_err(ClientError::into_backend_error)?;

        log::debug!(
            "[AutomationAdapter] Triggered workflow {} as execution {}",
            trigger.workflow_id,
            id
        );
        Ok(id)
    }

    async fn query_status(&self, id: &str) -> Result<StatusLookup, BackendError> {
        match bounded(self.call_timeout, self.client.get_execution_status(id)).await? {
            Ok(execution) => {
                let raw = serde_json::to_value(&execution)
                    .map_err(|e| BackendError::Rejected(format!("unreadable execution: {}", e)))?;
                Ok(StatusLookup::Found(BackendStatus {
                    state: execution.status,
                    raw,
                }))
            }
            Err(ClientError::NotFound) => Ok(StatusLookup::NotFound),
            Err(e) => Err(e.into_backend_error()),
        }
    }

    async fn request_cancel(&self, id: &str) -> Result<CancelOutcome, BackendError> {
        match bounded(self.call_timeout, self.client.stop_execution(id)).await? {
            Ok(true) => {
                log::info!("[AutomationAdapter] Stopped execution {}", id);
                Ok(CancelOutcome::Cancelled)
            }
            Ok(false) => Ok(CancelOutcome::AlreadyTerminal),
            Err(ClientError::NotFound) => Ok(CancelOutcome::NotFound),
            Err(e) => Err(e.into_backend_error()),
        }
    }
}
