// ABOUTME: Core types for the orchestrator: task descriptions, backends, handles and statuses.
// ABOUTME: Defines the data structures that flow between caller, classifier, router and backends.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

// =============================================================================
// Backend
// =============================================================================

/// The execution engine a task runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Durable, stateful workflow engine.
    Durable,
    /// Lightweight job queue.
    Queue,
    /// External webhook-driven automation system.
    Automation,
}

impl Backend {
    /// Probe order for unhinted status/cancel lookups.
    ///
    /// Durable comes first: it is the default for anything nontrivial and the
    /// backend operators query most. A new backend must be appended here.
    pub const PROBE_ORDER: [Backend; 3] = [Backend::Durable, Backend::Queue, Backend::Automation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Durable => "durable",
            Backend::Queue => "queue",
            Backend::Automation => "automation",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "durable" => Ok(Backend::Durable),
            "queue" => Ok(Backend::Queue),
            "automation" => Ok(Backend::Automation),
            other => Err(format!("unknown backend: {}", other)),
        }
    }
}

// =============================================================================
// Task Description
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backoff {
    pub kind: BackoffKind,
    pub delay_ms: u64,
}

/// Retry settings forwarded to backends that retry internally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff: Option<Backoff>,
}

impl RetryPolicy {
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: None,
        }
    }

    pub fn with_backoff(mut self, kind: BackoffKind, delay_ms: u64) -> Self {
        self.backoff = Some(Backoff { kind, delay_ms });
        self
    }
}

/// HTTP call made by the automation backend instead of its trigger endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub url: String,
    #[serde(default = "default_webhook_method")]
    pub method: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

fn default_webhook_method() -> String {
    "POST".to_string()
}

/// External automation target. A non-empty workflow id sends the task to
/// the automation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub automation_workflow_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<Webhook>,
}

/// One unit of schedulable work, as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescription {
    /// Caller-supplied identifier; the backend assigns one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub task_type: String,
    /// Opaque data handed unmodified to the executing backend.
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_hint: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
    /// Honored by the queue backend only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Honored by the queue backend only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_complex: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration: Option<Integration>,
}

impl TaskDescription {
    pub fn new(task_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: None,
            task_type: task_type.into(),
            payload,
            queue_hint: None,
            tags: BTreeSet::new(),
            retry_policy: None,
            priority: None,
            delay_ms: None,
            is_complex: None,
            integration: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_queue_hint(mut self, queue: impl Into<String>) -> Self {
        self.queue_hint = Some(queue.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn with_complexity(mut self, is_complex: bool) -> Self {
        self.is_complex = Some(is_complex);
        self
    }

    pub fn with_automation(mut self, workflow_id: impl Into<String>) -> Self {
        self.integration = Some(Integration {
            automation_workflow_id: workflow_id.into(),
            webhook: None,
        });
        self
    }

    pub fn with_webhook(mut self, webhook: Webhook) -> Self {
        match self.integration.as_mut() {
            Some(integration) => integration.webhook = Some(webhook),
            None => {
                self.integration = Some(Integration {
                    automation_workflow_id: String::new(),
                    webhook: Some(webhook),
                })
            }
        }
        self
    }

    /// Automation workflow id, if present and non-empty.
    pub fn automation_target(&self) -> Option<&str> {
        self.integration
            .as_ref()
            .map(|i| i.automation_workflow_id.trim())
            .filter(|id| !id.is_empty())
    }

    /// Reject descriptions no backend could honor.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if let Some(policy) = &self.retry_policy {
            if policy.max_attempts == 0 {
                return Err(OrchestratorError::InvalidTask(
                    "retry_policy.max_attempts must be at least 1".to_string(),
                ));
            }
        }
        if let Some(id) = &self.id {
            if id.trim().is_empty() {
                return Err(OrchestratorError::InvalidTask(
                    "id must not be blank when supplied".to_string(),
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Handles and Statuses
// =============================================================================

/// Returned by `Router::schedule`. Callers should keep the backend tag and
/// pass it back as the hint for later status/cancel calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle {
    pub id: String,
    pub backend: Backend,
}

/// Status as reported by the owning backend. `state` is the backend's own
/// vocabulary and is not normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub id: String,
    pub backend: Backend,
    pub state: String,
    pub raw: serde_json::Value,
}
