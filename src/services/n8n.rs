// ABOUTME: HTTP client for the n8n automation system, implementing AutomationClient.
// ABOUTME: Triggers workflows (API or webhook), reads executions and stops them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::clients::ClientError;
use crate::clients::automation::{AutomationClient, AutomationTrigger, ExecutionStatus};
use crate::config::AutomationConfig;
use crate::orchestrator::types::Webhook;

/// Timeout for establishing a connection to n8n or a webhook target.
const CONNECT_TIMEOUT_SECS: u64 = 10;

const API_KEY_HEADER: &str = "X-N8N-API-KEY";

/// Longest response body quoted in an error message.
const BODY_PREVIEW_LIMIT: usize = 256;

#[derive(Debug, Error)]
pub enum N8nSetupError {
    #[error("invalid n8n base url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Body of `POST /api/v1/workflows/trigger`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TriggerBody<'a> {
    workflow_id: &'a str,
    data: &'a Value,
    task_name: &'a str,
    source: &'a str,
    triggered_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution_id: Option<&'a str>,
}

pub struct N8nClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl N8nClient {
    pub fn new(config: &AutomationConfig) -> Result<Self, N8nSetupError> {
        let invalid = |reason: String| N8nSetupError::InvalidUrl {
            url: config.base_url.clone(),
            reason,
        };
        let base_url = Url::parse(&config.base_url).map_err(|e| invalid(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid("not a hierarchical http(s) url".to_string()));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
        })
    }

    /// `{base}/api/v1/{segments...}`, with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Rejected(format!("cannot extend {}", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    fn api_request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let request = self.http.request(method, url);
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn trigger_via_api(&self, trigger: &AutomationTrigger) -> Result<Response, ClientError> {
        let url = self.endpoint(&["workflows", "trigger"])?;
        let body = TriggerBody {
            workflow_id: &trigger.workflow_id,
            data: &trigger.payload,
            task_name: &trigger.task_name,
            source: &trigger.source,
            triggered_at: jiff::Timestamp::now().to_string(),
            execution_id: trigger.execution_id.as_deref(),
        };
        send(self.api_request(Method::POST, url).json(&body)).await
    }

    async fn trigger_via_webhook(
        &self,
        webhook: &Webhook,
        payload: &Value,
    ) -> Result<Response, ClientError> {
        let method = Method::from_bytes(webhook.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| {
                ClientError::Rejected(format!("invalid webhook method '{}'", webhook.method))
            })?;
        let url = Url::parse(&webhook.url).map_err(|e| {
            ClientError::Rejected(format!("invalid webhook url '{}': {}", webhook.url, e))
        })?;

        let mut request = self.http.request(method, url).json(payload);
        for (name, value) in &webhook.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        send(request).await
    }
}

// =============================================================================
// Response Handling
// =============================================================================

struct Response {
    status: StatusCode,
    body: String,
}

impl Response {
    fn json(&self) -> Result<Value, ClientError> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body).map_err(|e| {
            ClientError::Rejected(format!("unreadable n8n response: {} | body={}", e, preview(&self.body)))
        })
    }

    fn error(&self) -> ClientError {
        let message = format!("HTTP {}: {}", self.status.as_u16(), preview(&self.body));
        if self.status == StatusCode::NOT_FOUND {
            ClientError::NotFound
        } else if self.status.is_server_error() {
            ClientError::Unavailable(message)
        } else {
            ClientError::Rejected(message)
        }
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<Response, ClientError> {
    let response = request.send().await.map_err(request_error)?;
    let status = response.status();
    let body = response.text().await.map_err(request_error)?;
    Ok(Response { status, body })
}

fn request_error(err: reqwest::Error) -> ClientError {
    if err.is_builder() {
        ClientError::Rejected(err.to_string())
    } else {
        ClientError::Unavailable(err.to_string())
    }
}

fn preview(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    match trimmed.char_indices().nth(BODY_PREVIEW_LIMIT) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// n8n ids may be strings or numbers depending on version.
fn id_field(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn execution_from(id: &str, body: &Value) -> ExecutionStatus {
    let finished = body.get("finished").and_then(Value::as_bool).unwrap_or(false);
    let status = match body.get("status").and_then(Value::as_str) {
        Some(status) => status.to_string(),
        None if finished => "success".to_string(),
        None => "running".to_string(),
    };
    ExecutionStatus {
        id: id_field(body, "id").unwrap_or_else(|| id.to_string()),
        status,
        finished,
        workflow_id: id_field(body, "workflowId"),
        data: body.get("data").cloned().unwrap_or(Value::Null),
    }
}

// =============================================================================
// AutomationClient
// =============================================================================

#[async_trait]
impl AutomationClient for N8nClient {
    async fn schedule(&self, trigger: &AutomationTrigger) -> Result<String, ClientError> {
        let response = match &trigger.webhook {
            Some(webhook) => self.trigger_via_webhook(webhook, &trigger.payload).await?,
            None => self.trigger_via_api(trigger).await?,
        };
        if !response.status.is_success() {
            return Err(response.error());
        }

        let reported = match &trigger.webhook {
            // Webhook nodes answer with whatever the workflow returns, often not JSON.
            Some(_) => response.json().ok(),
            None => Some(response.json()?),
        }
        .and_then(|body| id_field(&body, "executionId").or_else(|| id_field(&body, "id")));

        let id = match reported {
            Some(id) => id,
            None if trigger.webhook.is_some() => {
                let id = trigger
                    .execution_id
                    .clone()
                    .unwrap_or_else(|| format!("{}-{}", trigger.workflow_id, Uuid::new_v4()));
                log::warn!(
                    "[N8nClient] Webhook for workflow {} returned no execution id, using {}",
                    trigger.workflow_id,
                    id
                );
                id
            }
            None => {
                return Err(ClientError::Rejected(format!(
                    "n8n response for workflow {} has no execution id",
                    trigger.workflow_id
                )));
            }
        };

        log::info!("[N8nClient] Triggered workflow {} as execution {}", trigger.workflow_id, id);
        Ok(id)
    }

    async fn get_execution_status(&self, id: &str) -> Result<ExecutionStatus, ClientError> {
        let url = self.endpoint(&["executions", id])?;
        let response = send(self.api_request(Method::GET, url)).await?;
        if !response.status.is_success() {
            return Err(response.error());
        }
        Ok(execution_from(id, &response.json()?))
    }

    async fn stop_execution(&self, id: &str) -> Result<bool, ClientError> {
        let url = self.endpoint(&["executions", id, "stop"])?;
        let response = send(self.api_request(Method::POST, url)).await?;
        match response.status {
            status if status.is_success() => Ok(true),
            StatusCode::CONFLICT => {
                log::debug!("[N8nClient] Execution {} already finished", id);
                Ok(false)
            }
            _ => Err(response.error()),
        }
    }
}
