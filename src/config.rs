// ABOUTME: Orchestrator configuration: per-backend settings and the per-call time budget.
// ABOUTME: Loaded from defaults, environment variables, or a JSON file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_CALL_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DurableConfig {
    /// Task queue used when a task carries no queue hint.
    pub task_queue: String,
    /// Signal sent to a running workflow to request cancellation.
    pub cancel_signal: String,
}

impl Default for DurableConfig {
    fn default() -> Self {
        Self {
            task_queue: "migration".to_string(),
            cancel_signal: "cancel".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue names are `{prefix}:{queue}`; empty prefix disables it.
    pub prefix: String,
    /// Attempts requested when a task has no retry policy.
    pub default_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            prefix: "mcp".to_string(),
            default_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Reported to the automation system as the trigger source.
    pub source: String,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5678".to_string(),
            api_key: None,
            source: "mcp".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Upper bound on every single backend call made by an adapter.
    pub call_timeout_ms: u64,
    pub durable: DurableConfig,
    pub queue: QueueConfig,
    pub automation: AutomationConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            durable: DurableConfig::default(),
            queue: QueueConfig::default(),
            automation: AutomationConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl OrchestratorConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Build from process environment variables, defaults for anything unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment-shaped).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(raw) = get("ORCHESTRATOR_CALL_TIMEOUT_MS") {
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => config.call_timeout_ms = ms,
                _ => log::warn!(
                    "[Config] Ignoring invalid ORCHESTRATOR_CALL_TIMEOUT_MS={}, using {}",
                    raw,
                    config.call_timeout_ms
                ),
            }
        }
        if let Some(queue) = get("TEMPORAL_TASK_QUEUE") {
            config.durable.task_queue = queue;
        }
        if let Some(prefix) = get("BULLMQ_PREFIX") {
            config.queue.prefix = prefix;
        }
        if let Some(url) = get("N8N_URL") {
            config.automation.base_url = url;
        }
        if let Some(key) = get("N8N_API_KEY") {
            config.automation.api_key = Some(key);
        }

        config
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
