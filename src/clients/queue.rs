// ABOUTME: Contract consumed from the lightweight job queue and its TaskBackend adapter.
// ABOUTME: Maps queue hints to prefixed queue names and cancels by removing the job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::{ClientError, bounded};
use crate::config::QueueConfig;
use crate::error::BackendError;
use crate::orchestrator::backend::{
    BackendStatus, CancelOutcome, StartRequest, StatusLookup, TaskBackend,
};
use crate::orchestrator::types::Backoff;

/// Job states after which a job can no longer be removed.
const TERMINAL_STATES: &[&str] = &["completed", "failed"];

/// Per-job options understood by the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOptions {
    pub job_id: Option<String>,
    pub priority: Option<i32>,
    pub delay_ms: Option<u64>,
    pub attempts: u32,
    pub backoff: Option<Backoff>,
}

/// A job as returned by `QueueClient::get_job`.
#[async_trait]
pub trait QueuedJob: Send + Sync {
    fn id(&self) -> &str;

    fn queue_name(&self) -> &str;

    fn data(&self) -> &serde_json::Value;

    /// Queue-native state, e.g. "waiting", "active", "delayed", "completed", "failed".
    async fn state(&self) -> Result<String, ClientError>;

    async fn remove(&self) -> Result<(), ClientError>;
}

/// Client for the job queue.
#[async_trait]
pub trait QueueClient: Send + Sync {
    async fn add(
        &self,
        queue_name: &str,
        job_type: &str,
        data: &serde_json::Value,
        options: &JobOptions,
    ) -> Result<String, ClientError>;

    /// `None` when no job has this id.
    async fn get_job(&self, id: &str) -> Result<Option<Arc<dyn QueuedJob>>, ClientError>;
}

/// Exposes a `QueueClient` to the router.
pub struct QueueAdapter {
    client: Arc<dyn QueueClient>,
    config: QueueConfig,
    call_timeout: Duration,
}

impl QueueAdapter {
    pub fn new(client: Arc<dyn QueueClient>, config: QueueConfig, call_timeout: Duration) -> Self {
        Self {
            client,
            config,
            call_timeout,
        }
    }

    /// Queue name for a task: the hint when given, else the task type.
    pub fn queue_name(&self, request: &StartRequest<'_>) -> String {
        let base = request
            .queue_hint
            .filter(|q| !q.is_empty())
            .unwrap_or(request.task_type);
        if self.config.prefix.is_empty() {
            base.to_string()
        } else {
            format!("{}:{}", self.config.prefix, base)
        }
    }

    /// Job id for a task: the caller's id, else one derived from the task type.
    /// Broker-assigned ids are sequential and would collide with other backends.
    fn job_id(request: &StartRequest<'_>) -> String {
        match request.id {
            Some(id) => id.to_string(),
            None if request.task_type.is_empty() => format!("job-{}", Uuid::new_v4()),
            None => format!("{}-{}", request.task_type, Uuid::new_v4()),
        }
    }

    async fn find(&self, id: &str) -> Result<Option<Arc<dyn QueuedJob>>, BackendError> {
        match bounded(self.call_timeout, self.client.get_job(id)).await? {
            Ok(job) => Ok(job),
            Err(ClientError::NotFound) => Ok(None),
            Err(e) => Err(e.into_backend_error()),
        }
    }

    async fn state_of(&self, job: &dyn QueuedJob) -> Result<String, BackendError> {
        bounded(self.call_timeout, job.state())
            .await?
            .map_err(ClientError::into_backend_error)
    }
}

#[async_trait]
impl TaskBackend for QueueAdapter {
    async fn start(&self, request: &StartRequest<'_>) -> Result<String, BackendError> {
        let queue_name = self.queue_name(request);
        let options = JobOptions {
            job_id: Some(Self::job_id(request)),
            priority: request.priority,
            delay_ms: request.delay_ms,
            attempts: request.max_attempts.unwrap_or(self.config.default_attempts),
            backoff: request.backoff.cloned(),
        };

        let id = bounded(
            self.call_timeout,
            self.client
                .add(&queue_name, request.task_type, request.payload, &options),
        )
        .await?
        .map_err(ClientError::into_backend_error)?;

        log::debug!("[QueueAdapter] Added job {} to {}", id, queue_name);
        Ok(id)
    }

    async fn query_status(&self, id: &str) -> Result<StatusLookup, BackendError> {
        let Some(job) = self.find(id).await? else {
            return Ok(StatusLookup::NotFound);
        };
        let state = self.state_of(job.as_ref()).await?;

        Ok(StatusLookup::Found(BackendStatus {
            state,
            raw: serde_json::json!({
                "id": job.id(),
                "queue": job.queue_name(),
                "data": job.data(),
            }),
        }))
    }

    async fn request_cancel(&self, id: &str) -> Result<CancelOutcome, BackendError> {
        let Some(job) = self.find(id).await? else {
            return Ok(CancelOutcome::NotFound);
        };

        let state = self.state_of(job.as_ref()).await?;
        if TERMINAL_STATES.contains(&state.as_str()) {
            return Ok(CancelOutcome::AlreadyTerminal);
        }

        match bounded(self.call_timeout, job.remove()).await? {
            Ok(()) => {
                log::info!("[QueueAdapter] Removed {} job {}", state, id);
                Ok(CancelOutcome::Cancelled)
            }
            Err(ClientError::NotFound) => Ok(CancelOutcome::NotFound),
            Err(e) => Err(e.into_backend_error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::types::{BackoffKind, RetryPolicy, TaskDescription};
    use crate::orchestrator::testing::FakeQueue;
    use serde_json::json;

    fn adapter(fake: &Arc<FakeQueue>) -> QueueAdapter {
        QueueAdapter::new(fake.clone(), QueueConfig::default(), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn start_passes_scheduling_hints() {
        let fake = Arc::new(FakeQueue::default());
        let task = TaskDescription::new("notify-user", json!({"user": 9}))
            .with_id("notify-9")
            .with_queue_hint("emails")
            .with_priority(2)
            .with_delay_ms(1_000)
            .with_retry_policy(RetryPolicy::attempts(2).with_backoff(BackoffKind::Exponential, 50));

        let id = adapter(&fake)
            .start(&StartRequest::from_task(&task))
            .await
            .unwrap();
        assert_eq!(id, "notify-9");

        let added = fake.added();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].queue_name, "mcp:emails");
        assert_eq!(added[0].job_type, "notify-user");
        assert_eq!(added[0].data, json!({"user": 9}));
        assert_eq!(added[0].options.priority, Some(2));
        assert_eq!(added[0].options.delay_ms, Some(1_000));
        assert_eq!(added[0].options.attempts, 2);
        assert_eq!(added[0].options.backoff.as_ref().unwrap().kind, BackoffKind::Exponential);
    }

    #[tokio::test]
    async fn start_defaults_queue_and_attempts() {
        let fake = Arc::new(FakeQueue::default());
        let task = TaskDescription::new("send-email", json!({}));

        adapter(&fake)
            .start(&StartRequest::from_task(&task))
            .await
            .unwrap();

        let added = fake.added();
        assert_eq!(added[0].queue_name, "mcp:send-email");
        assert_eq!(added[0].options.attempts, 3);
    }

    #[tokio::test]
    async fn start_without_id_uses_namespaced_job_id() {
        let fake = Arc::new(FakeQueue::default());
        let adapter = adapter(&fake);

        let first = adapter
            .start(&StartRequest::from_task(&TaskDescription::new("send-email", json!({}))))
            .await
            .unwrap();
        let second = adapter
            .start(&StartRequest::from_task(&TaskDescription::new("", json!({}))))
            .await
            .unwrap();

        assert!(first.starts_with("send-email-"));
        assert!(second.starts_with("job-"));
        assert_eq!(fake.added()[0].options.job_id.as_deref(), Some(first.as_str()));
    }

    #[test]
    fn empty_prefix_leaves_queue_name_bare() {
        let fake = Arc::new(FakeQueue::default());
        let config = QueueConfig {
            prefix: String::new(),
            default_attempts: 1,
        };
        let adapter = QueueAdapter::new(fake, config, Duration::from_secs(1));
        let task = TaskDescription::new("send-email", json!({})).with_queue_hint("");
        assert_eq!(adapter.queue_name(&StartRequest::from_task(&task)), "send-email");
    }

    #[tokio::test]
    async fn status_reports_native_state() {
        let fake = Arc::new(FakeQueue::default());
        fake.insert("j1", "mcp:emails", "delayed");

        match adapter(&fake).query_status("j1").await.unwrap() {
            StatusLookup::Found(status) => {
                assert_eq!(status.state, "delayed");
                assert_eq!(status.raw["queue"], "mcp:emails");
            }
            StatusLookup::NotFound => panic!("expected job"),
        }
    }

    #[tokio::test]
    async fn missing_job_is_not_found() {
        let fake = Arc::new(FakeQueue::default());
        let adapter = adapter(&fake);
        assert_eq!(adapter.query_status("nope").await.unwrap(), StatusLookup::NotFound);
        assert_eq!(adapter.request_cancel("nope").await.unwrap(), CancelOutcome::NotFound);
    }

    #[tokio::test]
    async fn cancel_removes_waiting_job() {
        let fake = Arc::new(FakeQueue::default());
        fake.insert("j2", "mcp:emails", "waiting");

        let adapter = adapter(&fake);
        assert_eq!(adapter.request_cancel("j2").await.unwrap(), CancelOutcome::Cancelled);
        assert_eq!(adapter.query_status("j2").await.unwrap(), StatusLookup::NotFound);
    }

    #[tokio::test]
    async fn cancel_completed_or_failed_job_is_terminal() {
        let fake = Arc::new(FakeQueue::default());
        fake.insert("done", "mcp:emails", "completed");
        fake.insert("broken", "mcp:emails", "failed");

        let adapter = adapter(&fake);
        assert_eq!(adapter.request_cancel("done").await.unwrap(), CancelOutcome::AlreadyTerminal);
        assert_eq!(adapter.request_cancel("broken").await.unwrap(), CancelOutcome::AlreadyTerminal);
        // Still present: terminal jobs are not removed.
        assert!(matches!(adapter.query_status("done").await.unwrap(), StatusLookup::Found(_)));
    }

    #[tokio::test]
    async fn job_that_finished_after_scheduling_is_terminal() {
        let fake = Arc::new(FakeQueue::default());
        let adapter = adapter(&fake);
        let task = TaskDescription::new("send-email", json!({}));
        let id = adapter.start(&StartRequest::from_task(&task)).await.unwrap();

        fake.set_state(&id, "completed");
        assert_eq!(adapter.request_cancel(&id).await.unwrap(), CancelOutcome::AlreadyTerminal);
    }

    #[tokio::test]
    async fn rejected_removal_surfaces_as_rejection() {
        let fake = Arc::new(FakeQueue::default());
        fake.insert("locked", "mcp:emails", "active");
        fake.reject_removal("locked");

        let err = adapter(&fake).request_cancel("locked").await.unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
    }
}
