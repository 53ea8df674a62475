// ABOUTME: Router that classifies tasks, delegates them to a backend, and resolves ids later.
// ABOUTME: Unhinted status/cancel calls probe backends in fixed order until one knows the id.

use std::future::Future;
use std::sync::Arc;

use super::backend::{CancelOutcome, StartRequest, StatusLookup, TaskBackend};
use super::classifier;
use super::types::{Backend, TaskDescription, TaskHandle, TaskStatus};
use crate::clients::automation::{AutomationAdapter, AutomationClient};
use crate::clients::durable::{DurableAdapter, DurableWorkflowClient};
use crate::clients::queue::{QueueAdapter, QueueClient};
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, ProbeFailure};

/// Uniform schedule / status / cancel API over the three backends.
///
/// Holds no mutable state: it can be cloned and shared freely, and every call
/// is an independent sequence of backend calls. There is no id → backend
/// memory; callers keep the handle's backend tag and pass it as a hint.
#[derive(Clone)]
pub struct Router {
    durable: Arc<dyn TaskBackend>,
    queue: Arc<dyn TaskBackend>,
    automation: Arc<dyn TaskBackend>,
}

/// Result of asking one backend about an id.
enum Probe<T> {
    Hit(T),
    Miss(ProbeFailure),
}

impl Router {
    pub fn new(
        durable: Arc<dyn TaskBackend>,
        queue: Arc<dyn TaskBackend>,
        automation: Arc<dyn TaskBackend>,
    ) -> Self {
        Self {
            durable,
            queue,
            automation,
        }
    }

    /// Wrap the three collaborator clients in their adapters.
    pub fn from_clients(
        config: &OrchestratorConfig,
        durable: Arc<dyn DurableWorkflowClient>,
        queue: Arc<dyn QueueClient>,
        automation: Arc<dyn AutomationClient>,
    ) -> Self {
        let timeout = config.call_timeout();
        Self::new(
            Arc::new(DurableAdapter::new(durable, config.durable.clone(), timeout)),
            Arc::new(QueueAdapter::new(queue, config.queue.clone(), timeout)),
            Arc::new(AutomationAdapter::new(
                automation,
                config.automation.clone(),
                timeout,
            )),
        )
    }

    fn backend(&self, backend: Backend) -> &dyn TaskBackend {
        match backend {
            Backend::Durable => self.durable.as_ref(),
            Backend::Queue => self.queue.as_ref(),
            Backend::Automation => self.automation.as_ref(),
        }
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Classify the task and start it on the chosen backend.
    ///
    /// Classification is final: a failure to start is reported as-is and the
    /// task is never retried on another backend.
    pub async fn schedule(&self, task: &TaskDescription) -> Result<TaskHandle, OrchestratorError> {
        task.validate()?;

        let classification = classifier::explain(task);
        let backend = classification.backend;
        log::info!(
            "[Router] Scheduling '{}' on {} (rule: {})",
            task.task_type,
            backend,
            classification.rule
        );

        let request = StartRequest::from_task(task);
        let id = self
            .backend(backend)
            .start(&request)
            .await
            .map_err(|source| {
                log::error!(
                    "[Router] {} failed to start '{}': {}",
                    backend,
                    task.task_type,
                    source
                );
                OrchestratorError::Scheduling { backend, source }
            })?;

        log::debug!("[Router] Scheduled {} on {}", id, backend);
        Ok(TaskHandle { id, backend })
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Look up a task's status.
    ///
    /// With a hint, only that backend is asked and "not found" is final.
    /// Without one, backends are probed in `Backend::PROBE_ORDER` and the
    /// first that recognizes the id answers.
    pub async fn get_status(
        &self,
        id: &str,
        backend_hint: Option<Backend>,
    ) -> Result<TaskStatus, OrchestratorError> {
        match backend_hint {
            Some(backend) => match self.probe_status(backend, id).await {
                Probe::Hit(status) => Ok(status),
                Probe::Miss(failure) => Err(Self::hinted_failure(id, failure)),
            },
            None => {
                self.resolve(id, |backend| self.probe_status(backend, id))
                    .await
            }
        }
    }

    async fn probe_status(&self, backend: Backend, id: &str) -> Probe<TaskStatus> {
        match self.backend(backend).query_status(id).await {
            Ok(StatusLookup::Found(status)) => Probe::Hit(TaskStatus {
                id: id.to_string(),
                backend,
                state: status.state,
                raw: status.raw,
            }),
            Ok(StatusLookup::NotFound) => Probe::Miss(ProbeFailure::NotFound { backend }),
            Err(error) => Probe::Miss(ProbeFailure::Failed { backend, error }),
        }
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancel a task. `Ok(true)` when it was cancelled, `Ok(false)` when the
    /// owning backend reports it already finished.
    ///
    /// Resolution follows the same hinted / probed rules as `get_status`.
    pub async fn cancel(
        &self,
        id: &str,
        backend_hint: Option<Backend>,
    ) -> Result<bool, OrchestratorError> {
        let cancelled = match backend_hint {
            Some(backend) => match self.probe_cancel(backend, id).await {
                Probe::Hit(cancelled) => cancelled,
                Probe::Miss(failure) => return Err(Self::hinted_failure(id, failure)),
            },
            None => {
                self.resolve(id, |backend| self.probe_cancel(backend, id))
                    .await?
            }
        };

        if cancelled {
            log::info!("[Router] Cancelled task {}", id);
        } else {
            log::info!("[Router] Task {} already finished, nothing to cancel", id);
        }
        Ok(cancelled)
    }

    async fn probe_cancel(&self, backend: Backend, id: &str) -> Probe<bool> {
        match self.backend(backend).request_cancel(id).await {
            Ok(CancelOutcome::Cancelled) => Probe::Hit(true),
            Ok(CancelOutcome::AlreadyTerminal) => Probe::Hit(false),
            Ok(CancelOutcome::NotFound) => Probe::Miss(ProbeFailure::NotFound { backend }),
            Err(error) => Probe::Miss(ProbeFailure::Failed { backend, error }),
        }
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Ask each backend in probe order, stopping at the first hit. Misses and
    /// failures are collected into the final `NotFound`.
    async fn resolve<T, F, Fut>(&self, id: &str, probe: F) -> Result<T, OrchestratorError>
    where
        F: Fn(Backend) -> Fut,
        Fut: Future<Output = Probe<T>>,
    {
        let mut attempts = Vec::with_capacity(Backend::PROBE_ORDER.len());

        for backend in Backend::PROBE_ORDER {
            match probe(backend).await {
                Probe::Hit(value) => {
                    log::debug!("[Router] Resolved {} on {}", id, backend);
                    return Ok(value);
                }
                Probe::Miss(failure) => {
                    match &failure {
                        ProbeFailure::Failed { error, .. } if error.is_transport() => {
                            log::warn!("[Router] Could not ask {} about {}: {}", backend, id, error)
                        }
                        _ => log::debug!("[Router] {} miss for {}: {}", backend, id, failure),
                    }
                    attempts.push(failure);
                }
            }
        }

        Err(OrchestratorError::NotFound {
            id: id.to_string(),
            attempts,
        })
    }

    fn hinted_failure(id: &str, failure: ProbeFailure) -> OrchestratorError {
        match failure {
            ProbeFailure::NotFound { backend } => OrchestratorError::NotFound {
                id: id.to_string(),
                attempts: vec![ProbeFailure::NotFound { backend }],
            },
            ProbeFailure::Failed { backend, error } => {
                OrchestratorError::from_hinted(backend, id, error)
            }
        }
    }
}
