// ABOUTME: In-memory fakes of the three collaborator clients, for tests only.
// ABOUTME: They record every call so tests can assert what the adapters sent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::clients::ClientError;
use crate::clients::automation::{AutomationClient, AutomationTrigger, ExecutionStatus};
use crate::clients::durable::{DurableWorkflowClient, WorkflowStartOptions};
use crate::clients::queue::{JobOptions, QueueClient, QueuedJob};

fn unavailable() -> ClientError {
    ClientError::Unavailable("connection refused".to_string())
}

// =============================================================================
// Durable workflow engine
// =============================================================================

#[derive(Debug, Clone)]
pub struct StartedWorkflow {
    pub workflow_type: String,
    pub workflow_id: String,
    pub args: Value,
    pub options: WorkflowStartOptions,
}

#[derive(Debug, Clone)]
struct WorkflowEntry {
    running: bool,
    outcome: Result<Value, String>,
}

#[derive(Default)]
pub struct FakeDurable {
    workflows: Mutex<HashMap<String, WorkflowEntry>>,
    started: Mutex<Vec<StartedWorkflow>>,
    signals: Mutex<Vec<(String, String)>>,
    unavailable: AtomicBool,
    delay: Mutex<Option<Duration>>,
    lookups: AtomicUsize,
    signals_deferred: AtomicBool,
}

impl FakeDurable {
    pub fn insert_running(&self, id: &str) {
        self.workflows.lock().unwrap().insert(
            id.to_string(),
            WorkflowEntry {
                running: true,
                outcome: Ok(Value::Null),
            },
        );
    }

    pub fn insert_finished(&self, id: &str, outcome: Result<Value, String>) {
        self.workflows.lock().unwrap().insert(
            id.to_string(),
            WorkflowEntry {
                running: false,
                outcome,
            },
        );
    }

    /// Let a running workflow finish successfully.
    pub fn complete(&self, id: &str, result: Value) {
        self.insert_finished(id, Ok(result));
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every call sleep before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Accept signals without stopping the workflow, like an engine that
    /// has not yet run the workflow's signal handler.
    pub fn defer_signals(&self, deferred: bool) {
        self.signals_deferred.store(deferred, Ordering::SeqCst);
    }

    pub fn started(&self) -> Vec<StartedWorkflow> {
        self.started.lock().unwrap().clone()
    }

    pub fn signals(&self) -> Vec<(String, String)> {
        self.signals.lock().unwrap().clone()
    }

    /// Number of `is_running` calls, i.e. status/cancel lookups.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    async fn gate(&self) -> Result<(), ClientError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}

#[async_trait]
impl DurableWorkflowClient for FakeDurable {
    async fn start(
        &self,
        workflow_type: &str,
        workflow_id: &str,
        args: &Value,
        options: &WorkflowStartOptions,
    ) -> Result<String, ClientError> {
        self.gate().await?;
        let mut workflows = self.workflows.lock().unwrap();
        if workflows.contains_key(workflow_id) {
            return Err(ClientError::Rejected(format!(
                "workflow {} already started",
                workflow_id
            )));
        }
        workflows.insert(
            workflow_id.to_string(),
            WorkflowEntry {
                running: true,
                outcome: Ok(Value::Null),
            },
        );
        self.started.lock().unwrap().push(StartedWorkflow {
            workflow_type: workflow_type.to_string(),
            workflow_id: workflow_id.to_string(),
            args: args.clone(),
            options: options.clone(),
        });
        Ok(workflow_id.to_string())
    }

    async fn is_running(&self, workflow_id: &str) -> Result<bool, ClientError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        self.workflows
            .lock()
            .unwrap()
            .get(workflow_id)
            .map(|w| w.running)
            .ok_or(ClientError::NotFound)
    }

    async fn result(&self, workflow_id: &str) -> Result<Value, ClientError> {
        self.gate().await?;
        let workflows = self.workflows.lock().unwrap();
        let entry = workflows.get(workflow_id).ok_or(ClientError::NotFound)?;
        entry.outcome.clone().map_err(ClientError::Failed)
    }

    async fn signal(
        &self,
        workflow_id: &str,
        name: &str,
        _payload: Option<&Value>,
    ) -> Result<(), ClientError> {
        self.gate().await?;
        let mut workflows = self.workflows.lock().unwrap();
        let entry = workflows.get_mut(workflow_id).ok_or(ClientError::NotFound)?;
        if !entry.running {
            return Err(ClientError::Failed("workflow already closed".to_string()));
        }
        if !self.signals_deferred.load(Ordering::SeqCst) {
            entry.running = false;
            entry.outcome = Err("cancelled".to_string());
        }
        self.signals
            .lock()
            .unwrap()
            .push((workflow_id.to_string(), name.to_string()));
        Ok(())
    }
}

// =============================================================================
// Job queue
// =============================================================================

#[derive(Debug, Clone)]
pub struct AddedJob {
    pub queue_name: String,
    pub job_type: String,
    pub data: Value,
    pub options: JobOptions,
}

#[derive(Debug, Clone)]
struct JobEntry {
    queue_name: String,
    data: Value,
    state: String,
    reject_removal: bool,
}

type JobTable = Arc<Mutex<HashMap<String, JobEntry>>>;

#[derive(Default)]
pub struct FakeQueue {
    jobs: JobTable,
    added: Mutex<Vec<AddedJob>>,
    next_id: AtomicUsize,
    unavailable: AtomicBool,
    lookups: AtomicUsize,
}

impl FakeQueue {
    pub fn insert(&self, id: &str, queue_name: &str, state: &str) {
        self.jobs.lock().unwrap().insert(
            id.to_string(),
            JobEntry {
                queue_name: queue_name.to_string(),
                data: Value::Null,
                state: state.to_string(),
                reject_removal: false,
            },
        );
    }

    pub fn set_state(&self, id: &str, state: &str) {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(id) {
            job.state = state.to_string();
        }
    }

    pub fn reject_removal(&self, id: &str) {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(id) {
            job.reject_removal = true;
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn added(&self) -> Vec<AddedJob> {
        self.added.lock().unwrap().clone()
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ClientError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

struct FakeJob {
    id: String,
    queue_name: String,
    data: Value,
    jobs: JobTable,
}

#[async_trait]
impl QueuedJob for FakeJob {
    fn id(&self) -> &str {
        &self.id
    }

    fn queue_name(&self) -> &str {
        &self.queue_name
    }

    fn data(&self) -> &Value {
        &self.data
    }

    async fn state(&self) -> Result<String, ClientError> {
        self.jobs
            .lock()
            .unwrap()
            .get(&self.id)
            .map(|j| j.state.clone())
            .ok_or(ClientError::NotFound)
    }

    async fn remove(&self) -> Result<(), ClientError> {
        let mut jobs = self.jobs.lock().unwrap();
        let locked = jobs
            .get(&self.id)
            .map(|job| job.reject_removal)
            .ok_or(ClientError::NotFound)?;
        if locked {
            return Err(ClientError::Rejected(format!(
                "job {} is locked by a worker",
                self.id
            )));
        }
        jobs.remove(&self.id);
        Ok(())
    }
}

#[async_trait]
impl QueueClient for FakeQueue {
    async fn add(
        &self,
        queue_name: &str,
        job_type: &str,
        data: &Value,
        options: &JobOptions,
    ) -> Result<String, ClientError> {
        self.check()?;
        let id = options
            .job_id
            .clone()
            .unwrap_or_else(|| (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string());
        let state = if options.delay_ms.unwrap_or(0) > 0 {
            "delayed"
        } else {
            "waiting"
        };
        self.jobs.lock().unwrap().insert(
            id.clone(),
            JobEntry {
                queue_name: queue_name.to_string(),
                data: data.clone(),
                state: state.to_string(),
                reject_removal: false,
            },
        );
        self.added.lock().unwrap().push(AddedJob {
            queue_name: queue_name.to_string(),
            job_type: job_type.to_string(),
            data: data.clone(),
            options: options.clone(),
        });
        Ok(id)
    }

    async fn get_job(&self, id: &str) -> Result<Option<Arc<dyn QueuedJob>>, ClientError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs.get(id).map(|job| {
            Arc::new(FakeJob {
                id: id.to_string(),
                queue_name: job.queue_name.clone(),
                data: job.data.clone(),
                jobs: self.jobs.clone(),
            }) as Arc<dyn QueuedJob>
        }))
    }
}

// =============================================================================
// Automation system
// =============================================================================

#[derive(Default)]
pub struct FakeAutomation {
    executions: Mutex<HashMap<String, ExecutionStatus>>,
    triggers: Mutex<Vec<AutomationTrigger>>,
    next_id: AtomicUsize,
    unavailable: AtomicBool,
    lookups: AtomicUsize,
}

impl FakeAutomation {
    pub fn insert(&self, id: &str, status: &str, finished: bool) {
        self.executions.lock().unwrap().insert(
            id.to_string(),
            ExecutionStatus {
                id: id.to_string(),
                status: status.to_string(),
                finished,
                workflow_id: None,
                data: Value::Null,
            },
        );
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn triggers(&self) -> Vec<AutomationTrigger> {
        self.triggers.lock().unwrap().clone()
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ClientError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AutomationClient for FakeAutomation {
    async fn schedule(&self, trigger: &AutomationTrigger) -> Result<String, ClientError> {
        self.check()?;
        let id = trigger.execution_id.clone().unwrap_or_else(|| {
            format!("exec-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
        });
        self.executions.lock().unwrap().insert(
            id.clone(),
            ExecutionStatus {
                id: id.clone(),
                status: "running".to_string(),
                finished: false,
                workflow_id: Some(trigger.workflow_id.clone()),
                data: Value::Null,
            },
        );
        self.triggers.lock().unwrap().push(trigger.clone());
        Ok(id)
    }

    async fn get_execution_status(&self, id: &str) -> Result<ExecutionStatus, ClientError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.executions
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(ClientError::NotFound)
    }

    async fn stop_execution(&self, id: &str) -> Result<bool, ClientError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut executions = self.executions.lock().unwrap();
        let execution = executions.get_mut(id).ok_or(ClientError::NotFound)?;
        if execution.finished {
            return Ok(false);
        }
        execution.status = "canceled".to_string();
        execution.finished = true;
        Ok(true)
    }
}
