// ABOUTME: Core library for the task orchestrator.
// ABOUTME: Routes tasks to durable workflow, job queue and automation backends behind one API.

//! Uniform `schedule` / `get_status` / `cancel` over three execution backends.
//!
//! Tasks are classified by [`orchestrator::classifier`] and started on the
//! chosen backend through [`Router`]. Ids returned by `schedule` can later be
//! resolved with or without a backend hint; without one, backends are probed
//! in [`Backend::PROBE_ORDER`].
//!
//! The crate logs through the `log` facade and never installs a logger.

pub mod clients;
pub mod config;
pub mod error;
pub mod orchestrator;

pub mod services {
    pub mod handle_store;
    pub mod n8n;
}

pub use clients::ClientError;
pub use config::OrchestratorConfig;
pub use error::{BackendError, OrchestratorError, ProbeFailure};
pub use orchestrator::classifier::classify;
pub use orchestrator::router::Router;
pub use orchestrator::types::{Backend, TaskDescription, TaskHandle, TaskStatus};
pub use services::handle_store::HandleStore;
pub use services::n8n::N8nClient;
