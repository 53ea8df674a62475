// ABOUTME: Orchestrator module for routing tasks between execution backends.
// ABOUTME: Contains types, backend trait, classifier, and the router.

pub mod backend;
pub mod classifier;
pub mod router;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;
