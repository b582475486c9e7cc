//! Resumable, target-switch-aware build queue.
//!
//! Runs a batch of builds one at a time, switching the host's active target
//! when a build needs a different one and suspending until the switch lands.
//! All progress is persisted through a [`QueueStore`], so a host that reloads
//! mid-batch picks up where it left off.

pub mod error;
pub mod notifier;
pub mod orchestrator;
pub mod queue;
pub mod sorter;
pub mod store;

#[cfg(test)]
mod testing;

pub use error::{QueueError, QueueResult};
pub use notifier::CompletionHandler;
pub use orchestrator::{BuildQueue, QUEUE_BUSY_MESSAGE, QueueStatus, Step, Submission, Suspension};
pub use queue::{JobRequest, QueuePhase, QueueState};
pub use store::{JsonFileStore, MemoryStore, QueueStore};
