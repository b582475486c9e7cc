//! Scheduling errors.

use buildq_core::TargetId;
use thiserror::Error;

/// Errors that abandon the batch in flight.
///
/// Build failures are never reported here; they travel as failed
/// [`BatchResult`](buildq_core::BatchResult)s through the completion handler.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("original build target '{0}' is invalid")]
    InvalidOriginalTarget(String),

    #[error("failed to switch active build target to '{0}'")]
    SwitchFailed(TargetId),

    #[error("queue store error: {0}")]
    Store(#[from] buildq_core::Error),
}

pub type QueueResult<T> = std::result::Result<T, QueueError>;
