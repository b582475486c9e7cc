//! Build targets and the host interfaces that own them.
//!
//! The queue never switches targets or schedules work itself; it asks the
//! host through [`TargetSwitcher`] and [`TickScheduler`] and is re-entered
//! through `BuildQueue::run_step` when the host gets around to it.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Identifier of a build target (platform), e.g. `"windows"`.
///
/// An empty or whitespace-only id is the invalid target the host reports
/// when it has no active target at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The "no active target" value.
    pub fn invalid() -> Self {
        Self(String::new())
    }

    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TargetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TargetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Owner of the host's active build target.
pub trait TargetSwitcher: Send + Sync {
    /// The target currently active in the host.
    fn active_target(&self) -> TargetId;

    /// Start switching the active target.
    ///
    /// Returns `true` when the switch was initiated. Completion may be
    /// asynchronous; the host must re-enter the queue once the new target is
    /// active.
    fn try_switch_active_target(&self, target: &TargetId) -> bool;

    /// Whether the host is busy recompiling and cannot build right now.
    fn is_recompiling(&self) -> bool;
}

/// Host event loop hook used to suspend and resume the queue.
///
/// The scheduled callback is always the queue's step function, so a host only
/// needs to remember whether a step is due.
pub trait TickScheduler: Send + Sync {
    /// Request a call to `run_step` on the next tick.
    fn schedule_step(&self);

    /// Withdraw a previously scheduled step.
    fn unschedule_step(&self);
}
