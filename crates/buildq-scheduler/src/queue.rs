//! Persisted queue state.
//!
//! `QueueState` is the only thing that survives a host reload. Everything the
//! driver needs to resume lives here.

use buildq_core::{BatchResult, ConfigId, ResourceId, TargetId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One queued build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub id: ResourceId,
    /// Position in the submitted batch; results are reported in this order.
    pub sequence: usize,
    pub config_id: ConfigId,
    /// `None` means the build runs on whatever target is active.
    pub required_target: Option<TargetId>,
    pub finished: bool,
    pub result: Option<BatchResult>,
}

impl JobRequest {
    pub fn new(sequence: usize, config_id: ConfigId, required_target: Option<TargetId>) -> Self {
        Self {
            id: ResourceId::new(),
            sequence,
            config_id,
            required_target,
            finished: false,
            result: None,
        }
    }

    /// A request that was rejected before it was queued.
    pub fn rejected(sequence: usize, result: BatchResult) -> Self {
        Self {
            id: ResourceId::new(),
            sequence,
            config_id: result.config_id.clone(),
            required_target: None,
            finished: true,
            result: Some(result),
        }
    }

    /// Whether this request can run while `active` is the active target.
    pub fn runs_on(&self, active: &TargetId) -> bool {
        self.required_target
            .as_ref()
            .is_none_or(|required| required == active)
    }

    pub fn finish(&mut self, result: BatchResult) {
        self.finished = true;
        self.result = Some(result);
    }
}

/// Where an in-flight batch currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueuePhase {
    Idle,
    Executing,
    Switching { target: TargetId },
    Restoring { target: TargetId },
}

/// State of the batch in flight, if any.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueState {
    pub batch_id: Option<ResourceId>,
    /// Target active when the batch was submitted; restored at the end.
    pub original_target: Option<TargetId>,
    /// Target of a switch that was initiated but not yet observed.
    pub switching_to: Option<TargetId>,
    pub submitted_at: Option<DateTime<Utc>>,
    /// Requests in execution order.
    pub requests: Vec<JobRequest>,
}

impl QueueState {
    pub fn new(original_target: TargetId, requests: Vec<JobRequest>) -> Self {
        Self {
            batch_id: Some(ResourceId::new()),
            original_target: Some(original_target),
            switching_to: None,
            submitted_at: Some(Utc::now()),
            requests,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Index of the first unfinished request in execution order.
    pub fn next_unfinished(&self) -> Option<usize> {
        self.requests.iter().position(|r| !r.finished)
    }

    pub fn finished_count(&self) -> usize {
        self.requests.iter().filter(|r| r.finished).count()
    }

    pub fn is_drained(&self) -> bool {
        self.requests.iter().all(|r| r.finished)
    }

    /// Phase as seen from the persisted state alone.
    pub fn phase(&self) -> QueuePhase {
        if self.is_empty() {
            return QueuePhase::Idle;
        }
        match &self.switching_to {
            Some(target) if self.is_drained() => QueuePhase::Restoring {
                target: target.clone(),
            },
            Some(target) => QueuePhase::Switching {
                target: target.clone(),
            },
            None => QueuePhase::Executing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(sequence: usize, target: Option<&str>) -> JobRequest {
        JobRequest::new(
            sequence,
            ConfigId::new(format!("config-{sequence}")),
            target.map(TargetId::from),
        )
    }

    #[test]
    fn test_runs_on_active_or_no_preference() {
        let active = TargetId::new("linux");
        assert!(request(0, None).runs_on(&active));
        assert!(request(1, Some("linux")).runs_on(&active));
        assert!(!request(2, Some("windows")).runs_on(&active));
    }

    #[test]
    fn test_next_unfinished_scans_in_queue_order() {
        let mut state = QueueState::new(
            TargetId::new("linux"),
            vec![request(0, None), request(1, None), request(2, None)],
        );
        assert_eq!(state.next_unfinished(), Some(0));

        state.requests[0].finish(BatchResult::success(ConfigId::new("config-0"), "ok"));
        assert_eq!(state.next_unfinished(), Some(1));
        assert_eq!(state.finished_count(), 1);

        state.requests[1].finish(BatchResult::success(ConfigId::new("config-1"), "ok"));
        state.requests[2].finish(BatchResult::success(ConfigId::new("config-2"), "ok"));
        assert_eq!(state.next_unfinished(), None);
        assert!(state.is_drained());
    }

    #[test]
    fn test_rejected_request_is_finished_with_its_result() {
        let rejected =
            JobRequest::rejected(3, BatchResult::failure(ConfigId::new("bad"), "missing scene"));
        assert!(rejected.finished);
        assert_eq!(rejected.config_id, ConfigId::new("bad"));
        assert_eq!(rejected.result.unwrap().message, "missing scene");
    }

    #[test]
    fn test_phase_follows_switch_and_drain() {
        let mut state = QueueState::default();
        assert_eq!(state.phase(), QueuePhase::Idle);

        state = QueueState::new(TargetId::new("linux"), vec![request(0, Some("windows"))]);
        assert_eq!(state.phase(), QueuePhase::Executing);

        state.switching_to = Some(TargetId::new("windows"));
        assert_eq!(
            state.phase(),
            QueuePhase::Switching {
                target: TargetId::new("windows")
            }
        );

        state.requests[0].finish(BatchResult::success(ConfigId::new("config-0"), "ok"));
        state.switching_to = Some(TargetId::new("linux"));
        assert_eq!(
            state.phase(),
            QueuePhase::Restoring {
                target: TargetId::new("linux")
            }
        );
    }
}
