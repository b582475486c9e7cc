//! Build queue driver - runs a batch across active target switches.
//!
//! The driver is a step function. Each call to [`BuildQueue::run_step`] loads
//! the persisted state, builds everything the active target allows, and
//! either completes the batch or suspends at a target switch. The host calls
//! `run_step` again when a scheduled tick fires or a switch finishes.

use crate::error::{QueueError, QueueResult};
use crate::notifier::{self, CompletionHandler};
use crate::queue::{JobRequest, QueuePhase, QueueState};
use crate::sorter;
use crate::store::QueueStore;
use buildq_core::{
    BatchResult, ConfigId, ConfigurationCatalog, ResourceId, TargetId, TargetSwitcher,
    TickScheduler,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Message given to every request submitted while a batch is in flight.
pub const QUEUE_BUSY_MESSAGE: &str = "cannot queue while executing another build batch";

/// Why a step stopped before the batch completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suspension {
    /// The host is recompiling; a tick has been scheduled.
    Recompiling,
    /// Waiting for the host to activate a target a build needs.
    Switching(TargetId),
    /// All builds are done; waiting for the original target to come back.
    Restoring(TargetId),
}

/// Outcome of one call to [`BuildQueue::run_step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// No batch in flight.
    Idle,
    Suspended(Suspension),
    /// The batch finished and its results were delivered.
    Completed { results: usize },
}

/// Outcome of [`BuildQueue::submit`].
#[derive(Debug)]
pub enum Submission {
    /// The batch was queued and driven as far as it could go.
    Accepted(Step),
    /// Another batch is in flight; one failure per submitted configuration.
    Rejected(Vec<BatchResult>),
}

/// Read-only view of the persisted queue.
#[derive(Debug, Clone)]
pub struct QueueStatus {
    pub phase: QueuePhase,
    pub batch_id: Option<ResourceId>,
    pub original_target: Option<TargetId>,
    pub finished: usize,
    pub total: usize,
    /// Requests in execution order.
    pub requests: Vec<JobRequest>,
}

/// Sequential, resumable, target-switch-aware build queue.
pub struct BuildQueue {
    targets: Arc<dyn TargetSwitcher>,
    ticks: Arc<dyn TickScheduler>,
    catalog: Arc<dyn ConfigurationCatalog>,
    store: Arc<dyn QueueStore>,
    /// Lives only in memory; lost on reload unless reattached.
    on_complete: Option<CompletionHandler>,
}

impl BuildQueue {
    pub fn new(
        targets: Arc<dyn TargetSwitcher>,
        ticks: Arc<dyn TickScheduler>,
        catalog: Arc<dyn ConfigurationCatalog>,
        store: Arc<dyn QueueStore>,
    ) -> Self {
        Self {
            targets,
            ticks,
            catalog,
            store,
            on_complete: None,
        }
    }

    /// Whether a batch is in flight.
    pub fn is_building(&self) -> QueueResult<bool> {
        Ok(self.load()?.is_some())
    }

    /// Snapshot of the persisted queue.
    pub fn status(&self) -> QueueResult<QueueStatus> {
        let state = self.load()?.unwrap_or_default();
        Ok(QueueStatus {
            phase: state.phase(),
            batch_id: state.batch_id,
            original_target: state.original_target.clone(),
            finished: state.finished_count(),
            total: state.requests.len(),
            requests: state.requests,
        })
    }

    /// Queue a batch of builds and start running it.
    ///
    /// Each configuration is validated up front; one that cannot build is
    /// recorded as a failed result and skipped without stopping the batch.
    /// `on_complete` receives one result per entry of `configs`, in the same
    /// order, once the batch has finished and the original target is back.
    pub fn submit<F>(&mut self, configs: &[ConfigId], on_complete: F) -> QueueResult<Submission>
    where
        F: FnOnce(Vec<BatchResult>) + Send + 'static,
    {
        if self.is_building()? {
            warn!(
                rejected = configs.len(),
                "Build batch submitted while another is executing"
            );
            let results = configs
                .iter()
                .map(|id| BatchResult::failure(id.clone(), QUEUE_BUSY_MESSAGE))
                .collect();
            return Ok(Submission::Rejected(results));
        }

        if configs.is_empty() {
            notifier::deliver(Some(Box::new(on_complete)), Vec::new());
            return Ok(Submission::Accepted(Step::Completed { results: 0 }));
        }

        let original = self.targets.active_target();
        let mut requests: Vec<JobRequest> = configs
            .iter()
            .enumerate()
            .map(|(sequence, id)| self.prepare(sequence, id))
            .collect();
        sorter::sort_for_target(&mut requests, &original);

        info!(
            builds = requests.len(),
            original_target = %original,
            switches = sorter::count_switches(&requests, &original),
            "Queued build batch"
        );

        let state = QueueState::new(original, requests);
        self.store.save(&state)?;
        self.on_complete = Some(Box::new(on_complete));

        Ok(Submission::Accepted(self.run_step()?))
    }

    /// Drive the batch as far as the host allows.
    ///
    /// Safe to call at any time: with nothing to do it returns the current
    /// suspension and leaves the persisted state untouched.
    pub fn run_step(&mut self) -> QueueResult<Step> {
        self.ticks.unschedule_step();

        let Some(mut state) = self.load()? else {
            return Ok(Step::Idle);
        };

        let original = match &state.original_target {
            Some(target) if target.is_valid() => target.clone(),
            other => {
                let shown = other.as_ref().map(ToString::to_string).unwrap_or_default();
                error!(original_target = %shown, "Original build target is invalid, clearing build queue");
                self.abandon()?;
                return Err(QueueError::InvalidOriginalTarget(shown));
            }
        };

        if self.targets.is_recompiling() {
            debug!("Host is recompiling, deferring build step");
            self.ticks.schedule_step();
            return Ok(Step::Suspended(Suspension::Recompiling));
        }

        if let Some(pending) = state.switching_to.clone() {
            if self.targets.active_target() != pending {
                debug!(build_target = %pending, "Still waiting for active target switch");
                return Ok(Step::Suspended(Self::waiting_on(&state, pending)));
            }
            info!(build_target = %pending, "Active target switch completed");
            state.switching_to = None;
            self.store.save(&state)?;
        }

        loop {
            let active = self.targets.active_target();

            let Some(index) = state.next_unfinished() else {
                if active == original {
                    return self.complete(state);
                }
                return self.switch_to(state, original);
            };

            let request = &state.requests[index];
            if !request.runs_on(&active) {
                let target = request.required_target.clone().unwrap_or(active);
                return self.switch_to(state, target);
            }

            let result = self.execute(request);
            state.requests[index].finish(result);
            self.store.save(&state)?;
        }
    }

    /// Drop the batch in flight without delivering results.
    ///
    /// A target switch already under way is left to finish.
    pub fn cancel(&mut self) -> QueueResult<bool> {
        let had_batch = self.is_building()?;
        self.abandon()?;
        if had_batch {
            info!("Build batch cancelled");
        }
        Ok(had_batch)
    }

    /// Pick up a batch persisted by a previous host session.
    ///
    /// Schedules a step when one is found. The completion handler does not
    /// survive a reload; reattach one with
    /// [`set_completion_handler`](Self::set_completion_handler).
    pub fn resume(&mut self) -> QueueResult<bool> {
        match self.load()? {
            Some(state) => {
                info!(
                    finished = state.finished_count(),
                    total = state.requests.len(),
                    "Resuming persisted build batch"
                );
                self.ticks.schedule_step();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn set_completion_handler<F>(&mut self, on_complete: F)
    where
        F: FnOnce(Vec<BatchResult>) + Send + 'static,
    {
        self.on_complete = Some(Box::new(on_complete));
    }

    fn load(&self) -> QueueResult<Option<QueueState>> {
        Ok(self.store.load()?.filter(|state| !state.is_empty()))
    }

    /// Validate one submitted configuration into a queued request.
    fn prepare(&self, sequence: usize, id: &ConfigId) -> JobRequest {
        let Some(config) = self.catalog.resolve(id) else {
            warn!(config = %id, "Build configuration not found");
            return JobRequest::rejected(
                sequence,
                BatchResult::failure(id.clone(), format!("build configuration '{id}' not found")),
            );
        };

        if let Err(reason) = config.can_build() {
            info!(config = %id, reason = %reason, "Build configuration cannot build");
            return JobRequest::rejected(sequence, BatchResult::failure(id.clone(), reason));
        }

        JobRequest::new(sequence, id.clone(), config.required_target())
    }

    fn execute(&self, request: &JobRequest) -> BatchResult {
        let Some(config) = self.catalog.resolve(&request.config_id) else {
            warn!(config = %request.config_id, "Build configuration disappeared while queued");
            return BatchResult::failure(
                request.config_id.clone(),
                format!("build configuration '{}' not found", request.config_id),
            );
        };

        info!(config = %config.name(), build_target = ?request.required_target, "Running build");
        let result = config.build();
        if result.success {
            info!(config = %config.name(), "Build succeeded");
        } else {
            warn!(config = %config.name(), message = %result.message, "Build failed");
        }
        result
    }

    /// Persist, then ask the host for `target`. Suspends on success.
    fn switch_to(&mut self, mut state: QueueState, target: TargetId) -> QueueResult<Step> {
        state.switching_to = Some(target.clone());
        self.store.save(&state)?;

        info!(build_target = %target, "Switching active build target");
        if !self.targets.try_switch_active_target(&target) {
            error!(build_target = %target, "Failed to switch active build target, clearing build queue");
            self.abandon()?;
            return Err(QueueError::SwitchFailed(target));
        }

        Ok(Step::Suspended(Self::waiting_on(&state, target)))
    }

    fn waiting_on(state: &QueueState, target: TargetId) -> Suspension {
        if state.is_drained() {
            Suspension::Restoring(target)
        } else {
            Suspension::Switching(target)
        }
    }

    fn complete(&mut self, state: QueueState) -> QueueResult<Step> {
        // Clear first so a panicking handler cannot leave the batch behind
        self.store.clear()?;
        self.ticks.unschedule_step();
        let handler = self.on_complete.take();

        let results = notifier::collect_results(state);
        let count = results.len();
        notifier::deliver(handler, results);

        Ok(Step::Completed { results: count })
    }

    fn abandon(&mut self) -> QueueResult<()> {
        self.on_complete = None;
        self.ticks.unschedule_step();
        self.store.clear()?;
        Ok(())
    }
}
