//! Simulated editor host.
//!
//! Owns the active build target the way an editor would. A requested switch
//! lands after `switch-ticks` ticks and is followed by `recompile-ticks` ticks
//! of recompilation. The active target, and any switch still in flight, are
//! kept in the host file so a resumed process sees what the previous one
//! switched to.

use anyhow::{Context, Result};
use buildq_config::QueueSettings;
use buildq_core::{TargetId, TargetSwitcher, TickScheduler};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// On-disk form of the host state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct HostRecord {
    active_target: TargetId,
    #[serde(default)]
    pending_target: Option<TargetId>,
}

#[derive(Debug)]
struct PendingSwitch {
    target: TargetId,
    ticks_left: u32,
}

#[derive(Debug)]
struct HostState {
    active: TargetId,
    pending: Option<PendingSwitch>,
    recompile_left: u32,
    step_due: bool,
}

impl HostState {
    fn record(&self) -> HostRecord {
        HostRecord {
            active_target: self.active.clone(),
            pending_target: self.pending.as_ref().map(|p| p.target.clone()),
        }
    }
}

/// Editor stand-in driven by the CLI tick loop.
pub struct SimulatedEditor {
    state: Mutex<HostState>,
    host_file: PathBuf,
    /// Targets the host can switch to.
    targets: Vec<TargetId>,
    switch_ticks: u32,
    recompile_ticks: u32,
}

impl SimulatedEditor {
    /// Open the host, restoring its state from the host file.
    ///
    /// `active` overrides the stored target and drops any stored switch. With
    /// neither, the first declared target is active.
    pub fn open(
        settings: &QueueSettings,
        targets: Vec<TargetId>,
        active: Option<TargetId>,
    ) -> Result<Self> {
        let host_file = settings.host_file();
        let record = read_record(&host_file)?;
        let overridden = active.is_some();

        let (active, pending) = match (active, record) {
            (Some(active), _) => (active, None),
            (None, Some(record)) => (record.active_target, record.pending_target),
            (None, None) => (
                targets.first().cloned().unwrap_or_else(TargetId::invalid),
                None,
            ),
        };

        let pending = pending
            .filter(|target| target != &active)
            .map(|target| PendingSwitch {
                target,
                ticks_left: settings.switch_ticks,
            });
        if let Some(switch) = &pending {
            info!(build_target = %switch.target, "Continuing interrupted target switch");
        }

        let editor = Self {
            state: Mutex::new(HostState {
                active,
                pending,
                recompile_left: 0,
                step_due: false,
            }),
            host_file,
            targets,
            switch_ticks: settings.switch_ticks,
            recompile_ticks: settings.recompile_ticks,
        };

        if overridden {
            editor.persist(&editor.lock().record())?;
        }
        Ok(editor)
    }

    /// Advance the host by one tick.
    ///
    /// Returns `true` when the queue should run a step: either one was
    /// scheduled or a target switch just landed.
    pub fn tick(&self) -> Result<bool> {
        let mut guard = self.lock();
        let state = &mut *guard;

        let landed = match &mut state.pending {
            Some(switch) if switch.ticks_left > 1 => {
                switch.ticks_left -= 1;
                false
            }
            Some(_) => true,
            None => false,
        };

        if landed {
            if let Some(switch) = state.pending.take() {
                info!(build_target = %switch.target, "Active build target switched");
                state.active = switch.target;
                state.recompile_left = self.recompile_ticks;
                state.step_due = true;
                let record = state.record();
                drop(guard);
                self.persist(&record)?;
                return Ok(true);
            }
        } else if state.recompile_left > 0 {
            state.recompile_left -= 1;
            if state.recompile_left == 0 {
                debug!("Recompilation finished");
            }
        }

        Ok(std::mem::take(&mut state.step_due))
    }

    pub fn is_switching(&self) -> bool {
        self.lock().pending.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, record: &HostRecord) -> Result<()> {
        if let Some(parent) = self.host_file.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&self.host_file, json)
            .with_context(|| format!("Failed to write host state: {}", self.host_file.display()))
    }
}

impl TargetSwitcher for SimulatedEditor {
    fn active_target(&self) -> TargetId {
        self.lock().active.clone()
    }

    fn try_switch_active_target(&self, target: &TargetId) -> bool {
        if !self.targets.contains(target) {
            warn!(build_target = %target, "Host does not support build target");
            return false;
        }

        let record = {
            let mut state = self.lock();
            state.pending = Some(PendingSwitch {
                target: target.clone(),
                ticks_left: self.switch_ticks,
            });
            state.record()
        };
        debug!(build_target = %target, ticks = self.switch_ticks, "Target switch started");

        if let Err(e) = self.persist(&record) {
            warn!(error = %e, "Failed to persist host state");
        }
        true
    }

    fn is_recompiling(&self) -> bool {
        self.lock().recompile_left > 0
    }
}

impl TickScheduler for SimulatedEditor {
    fn schedule_step(&self) {
        self.lock().step_due = true;
    }

    fn unschedule_step(&self) {
        self.lock().step_due = false;
    }
}

fn read_record(path: &Path) -> Result<Option<HostRecord>> {
    match fs::read_to_string(path) {
        Ok(json) => {
            let record = serde_json::from_str(&json)
                .with_context(|| format!("Invalid host state: {}", path.display()))?;
            Ok(Some(record))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to read host state: {}", path.display()))
        }
    }
}
