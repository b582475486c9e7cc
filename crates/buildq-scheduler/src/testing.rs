//! Fake host and configurations shared by the scheduler tests.

use buildq_core::{
    BatchResult, BuildConfiguration, ConfigId, ConfigurationCatalog, TargetId, TargetSwitcher,
    TickScheduler,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct EditorState {
    active: TargetId,
    pending: Option<TargetId>,
    recompiling: bool,
    step_scheduled: bool,
    refuse_switches: bool,
    switch_requests: Vec<TargetId>,
}

/// Editor double whose target switches complete only when told to.
#[derive(Debug)]
pub struct FakeEditor {
    state: Mutex<EditorState>,
}

impl FakeEditor {
    pub fn on(target: &str) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(EditorState {
                active: TargetId::new(target),
                pending: None,
                recompiling: false,
                step_scheduled: false,
                refuse_switches: false,
                switch_requests: Vec::new(),
            }),
        })
    }

    pub fn active(&self) -> TargetId {
        self.state.lock().unwrap().active.clone()
    }

    /// Apply the pending switch, returning whether there was one.
    pub fn finish_switch(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.pending.take() {
            Some(target) => {
                state.active = target;
                true
            }
            None => false,
        }
    }

    pub fn set_recompiling(&self, recompiling: bool) {
        self.state.lock().unwrap().recompiling = recompiling;
    }

    pub fn refuse_switches(&self) {
        self.state.lock().unwrap().refuse_switches = true;
    }

    pub fn switch_requests(&self) -> Vec<TargetId> {
        self.state.lock().unwrap().switch_requests.clone()
    }

    pub fn step_scheduled(&self) -> bool {
        self.state.lock().unwrap().step_scheduled
    }

    pub fn has_pending_switch(&self) -> bool {
        self.state.lock().unwrap().pending.is_some()
    }
}

impl TargetSwitcher for FakeEditor {
    fn active_target(&self) -> TargetId {
        self.active()
    }

    fn try_switch_active_target(&self, target: &TargetId) -> bool {
        let mut state = self.state.lock().unwrap();
        state.switch_requests.push(target.clone());
        if state.refuse_switches {
            return false;
        }
        state.pending = Some(target.clone());
        true
    }

    fn is_recompiling(&self) -> bool {
        self.state.lock().unwrap().recompiling
    }
}

impl TickScheduler for FakeEditor {
    fn schedule_step(&self) {
        self.state.lock().unwrap().step_scheduled = true;
    }

    fn unschedule_step(&self) {
        self.state.lock().unwrap().step_scheduled = false;
    }
}

/// Configuration that records when it is built.
pub struct FakeConfig {
    id: ConfigId,
    target: Option<TargetId>,
    blocked: Option<String>,
    fails: bool,
    builds: AtomicUsize,
    log: Arc<Mutex<Vec<String>>>,
}

impl FakeConfig {
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl BuildConfiguration for FakeConfig {
    fn id(&self) -> &ConfigId {
        &self.id
    }

    fn name(&self) -> &str {
        self.id.as_str()
    }

    fn required_target(&self) -> Option<TargetId> {
        self.target.clone()
    }

    fn can_build(&self) -> Result<(), String> {
        match &self.blocked {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }

    fn build(&self) -> BatchResult {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(self.id.to_string());
        if self.fails {
            BatchResult::failure(self.id.clone(), "compiler error")
        } else {
            BatchResult::success(self.id.clone(), format!("built {}", self.id))
        }
    }
}

/// Catalog of fake configurations sharing one execution log.
#[derive(Default)]
pub struct FakeCatalog {
    configs: Mutex<HashMap<ConfigId, Arc<FakeConfig>>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl FakeCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn insert(&self, name: &str, target: Option<&str>, blocked: Option<&str>, fails: bool) -> ConfigId {
        let id = ConfigId::new(name);
        let config = FakeConfig {
            id: id.clone(),
            target: target.map(TargetId::from),
            blocked: blocked.map(str::to_string),
            fails,
            builds: AtomicUsize::new(0),
            log: self.log.clone(),
        };
        self.configs
            .lock()
            .unwrap()
            .insert(id.clone(), Arc::new(config));
        id
    }

    pub fn add(&self, name: &str, target: Option<&str>) -> ConfigId {
        self.insert(name, target, None, false)
    }

    pub fn add_blocked(&self, name: &str, target: Option<&str>, reason: &str) -> ConfigId {
        self.insert(name, target, Some(reason), false)
    }

    pub fn add_failing(&self, name: &str, target: Option<&str>) -> ConfigId {
        self.insert(name, target, None, true)
    }

    pub fn get(&self, id: &ConfigId) -> Arc<FakeConfig> {
        self.configs.lock().unwrap()[id].clone()
    }

    /// Names of built configurations in build order.
    pub fn build_log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl ConfigurationCatalog for FakeCatalog {
    fn resolve(&self, id: &ConfigId) -> Option<Arc<dyn BuildConfiguration>> {
        self.configs
            .lock()
            .unwrap()
            .get(id)
            .map(|c| c.clone() as Arc<dyn BuildConfiguration>)
    }
}
