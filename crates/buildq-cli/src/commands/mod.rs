//! CLI command implementations.

pub mod run;

use crate::host::SimulatedEditor;
use crate::shell;
use anyhow::{Context, Result};
use buildq_config::{Project, parse_project_file};
use buildq_core::{TargetId, TargetSwitcher};
use buildq_scheduler::{BuildQueue, JsonFileStore, QueuePhase, QueueStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// A parsed project and the directory it lives in.
pub struct Workspace {
    pub project: Project,
    pub base_dir: PathBuf,
}

impl Workspace {
    pub fn load(config_path: &str) -> Result<Self> {
        let mut project = parse_project_file(config_path)
            .with_context(|| format!("Failed to load project config: {}", config_path))?;

        let base_dir = Path::new(config_path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .canonicalize()
            .context("Failed to resolve project directory")?;

        project.settings.state_dir = base_dir.join(&project.settings.state_dir);
        Ok(Self { project, base_dir })
    }

    /// Open the simulated editor and a queue persisted in the state directory.
    ///
    /// `active` only applies when no batch is queued; a batch in flight owns
    /// the editor's target until it completes.
    pub fn session(&self, batch: &str, active: Option<TargetId>) -> Result<Session> {
        let settings = &self.project.settings;
        let store = Arc::new(JsonFileStore::new(settings.queue_file()));

        let active = match active {
            Some(target) if queued(store.as_ref())? => {
                warn!(build_target = %target, "Ignoring active target override while a batch is queued");
                None
            }
            other => other,
        };

        let editor = Arc::new(SimulatedEditor::open(
            settings,
            self.project.targets.clone(),
            active,
        )?);
        let catalog = Arc::new(shell::catalog(&self.project, batch, &self.base_dir));

        Ok(Session {
            queue: BuildQueue::new(editor.clone(), editor.clone(), catalog, store),
            editor,
            tick_ms: settings.tick_ms,
        })
    }
}

fn queued(store: &dyn QueueStore) -> Result<bool> {
    let state = store.load().context("Failed to read build queue")?;
    Ok(state.is_some_and(|state| !state.is_empty()))
}

/// A build queue wired to the simulated editor.
pub struct Session {
    pub queue: BuildQueue,
    pub editor: Arc<SimulatedEditor>,
    pub tick_ms: u64,
}

pub fn validate(path: &str) -> Result<()> {
    match parse_project_file(path) {
        Ok(project) => {
            println!("Configuration is valid");
            println!("  Targets: {}", project.targets.len());
            println!("  Configurations: {}", project.configurations.len());
            println!("  Batches: {}", project.batches.len());
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

pub fn status(config_path: &str) -> Result<()> {
    let workspace = Workspace::load(config_path)?;
    let session = workspace.session("", None)?;
    let status = session.queue.status().context("Failed to read build queue")?;

    let phase = match &status.phase {
        QueuePhase::Idle => {
            println!("No build batch queued");
            return Ok(());
        }
        QueuePhase::Executing => "executing".to_string(),
        QueuePhase::Switching { target } => format!("switching to '{}'", target),
        QueuePhase::Restoring { target } => format!("restoring '{}'", target),
    };

    if let Some(batch_id) = status.batch_id {
        println!("Batch: {}", batch_id);
    }
    println!("Phase: {}", phase);
    if let Some(original) = &status.original_target {
        println!("Original target: {}", original);
    }
    println!("Active target: {}", session.editor.active_target());
    println!("Progress: {}/{}", status.finished, status.total);

    for request in &status.requests {
        let target = request
            .required_target
            .as_ref()
            .map(TargetId::as_str)
            .unwrap_or("any");
        match &request.result {
            Some(result) if result.success => {
                println!("  ✓ {} [{}] {}", request.config_id, target, result.message)
            }
            Some(result) => println!("  ✗ {} [{}] {}", request.config_id, target, result.message),
            None => println!("  ○ {} [{}]", request.config_id, target),
        }
    }

    Ok(())
}

pub fn cancel(config_path: &str) -> Result<()> {
    let workspace = Workspace::load(config_path)?;
    let mut session = workspace.session("", None)?;

    if session.queue.cancel().context("Failed to cancel build batch")? {
        println!("Build batch cancelled");
    } else {
        println!("No build batch queued");
    }
    Ok(())
}
