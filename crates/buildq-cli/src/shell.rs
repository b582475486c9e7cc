//! Build configurations that run shell commands.

use buildq_config::{ConfigurationDef, Project, VariableContext, VariableContextBuilder};
use buildq_core::{BatchResult, BuildConfiguration, ConfigId, TargetId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::debug;

/// A project configuration whose build is a list of `sh -c` commands.
pub struct ShellConfiguration {
    def: ConfigurationDef,
    batch: String,
    /// Directory the project file lives in; relative paths resolve here.
    base_dir: PathBuf,
}

impl ShellConfiguration {
    pub fn new(def: ConfigurationDef, batch: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            def,
            batch: batch.into(),
            base_dir: base_dir.into(),
        }
    }

    fn working_dir(&self) -> PathBuf {
        match &self.def.working_dir {
            Some(dir) => self.base_dir.join(dir),
            None => self.base_dir.clone(),
        }
    }

    fn variables(&self) -> VariableContext {
        let mut ctx = VariableContextBuilder::new()
            .with_configuration(self.def.id.as_str(), self.def.display_name())
            .with_target(self.def.target.as_ref().map(TargetId::as_str).unwrap_or_default())
            .with_batch(self.batch.as_str())
            .build();
        ctx.populate_env();
        ctx
    }
}

impl BuildConfiguration for ShellConfiguration {
    fn id(&self) -> &ConfigId {
        &self.def.id
    }

    fn name(&self) -> &str {
        self.def.display_name()
    }

    fn required_target(&self) -> Option<TargetId> {
        self.def.target.clone()
    }

    fn can_build(&self) -> Result<(), String> {
        let ctx = self.variables();
        for required in ctx.interpolate_vec(&self.def.requires) {
            if !self.base_dir.join(&required).exists() {
                return Err(format!("missing required input: {required}"));
            }
        }
        Ok(())
    }

    fn build(&self) -> BatchResult {
        let id = &self.def.id;
        let ctx = self.variables();
        let env = ctx.interpolate_map(&self.def.env);
        let dir = self.working_dir();
        let commands = ctx.interpolate_vec(&self.def.commands);

        println!("▶ Building '{}'", id);
        for command in &commands {
            debug!(config = %id, command = %command, "Running build command");
            let output = match Command::new("sh")
                .arg("-c")
                .arg(command)
                .current_dir(&dir)
                .envs(&env)
                .output()
            {
                Ok(output) => output,
                Err(e) => {
                    return BatchResult::failure(id.clone(), format!("failed to run `{command}`: {e}"));
                }
            };

            print_lines(id, " ", &output.stdout);
            print_lines(id, "!", &output.stderr);

            if !output.status.success() {
                return BatchResult::failure(
                    id.clone(),
                    format!("`{command}` failed with {}", output.status),
                );
            }
        }

        BatchResult::success(id.clone(), format!("{} command(s) succeeded", commands.len()))
    }
}

fn print_lines(id: &ConfigId, marker: &str, bytes: &[u8]) {
    for line in String::from_utf8_lossy(bytes).lines() {
        println!("  [{}]{} {}", id, marker, line);
    }
}

/// Every configuration in `project`, keyed by id, for a run of `batch`.
pub fn catalog(
    project: &Project,
    batch: &str,
    base_dir: &Path,
) -> HashMap<ConfigId, Arc<dyn BuildConfiguration>> {
    project
        .configurations
        .iter()
        .map(|def| {
            let config: Arc<dyn BuildConfiguration> =
                Arc::new(ShellConfiguration::new(def.clone(), batch, base_dir));
            (def.id.clone(), config)
        })
        .collect()
}
