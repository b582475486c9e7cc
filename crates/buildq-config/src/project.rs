//! Project configuration parsing.

use crate::settings::{QueueSettings, parse_settings};
use crate::{ConfigError, ConfigResult};
use buildq_core::{ConfigId, TargetId};
use kdl::{KdlDocument, KdlNode};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

static TARGET_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").unwrap());

/// A parsed `buildq.kdl` project.
#[derive(Debug, Clone)]
pub struct Project {
    pub settings: QueueSettings,
    /// Declared build targets.
    pub targets: Vec<TargetId>,
    pub configurations: Vec<ConfigurationDef>,
    pub batches: Vec<BatchDef>,
}

/// A build configuration declared in the project.
#[derive(Debug, Clone)]
pub struct ConfigurationDef {
    pub id: ConfigId,
    /// Display name from `name=`, `None` to show the id.
    pub name: Option<String>,
    /// Required target, `None` for target-agnostic builds.
    pub target: Option<TargetId>,
    /// Paths that must exist before the build can run.
    pub requires: Vec<String>,
    /// Shell commands, run in order.
    pub commands: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<String>,
}

/// A named list of configurations submitted together.
#[derive(Debug, Clone)]
pub struct BatchDef {
    pub name: String,
    pub builds: Vec<ConfigId>,
}

impl ConfigurationDef {
    /// The display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

impl Project {
    pub fn batch(&self, name: &str) -> Option<&BatchDef> {
        self.batches.iter().find(|b| b.name == name)
    }

    pub fn configuration(&self, id: &ConfigId) -> Option<&ConfigurationDef> {
        self.configurations.iter().find(|c| &c.id == id)
    }
}

/// Read and parse a project file.
pub fn parse_project_file(path: impl AsRef<Path>) -> ConfigResult<Project> {
    let content = std::fs::read_to_string(path)?;
    parse_project(&content)
}

/// Parse a project configuration from KDL text.
pub fn parse_project(kdl: &str) -> ConfigResult<Project> {
    let doc: KdlDocument = kdl.parse()?;

    let mut settings = None;
    let mut targets: Vec<TargetId> = Vec::new();
    let mut configurations: Vec<ConfigurationDef> = Vec::new();
    let mut batches: Vec<BatchDef> = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "queue" => {
                if settings.is_some() {
                    return Err(ConfigError::Duplicate("queue settings".to_string()));
                }
                settings = Some(parse_settings(node)?);
            }
            "targets" | "target" => {
                for name in get_all_string_args(node) {
                    let target = parse_target_name(&name)?;
                    if targets.contains(&target) {
                        return Err(ConfigError::Duplicate(format!("target '{}'", target)));
                    }
                    targets.push(target);
                }
            }
            "configuration" => {
                let config = parse_configuration(node)?;
                if configurations.iter().any(|c| c.id == config.id) {
                    return Err(ConfigError::Duplicate(format!(
                        "configuration '{}'",
                        config.id
                    )));
                }
                configurations.push(config);
            }
            "batch" => {
                let batch = parse_batch(node)?;
                if batches.iter().any(|b| b.name == batch.name) {
                    return Err(ConfigError::Duplicate(format!("batch '{}'", batch.name)));
                }
                batches.push(batch);
            }
            _ => {} // Ignore unknown nodes
        }
    }

    // Validate references
    for config in &configurations {
        if let Some(target) = &config.target {
            if !targets.contains(target) {
                return Err(ConfigError::InvalidReference(format!(
                    "configuration '{}' requires undeclared target '{}'",
                    config.id, target
                )));
            }
        }
    }

    let known: HashSet<&ConfigId> = configurations.iter().map(|c| &c.id).collect();
    for batch in &batches {
        for build in &batch.builds {
            if !known.contains(build) {
                return Err(ConfigError::InvalidReference(format!(
                    "batch '{}' builds unknown configuration '{}'",
                    batch.name, build
                )));
            }
        }
    }

    Ok(Project {
        settings: settings.unwrap_or_default(),
        targets,
        configurations,
        batches,
    })
}

fn parse_target_name(name: &str) -> ConfigResult<TargetId> {
    if !TARGET_NAME.is_match(name) {
        return Err(ConfigError::InvalidValue {
            field: "target".to_string(),
            message: format!("'{}' is not a valid target name", name),
        });
    }
    Ok(TargetId::new(name))
}

fn parse_configuration(node: &KdlNode) -> ConfigResult<ConfigurationDef> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("configuration name".to_string()))?;

    let target = get_string_prop(node, "target")
        .map(|t| parse_target_name(&t))
        .transpose()?;
    let working_dir = get_string_prop(node, "dir");
    let display_name = get_string_prop(node, "name");

    let mut requires = Vec::new();
    let mut commands = Vec::new();
    let mut env = HashMap::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "requires" => {
                    requires.extend(get_all_string_args(child));
                }
                "run" => {
                    if let Some(cmd) = get_first_string_arg(child) {
                        commands.push(cmd);
                    }
                }
                "env" => {
                    if let Some(grandchildren) = child.children() {
                        for gc in grandchildren.nodes() {
                            let key = gc.name().value().to_string();
                            if let Some(val) = get_first_string_arg(gc) {
                                env.insert(key, val);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    Ok(ConfigurationDef {
        id: ConfigId::new(name),
        name: display_name,
        target,
        requires,
        commands,
        env,
        working_dir,
    })
}

fn parse_batch(node: &KdlNode) -> ConfigResult<BatchDef> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("batch name".to_string()))?;

    let mut builds = Vec::new();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == "build" {
                builds.extend(get_all_string_args(child).into_iter().map(ConfigId::new));
            }
        }
    }

    if builds.is_empty() {
        return Err(ConfigError::MissingField(format!(
            "builds for batch '{}'",
            name
        )));
    }

    Ok(BatchDef { name, builds })
}

// Helper functions for extracting values from KDL nodes

pub(crate) fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

pub(crate) fn get_first_integer_arg(node: &KdlNode) -> Option<i128> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}
