//! Queue settings parsing.

use crate::project::{get_first_integer_arg, get_first_string_arg};
use crate::{ConfigError, ConfigResult};
use kdl::KdlNode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for the queue host, from the `queue { ... }` node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Directory holding the persisted queue and host state.
    pub state_dir: PathBuf,
    /// Host tick interval in milliseconds.
    pub tick_ms: u64,
    /// Ticks a simulated target switch takes to land.
    pub switch_ticks: u32,
    /// Ticks of recompilation after each switch.
    pub recompile_ticks: u32,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".buildq"),
            tick_ms: 50,
            switch_ticks: 3,
            recompile_ticks: 2,
            log_level: "info".to_string(),
        }
    }
}

impl QueueSettings {
    /// File holding the persisted queue state.
    pub fn queue_file(&self) -> PathBuf {
        self.state_dir.join("queue.json")
    }

    /// File holding the simulated host's active target.
    pub fn host_file(&self) -> PathBuf {
        self.state_dir.join("host.json")
    }
}

pub(crate) fn parse_settings(node: &KdlNode) -> ConfigResult<QueueSettings> {
    let mut settings = QueueSettings::default();

    let Some(children) = node.children() else {
        return Ok(settings);
    };

    for child in children.nodes() {
        match child.name().value() {
            "state-dir" | "state_dir" => {
                let dir = get_first_string_arg(child)
                    .ok_or_else(|| ConfigError::MissingField("queue state-dir".to_string()))?;
                settings.state_dir = PathBuf::from(dir);
            }
            "tick-ms" | "tick_ms" => {
                settings.tick_ms = first_integer(child, "tick-ms")?;
                if settings.tick_ms == 0 {
                    return Err(ConfigError::InvalidValue {
                        field: "tick-ms".to_string(),
                        message: "must be greater than zero".to_string(),
                    });
                }
            }
            "switch-ticks" | "switch_ticks" => {
                settings.switch_ticks = first_integer(child, "switch-ticks")?;
            }
            "recompile-ticks" | "recompile_ticks" => {
                settings.recompile_ticks = first_integer(child, "recompile-ticks")?;
            }
            "log-level" | "log_level" => {
                settings.log_level = get_first_string_arg(child)
                    .ok_or_else(|| ConfigError::MissingField("queue log-level".to_string()))?;
            }
            _ => {} // Ignore unknown settings
        }
    }

    Ok(settings)
}

fn first_integer<T: TryFrom<i128>>(node: &KdlNode, field: &str) -> ConfigResult<T> {
    let value = get_first_integer_arg(node)
        .ok_or_else(|| ConfigError::MissingField(format!("queue {field}")))?;

    T::try_from(value).map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("{value} is out of range"),
    })
}
