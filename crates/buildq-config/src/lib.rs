//! KDL project configuration for the buildq build queue.
//!
//! This crate handles parsing of:
//! - Queue settings (state location, host timing, logging)
//! - Targets, build configurations and named batches (buildq.kdl)
//! - Variable interpolation in build commands

pub mod error;
pub mod project;
pub mod settings;
pub mod variables;

pub use error::{ConfigError, ConfigResult};
pub use project::{BatchDef, ConfigurationDef, Project, parse_project, parse_project_file};
pub use settings::QueueSettings;
pub use variables::{VariableContext, VariableContextBuilder};
