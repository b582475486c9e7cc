//! Build configuration trait and build results.
//!
//! A build configuration knows which target it needs and how to build itself.
//! The queue treats it as opaque beyond that.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::{ConfigId, TargetId};

/// Outcome of one queued build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Configuration this result belongs to.
    pub config_id: ConfigId,
    /// Whether the build succeeded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// When the result was produced.
    pub completed_at: DateTime<Utc>,
}

impl BatchResult {
    pub fn success(config_id: ConfigId, message: impl Into<String>) -> Self {
        Self {
            config_id,
            success: true,
            message: message.into(),
            completed_at: Utc::now(),
        }
    }

    pub fn failure(config_id: ConfigId, message: impl Into<String>) -> Self {
        Self {
            config_id,
            success: false,
            message: message.into(),
            completed_at: Utc::now(),
        }
    }

    pub fn is_failure(&self) -> bool {
        !self.success
    }
}

/// A unit of build work the queue can order and execute.
pub trait BuildConfiguration: Send + Sync {
    /// Stable identifier, persisted with the queue.
    fn id(&self) -> &ConfigId;

    /// Display name.
    fn name(&self) -> &str;

    /// Target that must be active while building, `None` for no preference.
    fn required_target(&self) -> Option<TargetId>;

    /// Check whether a build can run at all, with the reason when it cannot.
    fn can_build(&self) -> std::result::Result<(), String>;

    /// Run the build synchronously.
    fn build(&self) -> BatchResult;
}

/// Resolves configuration ids back into configurations.
pub trait ConfigurationCatalog: Send + Sync {
    fn resolve(&self, id: &ConfigId) -> Option<Arc<dyn BuildConfiguration>>;
}

impl ConfigurationCatalog for HashMap<ConfigId, Arc<dyn BuildConfiguration>> {
    fn resolve(&self, id: &ConfigId) -> Option<Arc<dyn BuildConfiguration>> {
        self.get(id).cloned()
    }
}
