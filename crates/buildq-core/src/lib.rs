//! Core domain types and collaborator traits for the buildq build queue.
//!
//! This crate contains:
//! - Resource, configuration and target identifiers
//! - Build results and the build configuration trait
//! - The narrow host interfaces the queue drives (active target, ticks)

pub mod build;
pub mod error;
pub mod id;
pub mod target;

pub use build::{BatchResult, BuildConfiguration, ConfigurationCatalog};
pub use error::{Error, Result};
pub use id::{ConfigId, ResourceId};
pub use target::{TargetId, TargetSwitcher, TickScheduler};
