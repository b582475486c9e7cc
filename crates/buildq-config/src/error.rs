//! Project configuration errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse buildq.kdl: {0}")]
    Parse(#[from] kdl::KdlError),

    #[error("failed to read project file: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing {0}")]
    MissingField(String),

    #[error("invalid {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// A target, configuration, batch or settings block declared twice.
    #[error("{0} is declared more than once")]
    Duplicate(String),

    /// A name that points at nothing declared in the project.
    #[error("{0}")]
    InvalidReference(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
