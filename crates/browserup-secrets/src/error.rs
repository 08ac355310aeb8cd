//! Error types for secret storage and credential resolution.

use thiserror::Error;

/// Errors that can occur while loading, validating, or persisting secrets.
#[derive(Debug, Error)]
pub enum SecretsError {
    /// A credential field failed its format invariant.
    #[error("invalid {field} provided: {reason}")]
    InvalidField {
        /// The credential field that failed validation.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A required credential field resolved to nothing.
    #[error("missing required credential field: {field}")]
    MissingField {
        /// The credential field that could not be resolved.
        field: &'static str,
    },

    /// The per-user settings directory could not be determined.
    #[error("could not determine a home directory for the secrets store")]
    NoHomeDirectory,

    /// Reading or writing the secrets file failed.
    #[error("secrets file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The secrets file is not valid YAML.
    #[error("secrets file is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for secrets operations.
pub type Result<T> = std::result::Result<T, SecretsError>;
