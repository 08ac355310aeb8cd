//! CLI error taxonomy.
//!
//! Library errors pass through transparently; this enum adds the
//! command-level kinds the dispatcher cares about. Every variant translates
//! to process exit code 1.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-level errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Deploy was asked for while saved credentials already point at a
    /// cluster.
    #[error("found existing cluster: {url}; destroy it first or use load start without --deploy")]
    ClusterAlreadyExists {
        /// The saved cluster URL.
        url: String,
    },

    /// Credential resolution or validation failed.
    #[error("invalid cluster credentials: {source}")]
    InvalidClusterCredentials {
        /// The underlying validation failure.
        #[source]
        source: browserup_secrets::SecretsError,
    },

    /// Reports were requested but the config defines none.
    #[error("no reports defined in config under the reports key")]
    NoReportsDefined,

    /// A run-scoped command found no run id to work with.
    #[error("no run id passed, and no run has been started from this install")]
    NoLastRunId,

    /// The license file to upload does not exist.
    #[error("license file not found: {}", path.display())]
    LicenseMissing {
        /// The missing path.
        path: PathBuf,
    },

    /// The installed docker is older than the CLI supports.
    #[error("docker {found} is older than the minimum supported version {minimum}")]
    DockerTooOld {
        /// The version found.
        found: String,
        /// The minimum supported version.
        minimum: String,
    },

    /// The scenario configuration is invalid.
    #[error(transparent)]
    Config(#[from] browserup_scenario::ConfigError),

    /// A cluster lifecycle operation failed.
    #[error(transparent)]
    Cluster(#[from] browserup_cluster::ClusterError),

    /// A web console operation failed.
    #[error(transparent)]
    Console(#[from] browserup_console::ConsoleError),

    /// Local I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Output serialization failed.
    #[error("output formatting failed: {0}")]
    Format(#[from] serde_json::Error),
}

impl From<browserup_secrets::SecretsError> for CliError {
    fn from(source: browserup_secrets::SecretsError) -> Self {
        Self::InvalidClusterCredentials { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use browserup_secrets::SecretsError;

    #[test]
    fn credential_failures_map_to_invalid_cluster_credentials() {
        let err: CliError = SecretsError::MissingField { field: "api token" }.into();
        assert!(matches!(
            err,
            CliError::InvalidClusterCredentials { .. }
        ));
        assert!(err.to_string().starts_with("invalid cluster credentials"));
    }

    #[test]
    fn display_messages() {
        let err = CliError::NoLastRunId;
        assert_eq!(
            err.to_string(),
            "no run id passed, and no run has been started from this install"
        );

        let err = CliError::ClusterAlreadyExists {
            url: "http://localhost:6730".to_string(),
        };
        assert!(err.to_string().contains("http://localhost:6730"));
    }
}
