//! Cluster lifecycle errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while creating, destroying, or upgrading clusters.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The docker binary is missing or the daemon is not running.
    #[error("docker is not available: {reason}")]
    DockerUnavailable {
        /// What the probe reported.
        reason: String,
    },

    /// The compose definition is not where it should be.
    #[error("docker compose file does not exist at {}", path.display())]
    ComposeFileMissing {
        /// The expected path.
        path: PathBuf,
    },

    /// A compose invocation exited non-zero.
    #[error("failed to run 'docker compose {step}': {stderr}")]
    ComposeFailed {
        /// Which compose operation failed (up, down, pull).
        step: &'static str,
        /// Captured standard error.
        stderr: String,
    },

    /// A one-off container run exited non-zero.
    #[error("container run failed: {stderr}")]
    ContainerRunFailed {
        /// Captured standard error.
        stderr: String,
    },

    /// A local port a cluster service needs is already taken.
    #[error("ports needed by the cluster are in use: {}", conflicts.join(", "))]
    PortsInUse {
        /// One entry per occupied port.
        conflicts: Vec<String>,
    },

    /// Deployment parameters failed validation.
    #[error("invalid cluster params: {reason}")]
    InvalidParams {
        /// Why the parameters were rejected.
        reason: String,
    },

    /// An `aws` CLI invocation exited non-zero.
    #[error("aws {action} failed: {stderr}")]
    AwsCommand {
        /// The service and action that failed, e.g. `cloudformation create-stack`.
        action: String,
        /// Captured standard error.
        stderr: String,
    },

    /// An `aws` CLI invocation produced output we could not interpret.
    #[error("unexpected output from aws {action}: {reason}")]
    AwsOutput {
        /// The service and action whose output was malformed.
        action: String,
        /// What was wrong with it.
        reason: String,
    },

    /// AWS credentials are absent or rejected.
    #[error("AWS credentials validation failed: {reason}")]
    AwsCredentials {
        /// What the identity check reported.
        reason: String,
    },

    /// A named key pair could not be validated or created.
    #[error("key pair error: {reason}")]
    KeyPair {
        /// What went wrong.
        reason: String,
    },

    /// No stack with the given name exists in the region.
    #[error("stack not found by name: {name}")]
    StackNotFound {
        /// The requested stack name.
        name: String,
    },

    /// The infrastructure provider reported a terminal creation failure.
    #[error("failed to deploy stack \"{stack}\", stack status: \"{status}\"")]
    StackCreateFailed {
        /// The failed stack.
        stack: String,
        /// Its terminal status.
        status: String,
    },

    /// One or more stacks could not be deleted.
    #[error("failed to delete stacks: {}", stacks.join(", "))]
    StackDeleteFailed {
        /// The stacks that reported a delete failure.
        stacks: Vec<String>,
    },

    /// A stack wait budget expired before the target state was reached.
    #[error("timed out waiting for stack \"{stack}\", last status: \"{status}\"")]
    StackWaitTimeout {
        /// The stack being waited on.
        stack: String,
        /// The status observed on the final poll.
        status: String,
    },

    /// Upgrade was requested but the credentials carry no services tag.
    #[error("cannot upgrade cluster: servicesImageTag not in credentials")]
    MissingServicesTag,

    /// The deployed services are newer than this CLI.
    #[error("cluster services ({cluster}) are newer than this CLI ({cli}); upgrade the CLI")]
    ClusterNewerThanCli {
        /// The cluster's services tag.
        cluster: String,
        /// The CLI's built-in services version.
        cli: String,
    },

    /// The deployed services are older than this CLI.
    #[error("cluster services ({cluster}) are older than this CLI ({cli}); run upgrade")]
    ClusterOlderThanCli {
        /// The cluster's services tag.
        cluster: String,
        /// The CLI's built-in services version.
        cli: String,
    },

    /// A web console operation failed.
    #[error(transparent)]
    Console(#[from] browserup_console::ConsoleError),

    /// Secret storage failed.
    #[error(transparent)]
    Secrets(#[from] browserup_secrets::SecretsError),

    /// Local I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON from a subprocess or API was malformed.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for cluster operations.
pub type Result<T> = std::result::Result<T, ClusterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = ClusterError::StackCreateFailed {
            stack: "ClusterStack-BrowserUp-abc".to_string(),
            status: "ROLLBACK_COMPLETE".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to deploy stack \"ClusterStack-BrowserUp-abc\", stack status: \"ROLLBACK_COMPLETE\""
        );

        let err = ClusterError::PortsInUse {
            conflicts: vec!["6730 (webconsole)".to_string(), "6781 (zookeeper)".to_string()],
        };
        assert!(err.to_string().contains("6730 (webconsole)"));
    }
}
