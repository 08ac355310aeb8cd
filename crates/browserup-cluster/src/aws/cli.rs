//! The `aws` CLI subprocess runner.
//!
//! Invoked directly, never through a shell. Output is requested as JSON
//! and parsed; a non-zero exit carries the captured stderr.

use std::io::ErrorKind;
use std::process::Stdio;

use tokio::process::Command;
use tracing::trace;

use crate::error::{ClusterError, Result};

/// Runs `aws` commands, optionally pinned to a region.
#[derive(Debug, Clone)]
pub struct AwsCli {
    region: Option<String>,
}

impl AwsCli {
    /// A runner with no region argument (global services).
    #[must_use]
    pub const fn global() -> Self {
        Self { region: None }
    }

    /// A runner pinned to `region`.
    #[must_use]
    pub fn in_region(region: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
        }
    }

    /// Runs `aws <service> <action> <args...> --output json` and parses the
    /// output. An empty stdout parses as `null`.
    ///
    /// # Errors
    ///
    /// [`ClusterError::AwsCommand`] on a missing binary or non-zero exit,
    /// [`ClusterError::AwsOutput`] when stdout is not valid JSON.
    pub async fn json(
        &self,
        service: &str,
        action: &str,
        args: &[&str],
    ) -> Result<serde_json::Value> {
        let label = format!("{service} {action}");
        trace!(command = %label, ?args, "running aws cli");

        let mut command = Command::new("aws");
        command.arg(service).arg(action).args(args);
        if let Some(region) = &self.region {
            command.args(["--region", region.as_str()]);
        }
        command.args(["--output", "json"]);

        let output = command
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ClusterError::AwsCommand {
                    action: label.clone(),
                    stderr: "aws CLI not found on PATH".to_string(),
                },
                _ => ClusterError::AwsCommand {
                    action: label.clone(),
                    stderr: e.to_string(),
                },
            })?;

        if !output.status.success() {
            return Err(ClusterError::AwsCommand {
                action: label,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&stdout).map_err(|e| ClusterError::AwsOutput {
            action: label,
            reason: e.to_string(),
        })
    }

    /// The region this runner is pinned to, when any.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_pinning() {
        assert_eq!(AwsCli::global().region(), None);
        assert_eq!(AwsCli::in_region("eu-west-1").region(), Some("eu-west-1"));
    }
}
