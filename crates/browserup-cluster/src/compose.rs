//! Docker and docker compose invocation.
//!
//! No shell is involved; `docker` is executed directly with validated
//! arguments, and compose failures carry the failing step and captured
//! stderr.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use browserup_secrets::app_settings_dir;

use crate::error::{ClusterError, Result};

const COMPOSE_FILE_NAME: &str = "docker-compose.yml";

/// The compose definition shipped with the CLI, installed under the
/// per-user settings directory on first use.
const EMBEDDED_COMPOSE: &str = include_str!("../resources/docker-compose.yml");

/// Drives `docker compose` against one compose file.
#[derive(Debug, Clone)]
pub struct DockerClient {
    compose_file: PathBuf,
}

impl DockerClient {
    /// Uses the compose file at `path`.
    #[must_use]
    pub fn new(compose_file: impl Into<PathBuf>) -> Self {
        Self {
            compose_file: compose_file.into(),
        }
    }

    /// Uses the CLI's bundled compose definition, writing it under the
    /// settings directory when missing.
    ///
    /// # Errors
    ///
    /// Returns an error when the settings directory is unavailable or the
    /// file cannot be written.
    pub fn with_default_compose_file() -> Result<Self> {
        Ok(Self::new(ensure_compose_file_installed()?))
    }

    /// The compose file driving this client.
    #[must_use]
    pub fn compose_file(&self) -> &Path {
        &self.compose_file
    }

    /// Confirms the docker binary exists and the daemon answers.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::DockerUnavailable`] with the probe's output
    /// otherwise.
    pub async fn check_docker_available() -> Result<()> {
        let output = Command::new("docker")
            .args(["info", "--format", "{{json .ServerVersion}}"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ClusterError::DockerUnavailable {
                    reason: "docker binary not found on PATH".to_string(),
                },
                _ => ClusterError::DockerUnavailable {
                    reason: e.to_string(),
                },
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ClusterError::DockerUnavailable {
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// The installed docker version, e.g. `27.3.1`.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::DockerUnavailable`] when docker is missing
    /// or the version output is unrecognizable.
    pub async fn docker_version() -> Result<String> {
        let output = Command::new("docker")
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ClusterError::DockerUnavailable {
                reason: e.to_string(),
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_docker_version(&stdout).ok_or_else(|| ClusterError::DockerUnavailable {
            reason: format!("could not parse docker version from: {}", stdout.trim()),
        })
    }

    /// `docker compose pull`.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::ComposeFailed`] when the pull exits
    /// non-zero.
    pub async fn compose_pull(&self) -> Result<()> {
        info!("pulling cluster images");
        self.compose("pull", &[], &BTreeMap::new()).await
    }

    /// `docker compose up -d` for the given services.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::ComposeFailed`] when the up exits non-zero.
    pub async fn compose_up(
        &self,
        services: &[&str],
        env: &BTreeMap<String, String>,
    ) -> Result<()> {
        if services.is_empty() {
            debug!("no services provided for 'compose up', nothing to do");
            return Ok(());
        }
        info!(?services, "starting cluster services");
        let mut args = vec!["-d"];
        args.extend(services);
        self.compose("up", &args, env).await
    }

    /// `docker compose down`, optionally removing volumes.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::ComposeFailed`] when the down exits
    /// non-zero.
    pub async fn compose_down(
        &self,
        remove_volumes: bool,
        env: &BTreeMap<String, String>,
    ) -> Result<()> {
        info!(remove_volumes, "stopping cluster services");
        let args: &[&str] = if remove_volumes { &["-v"] } else { &[] };
        self.compose("down", args, env).await
    }

    async fn compose(
        &self,
        step: &'static str,
        args: &[&str],
        env: &BTreeMap<String, String>,
    ) -> Result<()> {
        if !self.compose_file.is_file() {
            return Err(ClusterError::ComposeFileMissing {
                path: self.compose_file.clone(),
            });
        }

        debug!(step, compose_file = %self.compose_file.display(), "running docker compose");
        let output = Command::new("docker")
            .arg("compose")
            .arg("-f")
            .arg(&self.compose_file)
            .arg(step)
            .args(args)
            .envs(env)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ClusterError::DockerUnavailable {
                    reason: "docker binary not found on PATH".to_string(),
                },
                _ => ClusterError::ComposeFailed {
                    step,
                    stderr: e.to_string(),
                },
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ClusterError::ComposeFailed {
                step,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Runs a one-off command in an image (`docker run --rm`), returning its
/// stdout.
///
/// # Errors
///
/// Returns [`ClusterError::DockerUnavailable`] when docker is missing and
/// [`ClusterError::ContainerRunFailed`] on a non-zero exit.
pub async fn run_in_image(image: &str, command: &[String]) -> Result<String> {
    debug!(image, ?command, "running one-off container");
    let output = Command::new("docker")
        .args(["run", "--rm"])
        .arg(image)
        .args(command)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => ClusterError::DockerUnavailable {
                reason: "docker binary not found on PATH".to_string(),
            },
            _ => ClusterError::ContainerRunFailed {
                stderr: e.to_string(),
            },
        })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(ClusterError::ContainerRunFailed {
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Writes the bundled compose definition under the settings directory when
/// it is not already installed, returning its path.
///
/// # Errors
///
/// Returns an error when the settings directory is unavailable or the file
/// cannot be written.
pub fn ensure_compose_file_installed() -> Result<PathBuf> {
    let dir = app_settings_dir()?;
    fs::create_dir_all(&dir)?;
    let path = dir.join(COMPOSE_FILE_NAME);
    if !path.is_file() {
        debug!(path = %path.display(), "installing bundled compose file");
        fs::write(&path, EMBEDDED_COMPOSE)?;
    }
    Ok(path)
}

fn parse_docker_version(stdout: &str) -> Option<String> {
    // "Docker version 27.3.1, build ce12230"
    let rest = stdout.strip_prefix("Docker version ")?;
    let version: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if version.is_empty() {
        None
    } else {
        Some(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn docker_version_parsing() {
        assert_eq!(
            parse_docker_version("Docker version 27.3.1, build ce12230").as_deref(),
            Some("27.3.1")
        );
        assert!(parse_docker_version("docker: command not found").is_none());
    }

    #[tokio::test]
    async fn missing_compose_file_is_rejected_before_invocation() {
        let dir = TempDir::new().expect("tempdir");
        let client = DockerClient::new(dir.path().join("nope.yml"));
        let err = client.compose_up(&["zookeeper"], &BTreeMap::new()).await;
        assert!(matches!(err, Err(ClusterError::ComposeFileMissing { .. })));
    }

    #[tokio::test]
    async fn empty_service_list_is_a_no_op() {
        let dir = TempDir::new().expect("tempdir");
        let client = DockerClient::new(dir.path().join("nope.yml"));
        // No services, no compose file touched, no error.
        client
            .compose_up(&[], &BTreeMap::new())
            .await
            .expect("no-op");
    }

    #[test]
    fn bundled_compose_defines_the_core_services() {
        for service in [
            "zookeeper:",
            "rabbitmq:",
            "clickhouse:",
            "grid-java-coordinator:",
            "grid-java-api:",
            "grid-java-observer:",
            "grafana:",
            "webconsole:",
        ] {
            assert!(
                EMBEDDED_COMPOSE.contains(service),
                "missing service {service}"
            );
        }
    }
}
