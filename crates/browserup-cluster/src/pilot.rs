//! Pilot selection and common lifecycle entry points.
//!
//! The pilot variant is chosen once, from typed parameters or saved
//! credentials, and every lifecycle call dispatches on that tag.

use tracing::debug;

use browserup_secrets::{ClusterCredentials, ClusterType, CredentialsRepository};

use crate::aws::AwsClusterPilot;
use crate::error::{ClusterError, Result};
use crate::local::LocalClusterPilot;
use crate::name::generate_cluster_name;
use crate::params::ClusterParams;

/// A cluster pilot, tagged by where the cluster runs.
#[derive(Debug)]
pub enum ClusterPilot {
    /// Docker compose on this machine.
    Local(LocalClusterPilot),
    /// Cloud stacks in an AWS region.
    Aws(AwsClusterPilot),
}

impl ClusterPilot {
    /// Selects the pilot for a deployment intent.
    #[must_use]
    pub fn for_params(params: &ClusterParams) -> Self {
        match params {
            ClusterParams::Local(_) => Self::Local(LocalClusterPilot::new()),
            ClusterParams::Aws(remote) => Self::Aws(AwsClusterPilot::new(&remote.region)),
        }
    }

    /// Selects the pilot for previously saved credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::InvalidParams`] when the credentials carry
    /// no cluster type, or an AWS cluster carries no region.
    pub fn for_credentials(credentials: &ClusterCredentials) -> Result<Self> {
        match credentials.cluster_type {
            Some(ClusterType::Local) => Ok(Self::Local(LocalClusterPilot::new())),
            Some(ClusterType::Aws) => {
                let region =
                    credentials
                        .region
                        .as_deref()
                        .ok_or_else(|| ClusterError::InvalidParams {
                            reason: "saved AWS credentials carry no region".to_string(),
                        })?;
                Ok(Self::Aws(AwsClusterPilot::new(region)))
            }
            None => Err(ClusterError::InvalidParams {
                reason: "saved credentials carry no cluster type".to_string(),
            }),
        }
    }

    /// Creates the cluster described by `params`, generating its name,
    /// and returns the persisted credentials.
    ///
    /// # Errors
    ///
    /// Propagates the underlying pilot's failures.
    pub async fn create_cluster(
        &self,
        params: &ClusterParams,
        repository: &mut CredentialsRepository,
    ) -> Result<ClusterCredentials> {
        let cluster_name = generate_cluster_name(params.cluster_type());
        debug!(cluster = %cluster_name, "creating cluster");
        match (self, params) {
            (Self::Local(pilot), ClusterParams::Local(local)) => {
                pilot.create_cluster(local, repository).await
            }
            (Self::Aws(pilot), ClusterParams::Aws(remote)) => {
                pilot.create_cluster(remote, &cluster_name, repository).await
            }
            _ => Err(ClusterError::InvalidParams {
                reason: "pilot and params disagree on cluster type".to_string(),
            }),
        }
    }

    /// Destroys the cluster the credentials point at. For local clusters
    /// `remove_volumes` also deletes data volumes.
    ///
    /// # Errors
    ///
    /// Propagates the underlying pilot's failures.
    pub async fn destroy_cluster(
        &self,
        credentials: &ClusterCredentials,
        remove_volumes: bool,
    ) -> Result<()> {
        match self {
            Self::Local(pilot) => pilot.destroy_cluster(remove_volumes).await,
            Self::Aws(pilot) => {
                let cluster_name = credentials.cluster_name.as_deref().ok_or_else(|| {
                    ClusterError::InvalidParams {
                        reason: "cannot destroy a remote cluster without its name".to_string(),
                    }
                })?;
                pilot.destroy_cluster(cluster_name).await
            }
        }
    }

    /// Upgrades the cluster to the CLI's services version.
    ///
    /// # Errors
    ///
    /// Propagates the underlying pilot's failures.
    pub async fn upgrade_cluster(
        &self,
        credentials: &ClusterCredentials,
        repository: &mut CredentialsRepository,
        bypass_confirmation: bool,
    ) -> Result<()> {
        match self {
            Self::Local(pilot) => {
                pilot.upgrade_cluster(credentials, repository).await?;
                Ok(())
            }
            Self::Aws(pilot) => pilot.upgrade_cluster(credentials, bypass_confirmation).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use browserup_secrets::CredentialParts;
    use crate::params::DeployOptions;

    #[test]
    fn pilot_follows_params_type() {
        let local = ClusterParams::build(&DeployOptions::default()).expect("params");
        assert!(matches!(
            ClusterPilot::for_params(&local),
            ClusterPilot::Local(_)
        ));

        let aws = ClusterParams::build(&DeployOptions {
            cluster_type: Some("aws".to_string()),
            ..Default::default()
        })
        .expect("params");
        assert!(matches!(ClusterPilot::for_params(&aws), ClusterPilot::Aws(_)));
    }

    #[test]
    fn aws_credentials_without_region_are_rejected() {
        let credentials = ClusterCredentials::new(
            CredentialParts {
                cluster_type: Some("aws".to_string()),
                cluster_name: Some("BrowserUp-abc".to_string()),
                ..Default::default()
            },
            &[],
        )
        .expect("credentials");
        assert!(matches!(
            ClusterPilot::for_credentials(&credentials),
            Err(ClusterError::InvalidParams { .. })
        ));
    }

    #[test]
    fn local_credentials_select_the_local_pilot() {
        let credentials = ClusterCredentials::new(
            CredentialParts {
                cluster_type: Some("local".to_string()),
                ..Default::default()
            },
            &[],
        )
        .expect("credentials");
        assert!(matches!(
            ClusterPilot::for_credentials(&credentials).expect("pilot"),
            ClusterPilot::Local(_)
        ));
    }
}
