//! Cluster upgrade.

use std::cmp::Ordering;

use tracing::{debug, info, warn};

use browserup_cluster::version::compare_releases;
use browserup_cluster::{ClusterError, ClusterPilot, SERVICES_VERSION};
use browserup_secrets::{CredentialField, CredentialOverrides, CredentialsRepository};

use crate::cli::UpgradeArgs;
use crate::error::CliError;

/// Handler for `cluster upgrade`.
pub struct UpgradeCommand;

impl UpgradeCommand {
    /// Upgrades the deployed cluster to this CLI's services version.
    ///
    /// # Errors
    ///
    /// Credential resolution failures, a missing services tag, and pilot
    /// failures.
    pub async fn execute(
        args: &UpgradeArgs,
        repository: &mut CredentialsRepository,
    ) -> Result<(), CliError> {
        debug!("running upgrade");
        let credentials = repository
            .credentials(&CredentialOverrides::default(), &[CredentialField::ClusterName])?;

        let Some(cluster_tag) = credentials.services_image_tag.clone() else {
            return Err(ClusterError::MissingServicesTag.into());
        };

        match compare_releases(&cluster_tag, SERVICES_VERSION) {
            None => {
                warn!(
                    "cluster services tag \"{cluster_tag}\" is not a release tag, nothing to upgrade"
                );
                return Ok(());
            }
            Some(Ordering::Equal) => {
                warn!("CLI and cluster have the same services version, nothing to upgrade");
                return Ok(());
            }
            Some(Ordering::Greater) => {
                warn!("CLI is older than cluster, cannot upgrade");
                return Ok(());
            }
            Some(Ordering::Less) => {}
        }

        debug!("upgrading {cluster_tag} -> {SERVICES_VERSION}");
        let pilot = ClusterPilot::for_credentials(&credentials)?;
        pilot
            .upgrade_cluster(&credentials, repository, args.skip_confirmation)
            .await?;

        let mut upgraded = credentials;
        upgraded.services_image_tag = Some(SERVICES_VERSION.to_string());
        repository.save(&upgraded)?;
        info!(
            "upgraded cluster to \"{SERVICES_VERSION}\" successfully, webconsole URL: {}",
            upgraded.cluster_url.as_deref().unwrap_or("")
        );
        Ok(())
    }
}
