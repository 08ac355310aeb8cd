//! Cluster destroy.

use tracing::{debug, info};

use browserup_cluster::{validate_cluster_version, ClusterPilot};
use browserup_secrets::{CredentialField, CredentialOverrides, CredentialsRepository};

use crate::cli::DestroyArgs;
use crate::error::CliError;

/// Handler for `cluster destroy`.
pub struct DestroyCommand;

impl DestroyCommand {
    /// Destroys the cluster the saved (or named) credentials point at,
    /// then clears the secret store.
    ///
    /// When no credentials resolve, this fails with
    /// [`CliError::InvalidClusterCredentials`] without attempting any
    /// network call.
    ///
    /// # Errors
    ///
    /// Credential resolution failures, version skew, and pilot failures.
    pub async fn execute(
        args: &DestroyArgs,
        repository: &mut CredentialsRepository,
    ) -> Result<(), CliError> {
        debug!("running destroy");
        let overrides = CredentialOverrides {
            cluster_name: args.cluster_name.clone(),
            ..Default::default()
        };
        let credentials =
            repository.credentials(&overrides, &[CredentialField::ClusterName])?;
        validate_cluster_version(&credentials)?;

        let pilot = ClusterPilot::for_credentials(&credentials)?;
        info!(
            "destroying {} cluster...",
            credentials
                .cluster_type
                .map(|t| t.to_string())
                .unwrap_or_default()
        );
        pilot
            .destroy_cluster(&credentials, !args.keep_volumes)
            .await?;

        info!("destroyed cluster: {credentials}");
        debug!("clearing secrets");
        repository.clear()?;
        info!("destroy cluster completed successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use browserup_secrets::SecretsStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn destroy_without_credentials_fails_before_any_network_call() {
        let dir = TempDir::new().expect("tempdir");
        let store = SecretsStore::open(dir.path().join("secrets.yaml")).expect("open");
        let mut repository = CredentialsRepository::new(store);

        // An empty store resolves no cluster name, so the command must
        // fail at credential resolution, before any pilot or network work.
        let err = DestroyCommand::execute(&DestroyArgs::default(), &mut repository).await;
        assert!(matches!(
            err,
            Err(CliError::InvalidClusterCredentials { .. })
        ));
    }
}
