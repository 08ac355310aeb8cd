//! Cluster deploy.

use tracing::info;

use browserup_cluster::secrets_provider::GRAFANA_PORT;
use browserup_cluster::{ClusterParams, ClusterPilot};
use browserup_secrets::{ClusterCredentials, CredentialOverrides, CredentialsRepository};

use crate::cli::DeployArgs;
use crate::commands::deploy_options;
use crate::error::CliError;

/// Handler for `cluster deploy`.
pub struct DeployCommand;

impl DeployCommand {
    /// Deploys a cluster and returns its persisted credentials.
    ///
    /// # Errors
    ///
    /// Fails when saved credentials already point at a cluster, parameters
    /// are invalid, or the pilot fails.
    pub async fn execute(
        args: &DeployArgs,
        repository: &mut CredentialsRepository,
    ) -> Result<ClusterCredentials, CliError> {
        check_cluster_already_exists(repository)?;

        let params = ClusterParams::build(&deploy_options(args))?;
        info!("deploying {} cluster", params.cluster_type());

        let pilot = ClusterPilot::for_params(&params);
        let credentials = pilot.create_cluster(&params, repository).await?;

        if let Some(host) = credentials.cluster_host() {
            info!("logs are available at: http://{host}:{GRAFANA_PORT}");
        }
        info!(
            "deploy cluster completed successfully, webconsole URL: {}",
            credentials.cluster_url.as_deref().unwrap_or("")
        );
        Ok(credentials)
    }
}

fn check_cluster_already_exists(repository: &CredentialsRepository) -> Result<(), CliError> {
    let credentials = repository.credentials(&CredentialOverrides::default(), &[])?;
    match credentials.cluster_url {
        Some(url) => Err(CliError::ClusterAlreadyExists { url }),
        None => Ok(()),
    }
}
