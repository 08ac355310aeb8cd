//! Load start: upload artifacts and scenario, start a run.

use tracing::{debug, info, warn};

use browserup_console::ConsoleClient;
use browserup_cluster::validate_cluster_version;
use browserup_scenario::{prepare_scenario_payload, LoadConfig};
use browserup_secrets::{
    ClusterCredentials, CredentialField, CredentialOverrides, CredentialsRepository,
};

use crate::cli::{DestroyArgs, StartArgs};
use crate::commands::{DeployCommand, DestroyCommand};
use crate::error::CliError;

/// Handler for `load start`.
pub struct StartCommand;

impl StartCommand {
    /// Uploads the scenario (artifacts first, content-addressed) and
    /// starts a run, persisting the run id as the last run.
    ///
    /// # Errors
    ///
    /// Config, credential, upload, and run-start failures.
    pub async fn execute(
        config_path: &str,
        args: &StartArgs,
        repository: &mut CredentialsRepository,
    ) -> Result<u64, CliError> {
        let mut config = LoadConfig::load(config_path)?;
        info!("starting scenario {}...", config.scenario().name);

        if args.redeploy {
            match DestroyCommand::execute(&DestroyArgs::default(), repository).await {
                Ok(()) => {}
                Err(CliError::InvalidClusterCredentials { .. }) => {
                    warn!("no existing cluster to destroy, continuing");
                }
                Err(e) => return Err(e),
            }
        }

        let credentials = if args.deploy || args.redeploy {
            let mut deploy_args = args.deploy_args.clone();
            if deploy_args.cluster_type.is_none() {
                deploy_args.cluster_type = config.cluster_type().map(str::to_owned);
            }
            DeployCommand::execute(&deploy_args, repository).await?
        } else {
            debug!("deploying disabled, skipping deploy");
            repository.credentials(
                &CredentialOverrides::default(),
                &[CredentialField::ApiToken, CredentialField::ClusterUrl],
            )?
        };
        validate_cluster_version(&credentials)?;

        let run_id = upload_and_run(&credentials, &mut config).await?;

        repository.set_last_run_id(&run_id.to_string())?;
        info!("SUCCESS: started run ID: {run_id}");
        info!(
            "webconsole URL: {}",
            credentials.cluster_url.as_deref().unwrap_or("")
        );
        Ok(run_id)
    }
}

async fn upload_and_run(
    credentials: &ClusterCredentials,
    config: &mut LoadConfig,
) -> Result<u64, CliError> {
    let client = ConsoleClient::new(
        credentials.cluster_url.as_deref().unwrap_or(""),
        credentials.api_token.clone().unwrap_or_default(),
    )?;

    debug!("uploading scenario: {}", config.scenario().name);
    client.upload_profile_artifacts(config).await?;
    let payload = prepare_scenario_payload(config)?;
    let remote = client.create_or_update_scenario(&payload).await?;
    debug!(
        "uploaded scenario \"{}\" successfully, running...",
        remote.name
    );
    Ok(client.start_run(remote.id).await?)
}
