//! Load stop.

use tracing::{debug, info};

use browserup_console::ConsoleClient;
use browserup_cluster::validate_cluster_version;
use browserup_secrets::{CredentialField, CredentialOverrides, CredentialsRepository};

use crate::cli::{DestroyArgs, StopArgs};
use crate::commands::DestroyCommand;
use crate::error::CliError;

/// Handler for `load stop`.
pub struct StopCommand;

impl StopCommand {
    /// Stops the given run, or every active run, optionally destroying the
    /// cluster afterwards.
    ///
    /// # Errors
    ///
    /// Credential resolution failures and console failures.
    pub async fn execute(
        args: &StopArgs,
        repository: &mut CredentialsRepository,
    ) -> Result<(), CliError> {
        debug!("running stop");
        let credentials = repository.credentials(
            &CredentialOverrides::default(),
            &[CredentialField::ClusterUrl, CredentialField::ApiToken],
        )?;
        validate_cluster_version(&credentials)?;

        let client = ConsoleClient::new(
            credentials.cluster_url.as_deref().unwrap_or(""),
            credentials.api_token.clone().unwrap_or_default(),
        )?;

        let run_ids = match args.run_id {
            Some(run_id) => {
                info!("stopping run by filter: run ID = {run_id}");
                vec![run_id]
            }
            None => {
                info!("stopping all available user runs");
                client.active_run_ids(None).await?
            }
        };
        debug!(?run_ids, "run IDs to stop");
        client.stop_runs(&run_ids).await?;

        if run_ids.is_empty() {
            info!("no active runs found, nothing to stop");
        } else {
            info!("SUCCESS: stopped scenario. Remote run IDs stopped: {run_ids:?}");
        }

        if args.destroy {
            DestroyCommand::execute(&DestroyArgs::default(), repository).await?;
        }
        debug!("stop completed successfully");
        Ok(())
    }
}
