//! Load upload-scenario: push the definition without starting a run.

use tracing::{debug, info};

use browserup_console::ConsoleClient;
use browserup_cluster::validate_cluster_version;
use browserup_scenario::{prepare_scenario_payload, LoadConfig};
use browserup_secrets::{CredentialField, CredentialOverrides, CredentialsRepository};

use crate::error::CliError;

/// Handler for `load upload-scenario`.
pub struct UploadScenarioCommand;

impl UploadScenarioCommand {
    /// Uploads profile artifacts and the scenario definition, without
    /// starting a run.
    ///
    /// # Errors
    ///
    /// Config, credential, and upload failures.
    pub async fn execute(
        config_path: &str,
        repository: &CredentialsRepository,
    ) -> Result<(), CliError> {
        debug!("running upload scenario");
        let mut config = LoadConfig::load(config_path)?;

        let credentials = repository.credentials(
            &CredentialOverrides::default(),
            &[CredentialField::ClusterUrl, CredentialField::ApiToken],
        )?;
        validate_cluster_version(&credentials)?;

        let client = ConsoleClient::new(
            credentials.cluster_url.as_deref().unwrap_or(""),
            credentials.api_token.clone().unwrap_or_default(),
        )?;
        client.upload_profile_artifacts(&mut config).await?;
        let payload = prepare_scenario_payload(&config)?;
        let remote = client.create_or_update_scenario(&payload).await?;

        info!(
            "uploaded scenario \"{}\" successfully (remote id {})",
            remote.name, remote.id
        );
        Ok(())
    }
}
