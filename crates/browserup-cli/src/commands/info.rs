//! Cluster info.

use std::io::Write;

use serde::Serialize;
use tracing::debug;

use browserup_cluster::compose::DockerClient;
use browserup_cluster::validate_cluster_version;
use browserup_secrets::{CredentialField, CredentialOverrides, CredentialsRepository};

use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay};

const NO_OVERRIDE: &str = "(not overridden, version built into services images)";

/// Handler for `cluster info`.
pub struct InfoCommand;

/// Saved cluster details, with the API token left out.
#[derive(Debug, Clone, Serialize)]
pub struct InfoResponse {
    /// Cluster name.
    pub cluster_name: String,
    /// Web console URL.
    pub cluster_url: String,
    /// Local or AWS.
    pub cluster_type: String,
    /// AWS region, when remote.
    pub region: Option<String>,
    /// Deployed services image tag.
    pub services_image_tag: String,
    /// Standard image override, or a note that none is set.
    pub standard_image_tag: String,
    /// Local docker availability.
    pub docker: String,
}

impl InfoCommand {
    /// Prints the saved cluster credentials (token redacted) and the local
    /// docker status.
    ///
    /// # Errors
    ///
    /// Credential resolution failures and version skew.
    pub async fn execute<W: Write>(
        out: &mut W,
        format: &OutputFormat,
        repository: &CredentialsRepository,
    ) -> Result<(), CliError> {
        debug!("running info");
        let credentials = repository.credentials(
            &CredentialOverrides::default(),
            &[CredentialField::ClusterUrl, CredentialField::ApiToken],
        )?;

        let docker = match DockerClient::check_docker_available().await {
            Ok(()) => "available".to_string(),
            Err(e) => format!("unavailable ({e})"),
        };

        let response = InfoResponse {
            cluster_name: credentials.cluster_name.clone().unwrap_or_default(),
            cluster_url: credentials.cluster_url.clone().unwrap_or_default(),
            cluster_type: credentials
                .cluster_type
                .map(|t| t.to_string())
                .unwrap_or_default(),
            region: credentials.region.clone(),
            services_image_tag: credentials.services_image_tag.clone().unwrap_or_default(),
            standard_image_tag: credentials
                .standard_image_tag
                .clone()
                .unwrap_or_else(|| NO_OVERRIDE.to_string()),
            docker,
        };
        format.write(out, &response)?;

        validate_cluster_version(&credentials)?;
        debug!("info completed successfully");
        Ok(())
    }
}

impl TableDisplay for InfoResponse {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Cluster")?;
        writeln!(writer, "  Name:                {}", self.cluster_name)?;
        writeln!(writer, "  URL:                 {}", self.cluster_url)?;
        writeln!(writer, "  Type:                {}", self.cluster_type)?;
        if let Some(region) = &self.region {
            writeln!(writer, "  Region:              {region}")?;
        }
        writeln!(writer, "  Services image tag:  {}", self.services_image_tag)?;
        writeln!(writer, "  Standard image tag:  {}", self.standard_image_tag)?;
        writeln!(writer)?;
        writeln!(writer, "Local Docker: {}", self.docker)?;
        Ok(())
    }
}
