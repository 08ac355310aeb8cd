//! Load status.

use std::io::Write;

use serde::Serialize;
use tracing::debug;

use browserup_console::ConsoleClient;
use browserup_cluster::validate_cluster_version;
use browserup_secrets::{CredentialField, CredentialOverrides, CredentialsRepository};

use crate::cli::StatusArgs;
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay};

/// Handler for `load status`.
pub struct StatusCommand;

/// Status response.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Runs currently active on the cluster.
    pub active_run_ids: Vec<u64>,
    /// The run being asked about, when one is known.
    pub run_id: Option<u64>,
    /// Whether that run is active.
    pub run_active: Option<bool>,
}

impl StatusCommand {
    /// Reports whether the requested (or last started) run is active.
    ///
    /// # Errors
    ///
    /// Credential resolution failures and console failures.
    pub async fn execute<W: Write>(
        out: &mut W,
        format: &OutputFormat,
        args: &StatusArgs,
        repository: &CredentialsRepository,
    ) -> Result<(), CliError> {
        debug!("running status");
        let credentials = repository.credentials(
            &CredentialOverrides::default(),
            &[CredentialField::ClusterUrl, CredentialField::ApiToken],
        )?;
        validate_cluster_version(&credentials)?;

        let client = ConsoleClient::new(
            credentials.cluster_url.as_deref().unwrap_or(""),
            credentials.api_token.clone().unwrap_or_default(),
        )?;
        let active_run_ids = client.active_run_ids(None).await?;

        let run_id = args
            .run_id
            .or_else(|| repository.last_run_id().and_then(|id| id.parse().ok()));
        let run_active = run_id.map(|id| active_run_ids.contains(&id));

        let response = StatusResponse {
            active_run_ids,
            run_id,
            run_active,
        };
        format.write(out, &response)?;
        debug!("status completed successfully");
        Ok(())
    }
}

impl TableDisplay for StatusResponse {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.active_run_ids.is_empty() {
            writeln!(writer, "No active runs.")?;
        } else {
            let ids: Vec<String> = self.active_run_ids.iter().map(u64::to_string).collect();
            writeln!(writer, "Active runs: {}", ids.join(", "))?;
        }
        match (self.run_id, self.run_active) {
            (Some(run_id), Some(true)) => writeln!(writer, "Run {run_id} is active")?,
            (Some(run_id), _) => writeln!(writer, "Run {run_id} is not active")?,
            (None, _) => {
                writeln!(writer, "No run id passed, and no run has been started here.")?;
            }
        }
        Ok(())
    }
}
