//! Load reports: run SLA reports against the last run.

use std::path::Path;
use std::process::ExitCode;

use tracing::{debug, info};

use browserup_console::{ConsoleClient, SYSTEM_REPORTS};
use browserup_cluster::validate_cluster_version;
use browserup_scenario::{LoadConfig, Report};
use browserup_secrets::{CredentialField, CredentialOverrides, CredentialsRepository};

use crate::cli::ReportsArgs;
use crate::error::CliError;

/// Handler for `load reports`.
pub struct ReportsCommand;

impl ReportsCommand {
    /// Uploads the config's report definitions, runs the selected reports
    /// against the last run, and reports the overall SLA verdict through
    /// the exit code: failure when any check fails.
    ///
    /// # Errors
    ///
    /// Config, credential, and console failures; a missing last run id.
    pub async fn execute(
        config_path: &str,
        args: &ReportsArgs,
        repository: &CredentialsRepository,
    ) -> Result<ExitCode, CliError> {
        debug!("running reports");
        let config = LoadConfig::load(config_path)?;
        if config.reports().is_empty() {
            return Err(CliError::NoReportsDefined);
        }
        let report_names = select_report_names(config.reports(), args.name.as_deref());

        let credentials = repository.credentials(
            &CredentialOverrides::default(),
            &[CredentialField::ApiToken, CredentialField::ClusterUrl],
        )?;
        validate_cluster_version(&credentials)?;

        let run_id: u64 = repository
            .last_run_id()
            .and_then(|id| id.parse().ok())
            .ok_or(CliError::NoLastRunId)?;

        let client = ConsoleClient::new(
            credentials.cluster_url.as_deref().unwrap_or(""),
            credentials.api_token.clone().unwrap_or_default(),
        )?;

        for report in config.reports() {
            client.create_or_update_report(report).await?;
        }

        let output_dir = args.output.as_deref().map(Path::new);
        let mut overall_passed = true;
        for name in &report_names {
            let result = client.run_report(name, run_id, output_dir).await?;
            info!(
                "report {name}: {}",
                if result.passed { "passed" } else { "failed" }
            );
            overall_passed &= result.passed;
        }

        info!(
            "overall reports SLA result: {}",
            if overall_passed { "passed" } else { "failed" }
        );
        Ok(if overall_passed {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }
}

/// Which reports to run: a single named one, the built-in system set, or
/// (by default) the config's reports plus the system set.
fn select_report_names(config_reports: &[Report], name: Option<&str>) -> Vec<String> {
    match name {
        Some("system") => SYSTEM_REPORTS.iter().map(|n| (*n).to_string()).collect(),
        None | Some("all") => {
            let mut names: Vec<String> =
                config_reports.iter().map(|r| r.name.clone()).collect();
            names.extend(SYSTEM_REPORTS.iter().map(|n| (*n).to_string()));
            names
        }
        Some(other) => vec![other.to_string()],
    }
}
