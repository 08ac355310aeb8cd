//! SLA report execution and upload.

use std::fs;
use std::path::Path;

use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, info};

use browserup_scenario::Report;

use crate::client::ConsoleClient;
use crate::error::{ConsoleError, Result};

/// Reports the console can always produce, regardless of what the config
/// defines.
pub const SYSTEM_REPORTS: &[&str] = &[
    "bandwidth",
    "connections",
    "errors",
    "hits",
    "profiles",
    "steps",
    "summary",
    "system",
    "urls",
    "browser",
    "websockets",
];

/// Response header carrying the SLA verdict for a rendered report.
const CHECKS_PASSED_HEADER: &str = "browserup-report-checks-passed";

/// Outcome of running one report.
#[derive(Debug, Clone)]
pub struct ReportResult {
    /// Report name.
    pub name: String,
    /// Whether every SLA check in the report passed.
    pub passed: bool,
    /// The rendered standalone report HTML.
    pub html: String,
}

impl ConsoleClient {
    /// Renders a report for a run and reads its SLA verdict, optionally
    /// saving the HTML under `output_dir`.
    ///
    /// # Errors
    ///
    /// Transport and unexpected-response failures; an unwritable output
    /// directory.
    pub async fn run_report(
        &self,
        name: &str,
        run_id: u64,
        output_dir: Option<&Path>,
    ) -> Result<ReportResult> {
        info!(report = name, run_id, "running report");
        let url = self.url_for(&format!("load/reports/studio/{name}"))?;
        let response = self
            .http()
            .get(url.clone())
            .query(&[
                ("api_token", self.api_token()),
                ("run", &run_id.to_string()),
                ("standalone", "true"),
            ])
            .header(reqwest::header::ACCEPT, "text/html")
            .send()
            .await
            .map_err(|source| {
                if source.is_connect() {
                    ConsoleError::Unreachable {
                        url: url.to_string(),
                    }
                } else {
                    ConsoleError::Transport { source }
                }
            })?;

        if response.status() != StatusCode::OK {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ConsoleError::UnexpectedResponse { status, body });
        }

        let passed = response
            .headers()
            .get(CHECKS_PASSED_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| !v.is_empty() && v != "false");
        let html = response
            .text()
            .await
            .map_err(|source| ConsoleError::Transport { source })?;

        if let Some(dir) = output_dir {
            fs::create_dir_all(dir)?;
            let out_file = dir.join(format!("{name}.html"));
            debug!(file = %out_file.display(), "saving report");
            fs::write(out_file, &html)?;
        }

        Ok(ReportResult {
            name: name.to_string(),
            passed,
            html,
        })
    }

    /// Creates or updates one named SLA report definition on the console.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Upload`] tagged `report` on failure.
    pub async fn create_or_update_report(&self, report: &Report) -> Result<()> {
        info!(report = %report.name, "create/update report");
        let result: Result<()> = async {
            let definition = serde_json::to_value(&report.definition)?;
            let body = json!({
                "report": {
                    "name": report.name,
                    "definition": definition,
                }
            });
            self.send_request(
                crate::client::RequestSpec::new(reqwest::Method::POST, "load/reports/studio")
                    .json(body),
            )
            .await?;
            Ok(())
        }
        .await;

        result.map_err(|source| ConsoleError::upload("report", source))
    }
}
