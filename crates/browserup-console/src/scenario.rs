//! Scenario create-or-update.

use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, info};

use browserup_scenario::ScenarioPayload;

use crate::client::{ConsoleClient, RequestSpec};
use crate::error::{ConsoleError, Result};

/// The console's record of an uploaded scenario.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteScenario {
    /// Console-assigned scenario id.
    pub id: u64,
    /// Scenario name.
    pub name: String,
}

impl ConsoleClient {
    /// Creates the scenario on the console, or updates it in place when a
    /// scenario of the same name already exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Upload`] tagged `scenario`, wrapping the
    /// underlying failure.
    pub async fn create_or_update_scenario(
        &self,
        payload: &ScenarioPayload,
    ) -> Result<RemoteScenario> {
        info!(scenario = %payload.scenario.name, "create/update scenario");
        let result: Result<RemoteScenario> = async {
            let body = serde_json::to_value(payload)?;
            let response = self
                .send_request(
                    RequestSpec::new(Method::POST, "load/cli_scenarios/create_or_update")
                        .json(body),
                )
                .await?;
            let remote: RemoteScenario = serde_json::from_slice(
                &response
                    .bytes()
                    .await
                    .map_err(|source| ConsoleError::Transport { source })?,
            )?;
            Ok(remote)
        }
        .await;

        let remote = result.map_err(|source| ConsoleError::upload("scenario", source))?;
        debug!(scenario_id = remote.id, "scenario upload completed");
        Ok(remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use browserup_scenario::LoadConfig;
    use std::fs;
    use tempfile::TempDir;

    fn sample_payload() -> ScenarioPayload {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("browserup.load.yaml");
        fs::write(
            &path,
            r"
scenario:
  name: smoke
  total_users: 2
  stop_after: 10m
  profiles:
    - name: P
      artifact_dir: .
",
        )
        .expect("write config");
        let config = LoadConfig::load(&path).expect("load");
        browserup_scenario::prepare_scenario_payload(&config).expect("payload")
    }

    #[tokio::test]
    async fn uploads_and_returns_remote_scenario() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/load/cli_scenarios/create_or_update")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id": 17, "name": "smoke"}"#)
            .create_async()
            .await;

        let client = ConsoleClient::new(&server.url(), "t".repeat(20)).expect("client");
        let remote = client
            .create_or_update_scenario(&sample_payload())
            .await
            .expect("remote scenario");
        assert_eq!(remote.id, 17);
        assert_eq!(remote.name, "smoke");
    }

    #[tokio::test]
    async fn failure_is_tagged_as_scenario_upload() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/load/cli_scenarios/create_or_update")
            .match_query(mockito::Matcher::Any)
            .with_status(422)
            .with_body("unprocessable")
            .create_async()
            .await;

        let client = ConsoleClient::new(&server.url(), "t".repeat(20)).expect("client");
        let err = client.create_or_update_scenario(&sample_payload()).await;
        match err {
            Err(ConsoleError::Upload { what, source }) => {
                assert_eq!(what, "scenario");
                assert!(matches!(
                    *source,
                    ConsoleError::UnexpectedResponse { status: 422, .. }
                ));
            }
            other => panic!("expected upload error, got {other:?}"),
        }
    }
}
