//! Run lifecycle: start, stop, list active.

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::client::{ConsoleClient, RequestSpec};
use crate::error::{ConsoleError, Result};

#[derive(Debug, Deserialize)]
struct RunBody {
    id: u64,
}

impl ConsoleClient {
    /// Ids of runs currently active on the cluster, optionally filtered by
    /// scenario name.
    ///
    /// # Errors
    ///
    /// Maps a 401 to [`ConsoleError::Unauthorized`]; other failures pass
    /// through.
    pub async fn active_run_ids(&self, scenario_name: Option<&str>) -> Result<Vec<u64>> {
        debug!(scenario = ?scenario_name, "loading active run ids");
        let mut spec = RequestSpec::new(Method::GET, "load/runs")
            .query("active", "true")
            .expect(&[StatusCode::OK, StatusCode::UNAUTHORIZED]);
        if let Some(name) = scenario_name {
            spec = spec.query("scenario_name", name);
        }

        let response = self.send_request(spec).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ConsoleError::Unauthorized);
        }
        let run_ids: Vec<u64> = serde_json::from_slice(
            &response
                .bytes()
                .await
                .map_err(|source| ConsoleError::Transport { source })?,
        )?;
        debug!(?run_ids, "active run ids");
        Ok(run_ids)
    }

    /// Starts a run of an uploaded scenario, returning the new run id.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::StartRun`] wrapping the underlying failure.
    pub async fn start_run(&self, scenario_id: u64) -> Result<u64> {
        debug!(scenario_id, "starting run");
        let result: Result<u64> = async {
            let url = self.url_for("load/runs")?;
            let response = self
                .http()
                .post(url.clone())
                .query(&[("api_token", self.api_token())])
                .header("scenario_id", scenario_id.to_string())
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(|source| ConsoleError::Transport { source })?;

            if response.status() != StatusCode::OK {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(ConsoleError::UnexpectedResponse { status, body });
            }
            let run: RunBody = response.json().await.map_err(|source| {
                ConsoleError::Transport { source }
            })?;
            Ok(run.id)
        }
        .await;

        result.map_err(|source| ConsoleError::StartRun {
            source: Box::new(source),
        })
    }

    /// Requests a stop of the given run.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::RunNotFound`] when no run matches the id,
    /// and [`ConsoleError::StopRun`] wrapping any other failure.
    pub async fn stop_run(&self, run_id: u64) -> Result<()> {
        debug!(run_id, "sending stop run request");
        let response = self
            .send_request(
                RequestSpec::new(Method::PATCH, &format!("load/runs/{run_id}")).expect(&[
                    StatusCode::OK,
                    StatusCode::ACCEPTED,
                    StatusCode::NO_CONTENT,
                    StatusCode::NOT_FOUND,
                ]),
            )
            .await
            .map_err(|source| ConsoleError::StopRun {
                run_id,
                source: Box::new(source),
            })?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ConsoleError::RunNotFound { run_id });
        }
        debug!(run_id, "stop request accepted");
        Ok(())
    }

    /// Stops each of the given runs in order.
    ///
    /// # Errors
    ///
    /// Fails on the first run that cannot be stopped.
    pub async fn stop_runs(&self, run_ids: &[u64]) -> Result<()> {
        if run_ids.is_empty() {
            debug!("nothing to stop");
            return Ok(());
        }
        for run_id in run_ids {
            self.stop_run(*run_id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> String {
        "t".repeat(20)
    }

    #[tokio::test]
    async fn active_run_ids_parses_id_list() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/load/runs")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("active".into(), "true".into()),
                mockito::Matcher::UrlEncoded("api_token".into(), token()),
            ]))
            .with_status(200)
            .with_body("[3, 7, 12]")
            .create_async()
            .await;

        let client = ConsoleClient::new(&server.url(), token()).expect("client");
        let run_ids = client.active_run_ids(None).await.expect("run ids");
        assert_eq!(run_ids, vec![3, 7, 12]);
    }

    #[tokio::test]
    async fn active_run_ids_maps_401_to_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/load/runs")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let client = ConsoleClient::new(&server.url(), token()).expect("client");
        let err = client.active_run_ids(None).await;
        assert!(matches!(err, Err(ConsoleError::Unauthorized)));
    }

    #[tokio::test]
    async fn start_run_returns_assigned_id() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/load/runs")
            .match_query(mockito::Matcher::Any)
            .match_header("scenario_id", "42")
            .with_status(200)
            .with_body(r#"{"id": 99, "status": "pending"}"#)
            .create_async()
            .await;

        let client = ConsoleClient::new(&server.url(), token()).expect("client");
        let run_id = client.start_run(42).await.expect("run id");
        assert_eq!(run_id, 99);
    }

    #[tokio::test]
    async fn stop_runs_patches_each_run() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("PATCH", "/load/runs/5")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("PATCH", "/load/runs/6")
            .match_query(mockito::Matcher::Any)
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let client = ConsoleClient::new(&server.url(), token()).expect("client");
        client.stop_runs(&[5, 6]).await.expect("stop runs");
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn stop_run_maps_404_to_run_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("PATCH", "/load/runs/41")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let client = ConsoleClient::new(&server.url(), token()).expect("client");
        let err = client.stop_run(41).await;
        assert!(matches!(
            err,
            Err(ConsoleError::RunNotFound { run_id: 41 })
        ));
    }

    #[tokio::test]
    async fn stop_run_wraps_failures() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("PATCH", "/load/runs/8")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let client = ConsoleClient::new(&server.url(), token()).expect("client");
        let err = client.stop_run(8).await;
        assert!(matches!(
            err,
            Err(ConsoleError::StopRun { run_id: 8, .. })
        ));
    }
}
