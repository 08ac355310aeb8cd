//! Grafana dashboard provisioning for remote clusters.
//!
//! Dashboard setup is best-effort: a cluster without its dashboards is
//! still a working cluster, so failures here warn and move on rather than
//! failing the deploy.

use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_DASHBOARD: &str = include_str!("../../resources/grafana-default-dashboard.json");
const ZOOKEEPER_DASHBOARD: &str =
    include_str!("../../resources/grafana-zookeeper-dashboard.json");

/// Pushes the standard dashboards into a cluster's grafana.
#[derive(Debug)]
pub struct GrafanaClient {
    base: Option<Url>,
    username: String,
    password: String,
    http: Option<reqwest::Client>,
}

impl GrafanaClient {
    /// A client for the grafana behind `cluster_url` on `port`.
    #[must_use]
    pub fn new(cluster_url: &str, port: &str, username: &str, password: &str) -> Self {
        let base = Url::parse(cluster_url)
            .ok()
            .and_then(|mut url| {
                url.set_port(port.parse().ok()).ok()?;
                Some(url)
            });
        if base.is_none() {
            warn!(cluster_url, "could not build grafana URL; dashboards will be skipped");
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()
            .ok();
        Self {
            base,
            username: username.to_string(),
            password: password.to_string(),
            http,
        }
    }

    /// Installs the default cluster dashboard and marks it as home.
    pub async fn create_default_dashboard(&self) {
        self.create_dashboard(DEFAULT_DASHBOARD, true).await;
    }

    /// Installs the zookeeper dashboard.
    pub async fn create_zookeeper_dashboard(&self) {
        self.create_dashboard(ZOOKEEPER_DASHBOARD, false).await;
    }

    async fn create_dashboard(&self, dashboard_json: &str, make_home: bool) {
        let (Some(base), Some(http)) = (&self.base, &self.http) else {
            return;
        };
        let Ok(url) = base.join("/api/dashboards/db") else {
            return;
        };

        let dashboard: serde_json::Value = match serde_json::from_str(dashboard_json) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "bundled dashboard JSON is malformed");
                return;
            }
        };
        let body = json!({
            "dashboard": dashboard,
            "folderId": 0,
            "message": "",
            "overwrite": true,
        });

        debug!(url = %url, "creating grafana dashboard");
        let response = http
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                debug!("created grafana dashboard");
                if make_home {
                    if let Ok(body) = response.json::<serde_json::Value>().await {
                        if let Some(id) = body["id"].as_u64() {
                            self.set_home_dashboard(id).await;
                        }
                    }
                }
            }
            Ok(response) => {
                warn!(status = %response.status(), "failed to create grafana dashboard");
            }
            Err(e) => {
                warn!(error = %e, "failed to reach grafana");
            }
        }
    }

    async fn set_home_dashboard(&self, dashboard_id: u64) {
        let (Some(base), Some(http)) = (&self.base, &self.http) else {
            return;
        };
        let Ok(url) = base.join("/api/user/preferences") else {
            return;
        };
        let response = http
            .put(url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({ "homeDashboardId": dashboard_id }))
            .send()
            .await;
        match response {
            Ok(response) if response.status().is_success() => {
                debug!("updated default grafana dashboard");
            }
            Ok(response) => {
                warn!(status = %response.status(), "failed to set default grafana dashboard");
            }
            Err(e) => {
                warn!(error = %e, "failed to reach grafana");
            }
        }
    }
}
