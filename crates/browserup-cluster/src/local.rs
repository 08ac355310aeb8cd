//! The local cluster pilot: docker compose lifecycle.

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use browserup_console::ConsoleClient;
use browserup_secrets::{
    ClusterCredentials, ClusterType, CredentialParts, CredentialsRepository,
};

use crate::compose::DockerClient;
use crate::error::{ClusterError, Result};
use crate::name::generate_cluster_name;
use crate::params::LocalClusterParams;
use crate::secrets_provider::{
    cluster_secrets, RABBITMQ_PORT, WEBCONSOLE_PORT, ZOOKEEPER_PORT,
};
use crate::version::SERVICES_VERSION;

/// Env flag: run without the bundled web console (a developer is serving
/// their own) and skip the health wait.
const DEBUG_WEBCONSOLE_ENV: &str = "DEBUG_WEBCONSOLE";

/// Minion/coordinator debug env vars passed through to compose when set.
const DEBUG_PASSTHROUGH_ENVS: &[&str] = &[
    "BROWSERUP_MINION_DEBUG",
    "BROWSERUP_MINION_DEBUG_PORT",
    "BROWSERUP_MINION_DEBUG_SUSPEND",
    "BROWSERUP_GRID_COORDINATOR_DEBUG",
    "BROWSERUP_GRID_COORDINATOR_DEBUG_PORT",
];

const PORT_PROBE_TIMEOUT: Duration = Duration::from_millis(250);

/// Orchestrates local cluster create / destroy / upgrade over docker
/// compose.
///
/// There is no automatic rollback on a partial local deployment; the
/// remediation is re-running deploy, which is idempotent at the compose
/// level. Credentials are saved before the cluster is healthy on purpose,
/// so a partial failure still leaves discoverable state for `destroy`.
#[derive(Debug, Default)]
pub struct LocalClusterPilot;

impl LocalClusterPilot {
    /// Builds the pilot.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Deploys the local cluster and returns its credentials.
    ///
    /// # Errors
    ///
    /// Fails when a needed port is taken, docker is unavailable, any
    /// compose step fails, or the web console never reports healthy.
    pub async fn create_cluster(
        &self,
        params: &LocalClusterParams,
        repository: &mut CredentialsRepository,
    ) -> Result<ClusterCredentials> {
        check_ports_free(&[
            ("zookeeper", ZOOKEEPER_PORT),
            ("rabbitmq", RABBITMQ_PORT),
            ("webconsole", WEBCONSOLE_PORT),
        ])
        .await?;

        DockerClient::check_docker_available().await?;

        let secrets = cluster_secrets(repository.store_mut())?;
        let webconsole_url = format!(
            "{}://localhost:{}",
            secrets
                .get("WEBCONSOLE_PROTOCOL")
                .map_or("http", String::as_str),
            WEBCONSOLE_PORT
        );
        let cluster_name = generate_cluster_name(ClusterType::Local);

        let credentials = ClusterCredentials::new(
            CredentialParts {
                cluster_url: Some(webconsole_url.clone()),
                cluster_type: Some(ClusterType::Local.as_str().to_string()),
                api_token: Some(params.api_token.clone()),
                cluster_name: Some(cluster_name.clone()),
                services_image_tag: Some(params.services_image_tag().to_string()),
                standard_image_tag: params.standard_image_tag.clone(),
                is_custom_services_image_tag: params.is_custom_services_image_tag(),
                ..Default::default()
            },
            &[],
        )?;
        // Saved before the cluster is healthy so partial failures leave
        // discoverable state.
        repository.save(&credentials)?;

        let debug_webconsole = env_flag(DEBUG_WEBCONSOLE_ENV);
        let services = service_names(debug_webconsole);
        let compose_env = compose_env(params, &cluster_name, &secrets);

        let docker = DockerClient::with_default_compose_file()?;
        if params.use_local_cache {
            debug!("using local docker cache for services images");
        } else {
            docker.compose_pull().await?;
        }

        docker.compose_up(&services, &compose_env).await?;
        info!(
            "logs will be available soon at: http://localhost:{}",
            secrets.get("GRAFANA_PORT").map_or("", String::as_str)
        );

        if debug_webconsole {
            debug!("DEBUG_WEBCONSOLE set, skipping web console health wait");
        } else {
            ConsoleClient::wait_for_ready(&webconsole_url).await?;
        }

        Ok(credentials)
    }

    /// Tears the compose services down.
    ///
    /// # Errors
    ///
    /// Fails when the compose invocation fails.
    pub async fn destroy_cluster(&self, remove_volumes: bool) -> Result<()> {
        let docker = DockerClient::with_default_compose_file()?;
        docker.compose_down(remove_volumes, &BTreeMap::new()).await
    }

    /// Upgrades the local cluster to the CLI's services version: services
    /// down (volumes preserved), fresh images pulled, cluster re-created.
    ///
    /// # Errors
    ///
    /// Fails when any compose step or the re-deploy fails.
    pub async fn upgrade_cluster(
        &self,
        credentials: &ClusterCredentials,
        repository: &mut CredentialsRepository,
    ) -> Result<ClusterCredentials> {
        debug!("shutting down existing cluster's services");
        let docker = DockerClient::with_default_compose_file()?;
        docker.compose_down(false, &BTreeMap::new()).await?;

        debug!(version = SERVICES_VERSION, "pulling new images");
        docker.compose_pull().await?;

        let params = LocalClusterParams {
            api_token: credentials.api_token.clone().unwrap_or_default(),
            services_image_tag: None,
            standard_image_tag: credentials.standard_image_tag.clone(),
            use_local_cache: false,
        };
        self.create_cluster(&params, repository).await
    }
}

/// The ordered service list: backend, middleware, then the web console
/// unless a developer is running their own.
fn service_names(skip_frontend: bool) -> Vec<&'static str> {
    let mut services = vec!["zookeeper", "rabbitmq", "clickhouse", "minio"];
    services.extend([
        "grid-java-coordinator",
        "grid-java-api",
        "grid-java-observer",
        "grafana",
    ]);
    if !skip_frontend {
        services.push("webconsole");
    }
    services
}

/// The merged compose environment: cluster secrets, deployment identity,
/// image tags, and any debug passthrough vars the operator has set.
fn compose_env(
    params: &LocalClusterParams,
    cluster_name: &str,
    secrets: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut env = secrets.clone();
    env.insert(
        "INITIAL_API_TOKEN".to_string(),
        params.api_token.clone(),
    );
    env.insert(
        "BROWSERUP_CLUSTER_NAME".to_string(),
        cluster_name.to_string(),
    );
    env.insert(
        "BROWSERUP_SERVICES_IMAGE_TAG".to_string(),
        params.services_image_tag().to_string(),
    );
    env.insert(
        "BROWSERUP_STANDARD_IMAGE_VERSION_TAG_OVERRIDE".to_string(),
        params.standard_image_tag.clone().unwrap_or_default(),
    );
    for name in DEBUG_PASSTHROUGH_ENVS {
        if let Ok(value) = env::var(name) {
            env.insert((*name).to_string(), value);
        }
    }
    env
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Fails when any of the given ports already has a listener.
async fn check_ports_free(services: &[(&str, u16)]) -> Result<()> {
    let mut conflicts = Vec::new();
    for (service, port) in services {
        let probe = timeout(
            PORT_PROBE_TIMEOUT,
            TcpStream::connect(("127.0.0.1", *port)),
        )
        .await;
        if matches!(probe, Ok(Ok(_))) {
            conflicts.push(format!("{port} ({service})"));
        }
    }
    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(ClusterError::PortsInUse { conflicts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use browserup_secrets::API_TOKEN_SIZE;

    fn params() -> LocalClusterParams {
        LocalClusterParams {
            api_token: "a".repeat(API_TOKEN_SIZE),
            services_image_tag: None,
            standard_image_tag: Some("release-2.0.0".to_string()),
            use_local_cache: false,
        }
    }

    #[test]
    fn service_list_includes_webconsole_by_default() {
        let services = service_names(false);
        assert!(services.contains(&"webconsole"));
        assert!(services.contains(&"zookeeper"));
        // Backend services come before middleware, frontend is last.
        assert_eq!(services.last(), Some(&"webconsole"));
    }

    #[test]
    fn debug_mode_drops_webconsole_from_service_list() {
        let services = service_names(true);
        assert!(!services.contains(&"webconsole"));
        assert!(services.contains(&"grid-java-coordinator"));
    }

    #[test]
    fn compose_env_merges_secrets_and_identity() {
        let mut secrets = BTreeMap::new();
        secrets.insert("GRAFANA_PORT".to_string(), "6799".to_string());

        let env = compose_env(&params(), "BrowserUpLocal", &secrets);
        assert_eq!(env["GRAFANA_PORT"], "6799");
        assert_eq!(env["INITIAL_API_TOKEN"], "a".repeat(API_TOKEN_SIZE));
        assert_eq!(env["BROWSERUP_CLUSTER_NAME"], "BrowserUpLocal");
        assert_eq!(env["BROWSERUP_SERVICES_IMAGE_TAG"], SERVICES_VERSION);
        assert_eq!(
            env["BROWSERUP_STANDARD_IMAGE_VERSION_TAG_OVERRIDE"],
            "release-2.0.0"
        );
    }

    #[tokio::test]
    async fn occupied_port_is_reported() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();

        let err = check_ports_free(&[("webconsole", port)]).await;
        match err {
            Err(ClusterError::PortsInUse { conflicts }) => {
                assert_eq!(conflicts.len(), 1);
                assert!(conflicts[0].contains("webconsole"));
            }
            other => panic!("expected ports-in-use, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn free_port_passes_the_check() {
        // Bind then drop to find a port that is almost certainly free.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr").port()
        };
        check_ports_free(&[("webconsole", port)])
            .await
            .expect("port should be free");
    }
}
