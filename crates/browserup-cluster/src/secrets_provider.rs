//! Cluster service configuration and generated secrets.
//!
//! These values are injected into the compose environment for local
//! clusters and into stack parameters for remote ones. Generated values
//! (storage keys, service passwords) are created once and persisted in the
//! local secrets store so a re-deploy reuses them.

use std::collections::BTreeMap;

use browserup_secrets::SecretsStore;

use crate::error::Result;

/// Port the web console listens on for local clusters.
pub const WEBCONSOLE_PORT: u16 = 6730;
/// Port grafana listens on.
pub const GRAFANA_PORT: u16 = 6799;
/// Zookeeper client port.
pub const ZOOKEEPER_PORT: u16 = 6781;
/// RabbitMQ queue port.
pub const RABBITMQ_PORT: u16 = 6772;
/// ClickHouse HTTP port.
pub const CLICKHOUSE_PORT: u16 = 6784;
/// MinIO S3 port.
pub const S3_MINIO_PORT: u16 = 9000;

/// Builds the cluster service configuration map, generating and persisting
/// any missing secrets.
///
/// # Errors
///
/// Returns an error when a generated secret cannot be persisted.
pub fn cluster_secrets(store: &mut SecretsStore) -> Result<BTreeMap<String, String>> {
    let minio_secret = store.get_or_create("s3MinioSecretAccessKey")?;
    let rabbitmq_pass = store.get_or_create("rabbitmqPassword")?;
    let clickhouse_pass = store.get_or_create("clickhousePassword")?;
    let grafana_pass = store.get_or_create("grafanaPassword")?;

    let mut secrets = BTreeMap::new();
    secrets.insert("WEBCONSOLE_PROTOCOL".to_string(), "http".to_string());
    secrets.insert(
        "BROWSERUP_WEBCONSOLE_PORT".to_string(),
        WEBCONSOLE_PORT.to_string(),
    );
    secrets.insert("GRAFANA_PORT".to_string(), GRAFANA_PORT.to_string());
    secrets.insert("GRAFANA_USERNAME".to_string(), "admin".to_string());
    secrets.insert("GRAFANA_PASSWORD".to_string(), grafana_pass);
    secrets.insert("ZOOKEEPER_PORT".to_string(), ZOOKEEPER_PORT.to_string());
    secrets.insert("RABBITMQ_PORT".to_string(), RABBITMQ_PORT.to_string());
    secrets.insert("RABBITMQ_DEFAULT_PASS".to_string(), rabbitmq_pass);
    secrets.insert("CLICKHOUSE_PORT".to_string(), CLICKHOUSE_PORT.to_string());
    secrets.insert("CLICKHOUSE_PASSWORD".to_string(), clickhouse_pass);
    secrets.insert(
        "S3_MINIO_HOST_PORT_1".to_string(),
        S3_MINIO_PORT.to_string(),
    );
    secrets.insert(
        "S3_MINIO_ACCESS_KEY_ID".to_string(),
        "browserup".to_string(),
    );
    secrets.insert("S3_MINIO_SECRET_ACCESS_KEY".to_string(), minio_secret);
    secrets.insert(
        "PRIVATE_DNS_NAMESPACE_NAME".to_string(),
        "browserup.local".to_string(),
    );
    Ok(secrets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn generated_secrets_are_stable_across_calls() {
        let dir = TempDir::new().expect("tempdir");
        let mut store =
            SecretsStore::open(dir.path().join("secrets.yaml")).expect("open store");

        let first = cluster_secrets(&mut store).expect("secrets");
        let second = cluster_secrets(&mut store).expect("secrets");
        assert_eq!(
            first["S3_MINIO_SECRET_ACCESS_KEY"],
            second["S3_MINIO_SECRET_ACCESS_KEY"]
        );
        assert_eq!(first["WEBCONSOLE_PROTOCOL"], "http");
        assert_eq!(first["BROWSERUP_WEBCONSOLE_PORT"], "6730");
    }
}
