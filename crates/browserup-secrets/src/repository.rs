//! Credential resolution and persistence.
//!
//! Each credential field resolves through an explicit priority chain:
//! an explicit CLI option wins over a process environment variable, which
//! wins over the persisted secret. The chain is an ordered list evaluated
//! per field, first non-empty value wins, so the precedence rule is
//! testable on its own.

use std::env;

use tracing::debug;

use crate::credentials::{ClusterCredentials, CredentialField, CredentialParts};
use crate::error::Result;
use crate::store::SecretsStore;

/// Environment variable overriding the cluster URL.
pub const CLUSTER_URL_ENV: &str = "BROWSERUP_URL_OVERRIDE";
/// Environment variable overriding the API token.
pub const API_TOKEN_ENV: &str = "BROWSERUP_API_TOKEN";
/// Environment variable overriding the cluster name.
pub const CLUSTER_NAME_ENV: &str = "BROWSERUP_CLUSTER_NAME";
/// Environment variable overriding the cluster type.
pub const CLUSTER_TYPE_ENV: &str = "BROWSERUP_CLUSTER_TYPE";

const SECRET_CLUSTER_URL: &str = "clusterUrl";
const SECRET_API_TOKEN: &str = "apiToken";
const SECRET_CLUSTER_NAME: &str = "clusterName";
const SECRET_CLUSTER_TYPE: &str = "clusterType";
const SECRET_REGION: &str = "region";
const SECRET_SERVICES_IMAGE_TAG: &str = "servicesImageTag";
const SECRET_STANDARD_IMAGE_TAG: &str = "standardImageTag";
const SECRET_IS_CUSTOM_SERVICES_TAG: &str = "isCustomServicesImageTag";
const SECRET_LAST_RUN_ID: &str = "lastRunId";

/// Explicitly supplied credential values from the command line.
#[derive(Debug, Clone, Default)]
pub struct CredentialOverrides {
    /// `--api-token`.
    pub api_token: Option<String>,
    /// `--cluster-name`.
    pub cluster_name: Option<String>,
    /// `--cluster-type`.
    pub cluster_type: Option<String>,
}

/// Resolves a single field: first non-empty candidate wins.
///
/// Candidates are ordered highest priority first.
fn resolve(candidates: [Option<String>; 3]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
}

/// Reads and writes cluster credentials against a [`SecretsStore`].
#[derive(Debug)]
pub struct CredentialsRepository {
    store: SecretsStore,
}

impl CredentialsRepository {
    /// Wraps an opened store.
    #[must_use]
    pub fn new(store: SecretsStore) -> Self {
        Self { store }
    }

    /// Opens the repository over the default per-user store.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be opened.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(SecretsStore::open_default()?))
    }

    /// Resolves credentials, validating each present field and requiring
    /// the listed fields to resolve.
    ///
    /// # Errors
    ///
    /// Propagates validation and missing-field errors from
    /// [`ClusterCredentials::new`].
    pub fn credentials(
        &self,
        overrides: &CredentialOverrides,
        required: &[CredentialField],
    ) -> Result<ClusterCredentials> {
        let parts = CredentialParts {
            cluster_url: resolve([
                None,
                env::var(CLUSTER_URL_ENV).ok(),
                self.secret(SECRET_CLUSTER_URL),
            ]),
            api_token: resolve([
                overrides.api_token.clone(),
                env::var(API_TOKEN_ENV).ok(),
                self.secret(SECRET_API_TOKEN),
            ]),
            cluster_name: resolve([
                overrides.cluster_name.clone(),
                env::var(CLUSTER_NAME_ENV).ok(),
                self.secret(SECRET_CLUSTER_NAME),
            ]),
            cluster_type: resolve([
                overrides.cluster_type.clone(),
                env::var(CLUSTER_TYPE_ENV).ok(),
                self.secret(SECRET_CLUSTER_TYPE),
            ]),
            region: self.secret(SECRET_REGION),
            services_image_tag: self.secret(SECRET_SERVICES_IMAGE_TAG),
            standard_image_tag: self.secret(SECRET_STANDARD_IMAGE_TAG),
            is_custom_services_image_tag: self
                .secret(SECRET_IS_CUSTOM_SERVICES_TAG)
                .is_some_and(|v| v == "true"),
        };
        ClusterCredentials::new(parts, required)
    }

    /// Persists all credential fields, overwriting prior values.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn save(&mut self, credentials: &ClusterCredentials) -> Result<()> {
        debug!(credentials = %credentials, "saving cluster credentials");
        let stored = |v: &Option<String>| v.clone().unwrap_or_default();
        self.store.set_many([
            (SECRET_CLUSTER_URL, stored(&credentials.cluster_url)),
            (SECRET_API_TOKEN, stored(&credentials.api_token)),
            (SECRET_CLUSTER_NAME, stored(&credentials.cluster_name)),
            (
                SECRET_CLUSTER_TYPE,
                credentials
                    .cluster_type
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_default(),
            ),
            (SECRET_REGION, stored(&credentials.region)),
            (
                SECRET_SERVICES_IMAGE_TAG,
                stored(&credentials.services_image_tag),
            ),
            (
                SECRET_STANDARD_IMAGE_TAG,
                stored(&credentials.standard_image_tag),
            ),
            (
                SECRET_IS_CUSTOM_SERVICES_TAG,
                credentials.is_custom_services_image_tag.to_string(),
            ),
        ])
    }

    /// Truncates the persisted secret store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be truncated.
    pub fn clear(&mut self) -> Result<()> {
        self.store.clear()
    }

    /// The run id persisted by the most recent `start`.
    #[must_use]
    pub fn last_run_id(&self) -> Option<String> {
        self.secret(SECRET_LAST_RUN_ID)
    }

    /// Persists the run id of a just-started run.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn set_last_run_id(&mut self, run_id: &str) -> Result<()> {
        self.store.set(SECRET_LAST_RUN_ID, run_id)
    }

    /// Mutable access to the underlying store, for secrets outside the
    /// credential set.
    pub fn store_mut(&mut self) -> &mut SecretsStore {
        &mut self.store
    }

    fn secret(&self, name: &str) -> Option<String> {
        self.store.get(name).map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{ClusterType, API_TOKEN_SIZE};
    use tempfile::TempDir;

    fn repository(dir: &TempDir) -> CredentialsRepository {
        let store = SecretsStore::open(dir.path().join("secrets.yaml")).expect("open");
        CredentialsRepository::new(store)
    }

    #[test]
    fn explicit_option_beats_stored_secret() {
        // The env resolver sits between these two; it is exercised
        // directly in resolve_prefers_candidates_in_order below, since
        // mutating process env is unsafe under edition 2024.
        let chosen = resolve([
            Some("from-option".to_string()),
            Some("from-env".to_string()),
            Some("from-secret".to_string()),
        ]);
        assert_eq!(chosen.as_deref(), Some("from-option"));
    }

    #[test]
    fn resolve_prefers_candidates_in_order() {
        let chosen = resolve([
            None,
            Some("from-env".to_string()),
            Some("from-secret".to_string()),
        ]);
        assert_eq!(chosen.as_deref(), Some("from-env"));

        let chosen = resolve([None, None, Some("from-secret".to_string())]);
        assert_eq!(chosen.as_deref(), Some("from-secret"));

        assert_eq!(resolve([None, None, None]), None);
    }

    #[test]
    fn resolve_skips_empty_candidates() {
        let chosen = resolve([
            Some(String::new()),
            None,
            Some("from-secret".to_string()),
        ]);
        assert_eq!(chosen.as_deref(), Some("from-secret"));
    }

    #[test]
    fn save_then_resolve_round_trips() {
        let dir = TempDir::new().expect("tempdir");
        let mut repo = repository(&dir);

        let credentials = ClusterCredentials::new(
            crate::credentials::CredentialParts {
                cluster_url: Some("http://localhost:3000".to_string()),
                api_token: Some("b".repeat(API_TOKEN_SIZE)),
                cluster_name: Some("BrowserUpLocal".to_string()),
                cluster_type: Some("local".to_string()),
                services_image_tag: Some("release-1.4.7".to_string()),
                ..Default::default()
            },
            &[],
        )
        .expect("valid credentials");
        repo.save(&credentials).expect("save");

        let resolved = repo
            .credentials(&CredentialOverrides::default(), &[])
            .expect("resolve");
        assert_eq!(resolved.cluster_url, credentials.cluster_url);
        assert_eq!(resolved.api_token, credentials.api_token);
        assert_eq!(resolved.cluster_type, Some(ClusterType::Local));
        assert_eq!(
            resolved.services_image_tag.as_deref(),
            Some("release-1.4.7")
        );
    }

    #[test]
    fn override_wins_over_saved_secret() {
        let dir = TempDir::new().expect("tempdir");
        let mut repo = repository(&dir);
        repo.store_mut()
            .set("apiToken", &"c".repeat(API_TOKEN_SIZE))
            .expect("seed");

        let overrides = CredentialOverrides {
            api_token: Some("d".repeat(API_TOKEN_SIZE)),
            ..Default::default()
        };
        let resolved = repo.credentials(&overrides, &[]).expect("resolve");
        assert_eq!(resolved.api_token, overrides.api_token);
    }

    #[test]
    fn last_run_id_round_trips() {
        let dir = TempDir::new().expect("tempdir");
        let mut repo = repository(&dir);
        assert!(repo.last_run_id().is_none());
        repo.set_last_run_id("1234").expect("set");
        assert_eq!(repo.last_run_id().as_deref(), Some("1234"));
    }

    #[test]
    fn clear_removes_everything() {
        let dir = TempDir::new().expect("tempdir");
        let mut repo = repository(&dir);
        repo.set_last_run_id("1234").expect("set");
        repo.clear().expect("clear");
        assert!(repo.last_run_id().is_none());
    }
}
