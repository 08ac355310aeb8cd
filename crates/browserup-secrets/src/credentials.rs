//! Cluster credentials: the validated record identifying a deployed cluster.
//!
//! Credentials are created on a successful deploy, persisted to the local
//! secrets store, read back by every later command that needs the cluster,
//! and cleared on teardown. All fields are optional at rest; validation
//! applies to whatever is present, and callers declare which fields they
//! require for a given operation.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SecretsError};

/// Exact length of a cluster API token.
pub const API_TOKEN_SIZE: usize = 20;

/// Reserved prefix carried by every cluster name.
pub const CLUSTER_NAME_PREFIX: &str = "BrowserUp";

/// Prefix carried by local (docker compose) cluster names.
pub const CLUSTER_NAME_LOCAL_PREFIX: &str = "BrowserUpLocal";

/// Where a cluster runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterType {
    /// Containers on the operator's machine, driven by docker compose.
    Local,
    /// Cloud infrastructure stacks in an AWS region.
    Aws,
}

impl ClusterType {
    /// Parses a stored cluster type value.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "local" => Ok(Self::Local),
            "aws" => Ok(Self::Aws),
            other => Err(SecretsError::InvalidField {
                field: "cluster type",
                reason: format!("\"{other}\" is not one of: local, aws"),
            }),
        }
    }

    /// Infers the cluster type from a cluster name prefix.
    #[must_use]
    pub fn from_cluster_name(name: &str) -> Option<Self> {
        if name.is_empty() {
            None
        } else if name.starts_with(CLUSTER_NAME_LOCAL_PREFIX) {
            Some(Self::Local)
        } else {
            Some(Self::Aws)
        }
    }

    /// The stored string form of this type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Aws => "aws",
        }
    }
}

impl fmt::Display for ClusterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A credential field, used to declare per-operation requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    /// The web console base URL.
    ClusterUrl,
    /// The cluster API token.
    ApiToken,
    /// The generated cluster name.
    ClusterName,
    /// Local or AWS.
    ClusterType,
    /// AWS region (remote clusters only).
    Region,
}

impl CredentialField {
    const fn name(self) -> &'static str {
        match self {
            Self::ClusterUrl => "cluster url",
            Self::ApiToken => "api token",
            Self::ClusterName => "cluster name",
            Self::ClusterType => "cluster type",
            Self::Region => "region",
        }
    }
}

/// Unvalidated credential values, as resolved from options, the
/// environment, and the secrets store.
#[derive(Debug, Clone, Default)]
pub struct CredentialParts {
    /// Web console base URL.
    pub cluster_url: Option<String>,
    /// Cluster API token.
    pub api_token: Option<String>,
    /// Generated cluster name.
    pub cluster_name: Option<String>,
    /// Local or AWS, as a stored string.
    pub cluster_type: Option<String>,
    /// AWS region.
    pub region: Option<String>,
    /// Tag of the deployed services images.
    pub services_image_tag: Option<String>,
    /// Override tag for the standard workload image.
    pub standard_image_tag: Option<String>,
    /// Whether the services tag was supplied by the operator.
    pub is_custom_services_image_tag: bool,
}

/// Identifies a deployed cluster instance.
///
/// Construction validates every present field; absent fields are fine
/// unless listed in `required`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterCredentials {
    /// Web console base URL.
    pub cluster_url: Option<String>,
    /// Cluster API token. Never printed by [`fmt::Display`].
    pub api_token: Option<String>,
    /// Generated cluster name, always prefixed with [`CLUSTER_NAME_PREFIX`].
    pub cluster_name: Option<String>,
    /// Where the cluster runs.
    pub cluster_type: Option<ClusterType>,
    /// AWS region, present for remote clusters.
    pub region: Option<String>,
    /// Tag of the deployed services images.
    pub services_image_tag: Option<String>,
    /// Override tag for the standard workload image, if any.
    pub standard_image_tag: Option<String>,
    /// Whether the services tag was supplied by the operator rather than
    /// defaulted from the CLI's built-in version.
    pub is_custom_services_image_tag: bool,
}

impl ClusterCredentials {
    /// Validates `parts` and builds credentials.
    ///
    /// # Errors
    ///
    /// Returns [`SecretsError::InvalidField`] when a present field fails its
    /// format invariant, or [`SecretsError::MissingField`] when a field in
    /// `required` resolved to nothing.
    pub fn new(parts: CredentialParts, required: &[CredentialField]) -> Result<Self> {
        let cluster_type = match non_empty(parts.cluster_type) {
            Some(raw) => Some(ClusterType::parse(&raw)?),
            None => None,
        };

        let credentials = Self {
            cluster_url: non_empty(parts.cluster_url),
            api_token: non_empty(parts.api_token),
            cluster_name: non_empty(parts.cluster_name),
            cluster_type,
            region: non_empty(parts.region),
            services_image_tag: non_empty(parts.services_image_tag),
            standard_image_tag: non_empty(parts.standard_image_tag),
            is_custom_services_image_tag: parts.is_custom_services_image_tag,
        };

        credentials.validate()?;
        for field in required {
            credentials.require(*field)?;
        }
        Ok(credentials)
    }

    fn validate(&self) -> Result<()> {
        if let Some(cluster_url) = &self.cluster_url {
            Url::parse(cluster_url).map_err(|e| SecretsError::InvalidField {
                field: "cluster url",
                reason: format!("\"{cluster_url}\": {e}"),
            })?;
        }

        if let Some(api_token) = &self.api_token {
            if api_token.len() != API_TOKEN_SIZE {
                return Err(SecretsError::InvalidField {
                    field: "api token",
                    reason: format!(
                        "expected {API_TOKEN_SIZE} characters, got {}",
                        api_token.len()
                    ),
                });
            }
        }

        if let Some(cluster_name) = &self.cluster_name {
            if !cluster_name.starts_with(CLUSTER_NAME_PREFIX) {
                return Err(SecretsError::InvalidField {
                    field: "cluster name",
                    reason: format!(
                        "\"{cluster_name}\" does not start with \"{CLUSTER_NAME_PREFIX}\""
                    ),
                });
            }
        }

        Ok(())
    }

    fn require(&self, field: CredentialField) -> Result<()> {
        let present = match field {
            CredentialField::ClusterUrl => self.cluster_url.is_some(),
            CredentialField::ApiToken => self.api_token.is_some(),
            CredentialField::ClusterName => self.cluster_name.is_some(),
            CredentialField::ClusterType => self.cluster_type.is_some(),
            CredentialField::Region => self.region.is_some(),
        };
        if present {
            Ok(())
        } else {
            Err(SecretsError::MissingField {
                field: field.name(),
            })
        }
    }

    /// Host portion of the cluster URL, when a valid URL is present.
    #[must_use]
    pub fn cluster_host(&self) -> Option<String> {
        self.cluster_url
            .as_deref()
            .and_then(|u| Url::parse(u).ok())
            .and_then(|u| u.host_str().map(str::to_owned))
    }

    /// Whether these credentials point at a local compose cluster.
    #[must_use]
    pub fn local_cluster(&self) -> bool {
        self.cluster_type == Some(ClusterType::Local)
    }

    /// Whether these credentials point at a remote cluster.
    #[must_use]
    pub fn remote_cluster(&self) -> bool {
        self.cluster_type == Some(ClusterType::Aws)
    }
}

impl fmt::Display for ClusterCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name: \"{}\", url: \"{}\", type: \"{}\"",
            self.cluster_name.as_deref().unwrap_or(""),
            self.cluster_url.as_deref().unwrap_or(""),
            self.cluster_type.map_or("", |t| t.as_str()),
        )
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
