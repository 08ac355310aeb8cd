//! Deployment parameters, polymorphic over local and remote clusters.

use once_cell::sync::Lazy;
use regex::Regex;

use browserup_secrets::{friendly_token, ClusterType, API_TOKEN_SIZE};

use crate::error::{ClusterError, Result};
use crate::version::SERVICES_VERSION;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)] // the pattern is a compile-time constant
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .unwrap()
});

/// Raw deployment intent collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// `local` or `aws`; defaults to local.
    pub cluster_type: Option<String>,
    /// AWS instance type for cluster nodes.
    pub instance_type: Option<String>,
    /// AWS region to deploy into.
    pub region: Option<String>,
    /// Emails granted console admin access.
    pub admin_emails: Vec<String>,
    /// Existing key pair for the cluster ingress host.
    pub key_pair_name: Option<String>,
    /// Existing key pair for minion hosts.
    pub minions_key_pair_name: Option<String>,
    /// Create a fresh key pair named after the cluster.
    pub create_key_pair: bool,
    /// Override for the services image tag.
    pub services_image_tag: Option<String>,
    /// Override for the standard workload image tag.
    pub standard_image_tag: Option<String>,
    /// Use locally cached images instead of pulling (local only).
    pub use_local_cache: bool,
}

/// Parameters for a local compose cluster.
#[derive(Debug, Clone)]
pub struct LocalClusterParams {
    /// The initial API token baked into the deployment.
    pub api_token: String,
    /// Services image tag; `None` means the CLI's built-in version.
    pub services_image_tag: Option<String>,
    /// Standard workload image tag override.
    pub standard_image_tag: Option<String>,
    /// Skip pulling and use whatever images docker already has.
    pub use_local_cache: bool,
}

/// Parameters for a remote AWS cluster.
#[derive(Debug, Clone)]
pub struct RemoteClusterParams {
    /// The initial API token baked into the deployment.
    pub api_token: String,
    /// AWS instance type for cluster nodes.
    pub instance_type: Option<String>,
    /// AWS region to deploy into.
    pub region: String,
    /// Emails granted console admin access.
    pub admin_emails: Vec<String>,
    /// Key pair for the cluster ingress host, when SSH access is wanted.
    pub key_pair_name: Option<String>,
    /// Key pair for minion hosts.
    pub minions_key_pair_name: Option<String>,
    /// Create a fresh key pair named after the cluster.
    pub create_key_pair: bool,
    /// Services image tag; `None` means the CLI's built-in version.
    pub services_image_tag: Option<String>,
    /// Standard workload image tag override.
    pub standard_image_tag: Option<String>,
}

/// Deployment intent, tagged by cluster type.
#[derive(Debug, Clone)]
pub enum ClusterParams {
    /// Deploy onto the operator's machine.
    Local(LocalClusterParams),
    /// Deploy onto AWS.
    Aws(RemoteClusterParams),
}

const DEFAULT_REGION: &str = "us-east-1";

impl ClusterParams {
    /// Validates `options` and builds typed parameters, generating a fresh
    /// API token for the deployment.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::InvalidParams`] for an unknown cluster type
    /// or a malformed admin email.
    pub fn build(options: &DeployOptions) -> Result<Self> {
        validate_admin_emails(&options.admin_emails)?;
        let api_token = friendly_token(API_TOKEN_SIZE);

        match options.cluster_type.as_deref().unwrap_or("local") {
            "local" => Ok(Self::Local(LocalClusterParams {
                api_token,
                services_image_tag: options.services_image_tag.clone(),
                standard_image_tag: options.standard_image_tag.clone(),
                use_local_cache: options.use_local_cache,
            })),
            "aws" => Ok(Self::Aws(RemoteClusterParams {
                api_token,
                instance_type: options.instance_type.clone(),
                region: options
                    .region
                    .clone()
                    .unwrap_or_else(|| DEFAULT_REGION.to_string()),
                admin_emails: options.admin_emails.clone(),
                key_pair_name: options.key_pair_name.clone(),
                minions_key_pair_name: options.minions_key_pair_name.clone(),
                create_key_pair: options.create_key_pair,
                services_image_tag: options.services_image_tag.clone(),
                standard_image_tag: options.standard_image_tag.clone(),
            })),
            other => Err(ClusterError::InvalidParams {
                reason: format!("invalid cluster_type \"{other}\", possible options: local, aws"),
            }),
        }
    }

    /// The cluster type this intent targets.
    #[must_use]
    pub const fn cluster_type(&self) -> ClusterType {
        match self {
            Self::Local(_) => ClusterType::Local,
            Self::Aws(_) => ClusterType::Aws,
        }
    }

    /// The generated API token.
    #[must_use]
    pub fn api_token(&self) -> &str {
        match self {
            Self::Local(p) => &p.api_token,
            Self::Aws(p) => &p.api_token,
        }
    }
}

impl LocalClusterParams {
    /// The effective services tag: the override, or the CLI's built-in
    /// version.
    #[must_use]
    pub fn services_image_tag(&self) -> &str {
        self.services_image_tag.as_deref().unwrap_or(SERVICES_VERSION)
    }

    /// Whether the operator supplied their own services tag.
    #[must_use]
    pub const fn is_custom_services_image_tag(&self) -> bool {
        self.services_image_tag.is_some()
    }
}

impl RemoteClusterParams {
    /// The effective services tag: the override, or the CLI's built-in
    /// version.
    #[must_use]
    pub fn services_image_tag(&self) -> &str {
        self.services_image_tag.as_deref().unwrap_or(SERVICES_VERSION)
    }

    /// Whether the operator supplied their own services tag.
    #[must_use]
    pub const fn is_custom_services_image_tag(&self) -> bool {
        self.services_image_tag.is_some()
    }
}

fn validate_admin_emails(emails: &[String]) -> Result<()> {
    for email in emails {
        if !EMAIL.is_match(email) {
            return Err(ClusterError::InvalidParams {
                reason: format!("invalid admin_emails provided, invalid email found: \"{email}\""),
            });
        }
    }
    Ok(())
}
