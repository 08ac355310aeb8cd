//! # browserup-secrets
//!
//! Local secret storage and cluster credentials for the BrowserUp CLI.
//!
//! Every CLI invocation that needs to reach a deployed cluster resolves its
//! connection data through this crate:
//!
//! - [`SecretsStore`]: a YAML file under the per-user settings directory,
//!   read fully on open and rewritten fully on every save
//! - [`ClusterCredentials`]: the validated record identifying a deployed
//!   cluster (URL, API token, name, type, region, image tags)
//! - [`CredentialsRepository`]: resolves each credential field through an
//!   explicit priority chain (CLI option, then environment variable, then
//!   persisted secret) and persists credentials after a deploy
//!
//! The store is not coordinated between concurrent CLI invocations; the
//! design assumes a single interactive operator per machine.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod credentials;
pub mod error;
pub mod repository;
pub mod store;
pub mod token;

pub use credentials::{
    ClusterCredentials, ClusterType, CredentialField, CredentialParts, API_TOKEN_SIZE,
    CLUSTER_NAME_LOCAL_PREFIX, CLUSTER_NAME_PREFIX,
};
pub use error::{Result, SecretsError};
pub use repository::{CredentialOverrides, CredentialsRepository};
pub use store::{app_settings_dir, SecretsStore};
pub use token::friendly_token;
