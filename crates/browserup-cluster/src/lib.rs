//! # browserup-cluster
//!
//! Cluster lifecycle orchestration for the BrowserUp CLI.
//!
//! A [`pilot::ClusterPilot`] owns the create / destroy / upgrade sequence
//! for one kind of cluster:
//!
//! - **Local** ([`local`]): drives a docker compose workflow on the
//!   operator's machine, then waits for the web console health check
//! - **AWS** ([`aws`]): creates the compute and services infrastructure
//!   stacks from named templates, discovers resources by cluster-name and
//!   stack-type tags, and tears stacks down in strict dependency order
//!   (services, then minions, then compute)
//!
//! The variant is selected once at command entry from the cluster type;
//! there is no runtime capability sniffing.
//!
//! Cloud calls shell out to the `aws` CLI with JSON output, the same way
//! container calls shell out to `docker`. The orchestration itself
//! (ordering, tag filtering, wait budgets, rollback on failure) lives
//! here and is unit-testable without either binary installed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aws;
pub mod compose;
pub mod error;
pub mod local;
pub mod name;
pub mod params;
pub mod pilot;
pub mod secrets_provider;
pub mod version;

pub use error::{ClusterError, Result};
pub use local::LocalClusterPilot;
pub use name::generate_cluster_name;
pub use params::{ClusterParams, DeployOptions, LocalClusterParams, RemoteClusterParams};
pub use pilot::ClusterPilot;
pub use version::{validate_cluster_version, SERVICES_VERSION};
