//! Cluster install: check docker, install the bundled cluster definition,
//! pre-pull images.

use std::env;

use semver::Version;
use tracing::{info, warn};

use browserup_cluster::compose::{ensure_compose_file_installed, DockerClient};

use crate::error::CliError;

const MINIMUM_DOCKER_VERSION: &str = "19.0.0";

/// Env flag: skip all docker work, for AWS-only installs (e.g. CI/CD).
const SKIP_DOCKER_ENV: &str = "SKIP_DOCKER";

/// Handler for `cluster install`.
pub struct InstallCommand;

impl InstallCommand {
    /// Verifies the local docker install, writes the bundled compose
    /// definition, and starts pulling images.
    ///
    /// # Errors
    ///
    /// Docker unavailability, an unsupported docker version, and compose
    /// failures.
    pub async fn execute() -> Result<(), CliError> {
        if env::var(SKIP_DOCKER_ENV).is_ok() {
            info!("SKIP_DOCKER set, skipping docker checks and image pull");
        } else {
            info!("checking docker version...");
            check_docker_version().await?;
            ensure_compose_file_installed()?;
            info!("starting pull of cluster images...");
            DockerClient::with_default_compose_file()?.compose_pull().await?;
        }
        print_welcome();
        Ok(())
    }
}

async fn check_docker_version() -> Result<(), CliError> {
    let found = DockerClient::docker_version().await?;
    info!("docker version: {found}");

    match (Version::parse(&found), Version::parse(MINIMUM_DOCKER_VERSION)) {
        (Ok(found_version), Ok(minimum)) if found_version < minimum => {
            Err(CliError::DockerTooOld {
                found,
                minimum: MINIMUM_DOCKER_VERSION.to_string(),
            })
        }
        (Err(_), _) => {
            warn!("could not compare docker version \"{found}\", continuing");
            Ok(())
        }
        _ => {
            info!("docker found with compatible version");
            Ok(())
        }
    }
}

fn print_welcome() {
    println!(
        r"
BrowserUp, the DRY (don't repeat yourself) load testing tool.

Getting started:

  mkdir demo && cd demo

Init a config (and a sample script unless you have one):

  browserup load init

Launch a cluster and start the test:

  browserup load start --deploy

When you are done:

  browserup load stop --destroy
"
    );
}
