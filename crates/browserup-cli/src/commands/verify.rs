//! Load verify: run a profile command once in the standard image.

use tracing::{debug, info};

use browserup_cluster::compose::{run_in_image, DockerClient};

use crate::cli::VerifyArgs;
use crate::error::CliError;

/// Image used when the operator does not name one.
const DEFAULT_IMAGE: &str = "browserup/standard:release-1.4.7";

/// Handler for `load verify`.
pub struct VerifyCommand;

impl VerifyCommand {
    /// Runs the given command once in the (standard or named) image and
    /// prints its output, so script problems surface before a full run.
    ///
    /// # Errors
    ///
    /// Docker unavailability and a non-zero command exit.
    pub async fn execute(args: &VerifyArgs) -> Result<(), CliError> {
        info!("running verify for command: {}", args.command.join(" "));
        DockerClient::check_docker_available().await?;

        let image = args.image.as_deref().unwrap_or(DEFAULT_IMAGE);
        debug!(image, "running command in image");
        let stdout = run_in_image(image, &args.command).await?;
        if !stdout.trim().is_empty() {
            println!("{}", stdout.trim_end());
        }
        info!("verify completed successfully");
        Ok(())
    }
}
