//! Load init: scaffold a starter configuration.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::cli::InitArgs;
use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "browserup.load.yaml";
const SCAFFOLD: &str = include_str!("../../resources/browserup.load.yaml");

/// Handler for `load init`.
pub struct InitCommand;

impl InitCommand {
    /// Writes a starter `browserup.load.yaml` into the working directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn execute(args: &InitArgs) -> Result<(), CliError> {
        let path = Path::new(CONFIG_FILE_NAME);
        if path.exists() && !args.force {
            info!("{CONFIG_FILE_NAME} already exists; use --force to overwrite");
            return Ok(());
        }
        fs::write(path, SCAFFOLD)?;
        info!("created {CONFIG_FILE_NAME}");
        info!("edit the profile commands, then run: browserup load start --deploy");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaffold_is_a_loadable_config() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, SCAFFOLD).expect("write scaffold");

        let config = browserup_scenario::LoadConfig::load(&path).expect("scaffold loads");
        assert_eq!(config.scenario().profiles.len(), 1);
        assert_eq!(config.cluster_type(), Some("local"));
        assert_eq!(config.scenario().profiles[0].allocation_actual, Some(10));
    }
}
