//! BrowserUp CLI binary entrypoint.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use browserup_cli::cli::{Cli, ClusterCommands, Commands, LoadCommands};
use browserup_cli::commands::{
    DeployCommand, DestroyCommand, InfoCommand, InitCommand, InstallCommand, ReportsCommand,
    StartCommand, StatusCommand, StopCommand, UpgradeCommand, UploadLicenseCommand,
    UploadScenarioCommand, VerifyCommand,
};
use browserup_cli::output::OutputFormat;
use browserup_cli::CliError;
use browserup_secrets::CredentialsRepository;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is reserved for command output.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();
    let mut repository = CredentialsRepository::open_default()?;

    match cli.command {
        Commands::Cluster { command } => match command {
            ClusterCommands::Deploy(args) => {
                DeployCommand::execute(&args, &mut repository).await?;
            }
            ClusterCommands::Destroy(args) => {
                DestroyCommand::execute(&args, &mut repository).await?;
            }
            ClusterCommands::Upgrade(args) => {
                UpgradeCommand::execute(&args, &mut repository).await?;
            }
            ClusterCommands::UploadLicense(args) => {
                UploadLicenseCommand::execute(&args, &repository).await?;
            }
            ClusterCommands::Info => {
                InfoCommand::execute(&mut stdout, &format, &repository).await?;
            }
            ClusterCommands::Install => {
                InstallCommand::execute().await?;
            }
        },
        Commands::Load { command } => match command {
            LoadCommands::Init(args) => {
                InitCommand::execute(&args)?;
            }
            LoadCommands::Verify(args) => {
                VerifyCommand::execute(&args).await?;
            }
            LoadCommands::Start(args) => {
                StartCommand::execute(&cli.config, &args, &mut repository).await?;
            }
            LoadCommands::Stop(args) => {
                StopCommand::execute(&args, &mut repository).await?;
            }
            LoadCommands::Status(args) => {
                StatusCommand::execute(&mut stdout, &format, &args, &repository).await?;
            }
            LoadCommands::Reports(args) => {
                return ReportsCommand::execute(&cli.config, &args, &repository).await;
            }
            LoadCommands::UploadScenario => {
                UploadScenarioCommand::execute(&cli.config, &repository).await?;
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_cluster_info() {
        let cli = Cli::parse_from(["browserup", "cluster", "info"]);
        assert!(matches!(
            cli.command,
            Commands::Cluster {
                command: ClusterCommands::Info
            }
        ));
    }

    #[test]
    fn cli_parses_load_stop_with_destroy() {
        let cli = Cli::parse_from(["browserup", "load", "stop", "--destroy", "-r", "7"]);
        match cli.command {
            Commands::Load {
                command: LoadCommands::Stop(args),
            } => {
                assert!(args.destroy);
                assert_eq!(args.run_id, Some(7));
            }
            other => panic!("expected load stop, got {other:?}"),
        }
    }
}
