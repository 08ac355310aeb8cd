//! Command-line argument parsing with clap.

use clap::{Parser, Subcommand, ValueEnum};

/// BrowserUp CLI - DRY load testing from real user scripts.
#[derive(Parser, Debug, Clone)]
#[command(name = "browserup")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the load test configuration file.
    #[arg(
        short,
        long,
        global = true,
        env = "BROWSERUP_CONFIG",
        default_value = "./browserup.load.yaml"
    )]
    pub config: String,

    /// Verbose (debug) logging.
    #[arg(short, long, global = true, env = "BROWSERUP_CLI_VERBOSE")]
    pub verbose: bool,

    /// Output format for data commands.
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Format {
    /// Human-readable output.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Cluster lifecycle commands.
    Cluster {
        /// Cluster subcommand to execute.
        #[command(subcommand)]
        command: ClusterCommands,
    },

    /// Load test commands.
    Load {
        /// Load subcommand to execute.
        #[command(subcommand)]
        command: LoadCommands,
    },
}

/// Cluster lifecycle subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ClusterCommands {
    /// Deploy a new cluster.
    Deploy(DeployArgs),

    /// Destroy the deployed cluster and clear saved credentials.
    Destroy(DestroyArgs),

    /// Upgrade the deployed cluster to this CLI's services version.
    Upgrade(UpgradeArgs),

    /// Upload a license file to the cluster.
    UploadLicense(UploadLicenseArgs),

    /// Show the saved cluster credentials and local docker status.
    Info,

    /// Install the bundled cluster definition and pre-pull images.
    Install,
}

/// Load test subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum LoadCommands {
    /// Scaffold a starter load test configuration in the working
    /// directory.
    Init(InitArgs),

    /// Verify a profile command runs in the standard image.
    Verify(VerifyArgs),

    /// Upload the scenario and start a run.
    Start(StartArgs),

    /// Stop active runs.
    Stop(StopArgs),

    /// Show whether the last (or a given) run is active.
    Status(StatusArgs),

    /// Run SLA reports against the last run.
    Reports(ReportsArgs),

    /// Upload the scenario definition without starting a run.
    UploadScenario,
}

/// Arguments for cluster deploy.
#[derive(Parser, Debug, Clone, Default)]
pub struct DeployArgs {
    /// Where to deploy: local (docker compose) or aws.
    #[arg(short = 't', long, env = "BROWSERUP_CLUSTER_TYPE")]
    pub cluster_type: Option<String>,

    /// AWS region to deploy into.
    #[arg(short, long)]
    pub region: Option<String>,

    /// AWS instance type for cluster nodes.
    #[arg(short, long)]
    pub instance: Option<String>,

    /// Emails granted console admin access (repeatable).
    #[arg(short = 'e', long = "admin-email")]
    pub admin_emails: Vec<String>,

    /// Existing key pair name for SSH access to the cluster host.
    #[arg(short, long)]
    pub key_pair: Option<String>,

    /// Existing key pair name for SSH access to minions.
    #[arg(short, long)]
    pub minion_key_pair: Option<String>,

    /// Create a fresh key pair named after the cluster.
    #[arg(long)]
    pub create_key_pair: bool,

    /// Override the services image tag.
    #[arg(short, long)]
    pub services_image_tag: Option<String>,

    /// Override the standard workload image tag.
    #[arg(long)]
    pub standard_image_tag: Option<String>,

    /// Use locally cached images instead of pulling (local only).
    #[arg(long)]
    pub use_local_cache: bool,
}

/// Arguments for cluster destroy.
#[derive(Parser, Debug, Clone, Default)]
pub struct DestroyArgs {
    /// Name of the cluster to destroy, when not the saved one.
    #[arg(short = 'n', long)]
    pub cluster_name: Option<String>,

    /// Keep local data volumes instead of removing them.
    #[arg(long)]
    pub keep_volumes: bool,
}

/// Arguments for cluster upgrade.
#[derive(Parser, Debug, Clone, Default)]
pub struct UpgradeArgs {
    /// Apply the upgrade without interactive confirmation.
    #[arg(short = 'y', long)]
    pub skip_confirmation: bool,
}

/// Arguments for license upload.
#[derive(Parser, Debug, Clone)]
pub struct UploadLicenseArgs {
    /// Path to the license JSON file.
    #[arg(short, long)]
    pub path: String,
}

/// Arguments for load init.
#[derive(Parser, Debug, Clone, Default)]
pub struct InitArgs {
    /// Overwrite an existing configuration file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for load verify.
#[derive(Parser, Debug, Clone)]
pub struct VerifyArgs {
    /// Image to verify in; defaults to the standard image.
    #[arg(short, long)]
    pub image: Option<String>,

    /// The command to run inside the image.
    #[arg(required = true, last = true)]
    pub command: Vec<String>,
}

/// Arguments for load start.
#[derive(Parser, Debug, Clone, Default)]
pub struct StartArgs {
    /// Deploy a cluster first when none is saved.
    #[arg(short, long)]
    pub deploy: bool,

    /// Destroy any existing cluster, deploy a fresh one, then start.
    #[arg(long)]
    pub redeploy: bool,

    #[command(flatten)]
    /// Deployment options used with --deploy/--redeploy.
    pub deploy_args: DeployArgs,
}

/// Arguments for load stop.
#[derive(Parser, Debug, Clone, Default)]
pub struct StopArgs {
    /// Stop only this run id instead of every active run.
    #[arg(short, long)]
    pub run_id: Option<u64>,

    /// Destroy the cluster after stopping.
    #[arg(long)]
    pub destroy: bool,
}

/// Arguments for load status.
#[derive(Parser, Debug, Clone, Default)]
pub struct StatusArgs {
    /// Run id to check instead of the last started run.
    #[arg(short, long)]
    pub run_id: Option<u64>,
}

/// Arguments for load reports.
#[derive(Parser, Debug, Clone, Default)]
pub struct ReportsArgs {
    /// Report to run: a name, "system", or "all" (default).
    #[arg(short, long)]
    pub name: Option<String>,

    /// Directory to save rendered report HTML into.
    #[arg(short, long)]
    pub output: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_cluster_deploy() {
        let cli = Cli::parse_from(["browserup", "cluster", "deploy", "-t", "aws", "-r", "eu-west-1"]);
        match cli.command {
            Commands::Cluster {
                command: ClusterCommands::Deploy(args),
            } => {
                assert_eq!(args.cluster_type.as_deref(), Some("aws"));
                assert_eq!(args.region.as_deref(), Some("eu-west-1"));
            }
            other => panic!("expected cluster deploy, got {other:?}"),
        }
    }

    #[test]
    fn cli_parses_load_start_with_deploy_flags() {
        let cli = Cli::parse_from(["browserup", "load", "start", "--deploy", "-t", "local"]);
        match cli.command {
            Commands::Load {
                command: LoadCommands::Start(args),
            } => {
                assert!(args.deploy);
                assert!(!args.redeploy);
                assert_eq!(args.deploy_args.cluster_type.as_deref(), Some("local"));
            }
            other => panic!("expected load start, got {other:?}"),
        }
    }

    #[test]
    fn cli_parses_repeatable_admin_emails() {
        let cli = Cli::parse_from([
            "browserup",
            "cluster",
            "deploy",
            "-e",
            "a@example.com",
            "-e",
            "b@example.com",
        ]);
        match cli.command {
            Commands::Cluster {
                command: ClusterCommands::Deploy(args),
            } => assert_eq!(args.admin_emails.len(), 2),
            other => panic!("expected cluster deploy, got {other:?}"),
        }
    }

    #[test]
    fn cli_respects_global_flags() {
        let cli = Cli::parse_from([
            "browserup",
            "--format",
            "json",
            "--config",
            "custom.yaml",
            "cluster",
            "info",
        ]);
        assert_eq!(cli.format, Format::Json);
        assert_eq!(cli.config, "custom.yaml");
    }

    #[test]
    fn cli_parses_verify_with_trailing_command() {
        let cli = Cli::parse_from([
            "browserup", "load", "verify", "--", "ruby", "my_test.rb",
        ]);
        match cli.command {
            Commands::Load {
                command: LoadCommands::Verify(args),
            } => {
                assert_eq!(args.command, vec!["ruby", "my_test.rb"]);
                assert!(args.image.is_none());
            }
            other => panic!("expected load verify, got {other:?}"),
        }
    }

    #[test]
    fn cli_parses_reports_filters() {
        let cli = Cli::parse_from([
            "browserup", "load", "reports", "--name", "system", "--output", "out",
        ]);
        match cli.command {
            Commands::Load {
                command: LoadCommands::Reports(args),
            } => {
                assert_eq!(args.name.as_deref(), Some("system"));
                assert_eq!(args.output.as_deref(), Some("out"));
            }
            other => panic!("expected load reports, got {other:?}"),
        }
    }
}
