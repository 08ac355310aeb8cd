//! CLI command implementations.
//!
//! Each submodule implements one verb. Lifecycle commands narrate through
//! the logger; `info` and `status` write structured output through
//! [`crate::output::OutputFormat`].

pub mod deploy;
pub mod destroy;
pub mod info;
pub mod init;
pub mod install;
pub mod reports;
pub mod start;
pub mod status;
pub mod stop;
pub mod upgrade;
pub mod upload_license;
pub mod upload_scenario;
pub mod verify;

pub use deploy::DeployCommand;
pub use destroy::DestroyCommand;
pub use info::InfoCommand;
pub use init::InitCommand;
pub use install::InstallCommand;
pub use reports::ReportsCommand;
pub use start::StartCommand;
pub use status::StatusCommand;
pub use stop::StopCommand;
pub use upgrade::UpgradeCommand;
pub use upload_license::UploadLicenseCommand;
pub use upload_scenario::UploadScenarioCommand;
pub use verify::VerifyCommand;

use browserup_cluster::DeployOptions;

use crate::cli::DeployArgs;

/// Maps deploy arguments onto typed deployment options.
pub(crate) fn deploy_options(args: &DeployArgs) -> DeployOptions {
    DeployOptions {
        cluster_type: args.cluster_type.clone(),
        instance_type: args.instance.clone(),
        region: args.region.clone(),
        admin_emails: args.admin_emails.clone(),
        key_pair_name: args.key_pair.clone(),
        minions_key_pair_name: args.minion_key_pair.clone(),
        create_key_pair: args.create_key_pair,
        services_image_tag: args.services_image_tag.clone(),
        standard_image_tag: args.standard_image_tag.clone(),
        use_local_cache: args.use_local_cache,
    }
}
