//! The scenario configuration model, as authored in `browserup.load.yaml`.
//!
//! Defaults mirror what the web console assumes: 30s think time, 5s
//! iteration delay, 2 virtual users per vCPU, and a proxy that filters
//! images, common third-party JS, and multimedia.

use serde::{Deserialize, Serialize};

/// Default think time between steps.
pub const DEFAULT_THINK_TIME: &str = "30s";
/// Default delay between iterations of a profile's command.
pub const DEFAULT_ITERATION_DELAY: &str = "5s";
/// Default virtual users per vCPU.
pub const DEFAULT_VUS_PER_VCPU: u32 = 2;

/// The whole configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigModel {
    /// The load test scenario.
    pub scenario: Scenario,
    /// Named SLA report definitions.
    #[serde(default)]
    pub reports: Vec<Report>,
    /// Named container image references.
    #[serde(default)]
    pub images: Vec<ImageRef>,
    /// CLI-facing settings.
    #[serde(default)]
    pub browserup: BrowserUpSettings,
}

/// CLI-facing settings under the `browserup` key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowserUpSettings {
    /// `local` or `aws`; where `deploy` puts the cluster.
    #[serde(default)]
    pub cluster_type: Option<String>,
}

/// The load test definition.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Scenario name, used for create-or-update on the console.
    pub name: String,
    /// Peak concurrent users across all profiles.
    pub total_users: u32,
    /// Workload profiles; allocations must cover 100% after defaulting.
    pub profiles: Vec<Profile>,
    /// Ramp stages, applied in order before the constant phase.
    #[serde(default)]
    pub ramp: Vec<RampStage>,
    /// Total scenario duration, e.g. `"30m"`.
    pub stop_after: String,
}

/// One ramp step: reach a percentage of total users over a duration.
#[derive(Debug, Clone, Deserialize)]
pub struct RampStage {
    /// Target percentage of total users, e.g. `"50%"`.
    pub ramp_to: String,
    /// How long the ramp takes, e.g. `"5m"`.
    pub over: String,
}

/// One named workload definition within a scenario.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    /// Profile name, unique within the scenario.
    pub name: String,
    /// Share of total users, e.g. `"25%"`. Profiles without an explicit
    /// allocation split the remainder evenly.
    #[serde(default)]
    pub allocation: Option<String>,
    /// Command executed for each iteration.
    #[serde(default)]
    pub command: Option<String>,
    /// Think time between steps.
    #[serde(default = "default_think_time")]
    pub think_time: String,
    /// Delay between iterations.
    #[serde(default = "default_iteration_delay")]
    pub iteration_delay: String,
    /// Whether the browser session resets between iterations.
    #[serde(default)]
    pub reset_session_after_iteration: bool,
    /// Traffic capture configuration.
    #[serde(default)]
    pub proxy_config: ProxyConfig,
    /// Optional CSV-backed data source.
    #[serde(default)]
    pub databank: Option<Databank>,
    /// Name of a container image from the `images` list.
    #[serde(default)]
    pub image: Option<String>,
    /// Region override for this profile's minions.
    #[serde(default)]
    pub region: Option<String>,
    /// Virtual users per vCPU.
    #[serde(default = "default_vus_per_vcpu")]
    pub vus_per_vcpu: u32,
    /// Directory of user-supplied test scripts/data to upload.
    #[serde(default)]
    pub artifact_dir: Option<String>,
    /// Content hash of the uploaded artifact archive. Assigned during
    /// upload, never read from the file.
    #[serde(skip_deserializing, default)]
    pub artifact_sha: Option<String>,
    /// Concrete user count derived from the allocation. Assigned after
    /// allocation defaulting, never read from the file.
    #[serde(skip_deserializing, default)]
    pub allocation_actual: Option<u32>,
}

/// Traffic capture configuration for a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Drop image requests from capture.
    #[serde(default = "default_true")]
    pub filter_images: bool,
    /// Drop well-known third-party JS from capture.
    #[serde(default = "default_true")]
    pub filter_common_third_party_js: bool,
    /// Drop audio/video from capture.
    #[serde(default = "default_true")]
    pub filter_multimedia: bool,
    /// Inline a custom proxy configuration file.
    #[serde(default)]
    pub use_custom_config: bool,
    /// Path of the custom configuration, relative to the config file.
    #[serde(default)]
    pub custom_config_path: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            filter_images: true,
            filter_common_third_party_js: true,
            filter_multimedia: true,
            use_custom_config: false,
            custom_config_path: None,
        }
    }
}

/// A CSV-backed data source for a profile.
#[derive(Debug, Clone, Deserialize)]
pub struct Databank {
    /// Databank name.
    pub name: String,
    /// CSV path, relative to the config file.
    pub path: String,
}

/// A named container image reference.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageRef {
    /// Name profiles refer to this image by.
    pub name: String,
    /// Registry the image is pulled from, when not the default.
    #[serde(default)]
    pub registry: Option<String>,
    /// Image tag, when not `latest`.
    #[serde(default)]
    pub tag: Option<String>,
}

/// A named SLA report definition. Everything except the name is passed
/// through to the console verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report name.
    pub name: String,
    /// The SLA definition body.
    #[serde(flatten)]
    pub definition: serde_yaml::Mapping,
}

fn default_think_time() -> String {
    DEFAULT_THINK_TIME.to_string()
}

fn default_iteration_delay() -> String {
    DEFAULT_ITERATION_DELAY.to_string()
}

const fn default_vus_per_vcpu() -> u32 {
    DEFAULT_VUS_PER_VCPU
}

const fn default_true() -> bool {
    true
}

/// Parses a percentage like `"40%"` into its numeric value.
pub(crate) fn parse_percent(value: &str) -> Option<u32> {
    value.strip_suffix('%')?.trim().parse().ok()
}

/// Parses the numeric prefix of a unit-suffixed value like `"30s"` or
/// `"5m"`. The unit is carried by convention, not converted.
pub(crate) fn numeric_prefix(value: &str) -> Option<u64> {
    let digits: String = value.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_defaults_apply() {
        let profile: Profile = serde_yaml::from_str(
            r"
            name: Shoppers
            artifact_dir: ./shoppers
            ",
        )
        .expect("parse profile");
        assert_eq!(profile.think_time, "30s");
        assert_eq!(profile.iteration_delay, "5s");
        assert_eq!(profile.vus_per_vcpu, 2);
        assert!(!profile.reset_session_after_iteration);
        assert!(profile.proxy_config.filter_images);
        assert!(!profile.proxy_config.use_custom_config);
        assert!(profile.allocation.is_none());
    }

    #[test]
    fn percent_parsing() {
        assert_eq!(parse_percent("40%"), Some(40));
        assert_eq!(parse_percent("100%"), Some(100));
        assert_eq!(parse_percent("40"), None);
        assert_eq!(parse_percent("forty%"), None);
    }

    #[test]
    fn numeric_prefix_parsing() {
        assert_eq!(numeric_prefix("30s"), Some(30));
        assert_eq!(numeric_prefix("5m"), Some(5));
        assert_eq!(numeric_prefix("90"), Some(90));
        assert_eq!(numeric_prefix("s"), None);
    }

    #[test]
    fn report_keeps_definition_body() {
        let report: Report = serde_yaml::from_str(
            r"
            name: checkout_sla
            checks:
              - metric: latency_p95
                max: 800
            ",
        )
        .expect("parse report");
        assert_eq!(report.name, "checkout_sla");
        assert!(report.definition.contains_key("checks"));
    }
}
