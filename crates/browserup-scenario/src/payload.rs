//! Translation of a validated scenario into the web console's payload
//! shape.
//!
//! The console expects profiles keyed by position, durations as bare
//! numbers, ramp stages as discrete time-boxed stages with target user
//! counts, and any custom proxy configuration inlined as file content.

use std::collections::BTreeMap;
use std::fs;

use serde::Serialize;
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::loader::LoadConfig;
use crate::model::{numeric_prefix, parse_percent, Profile, ProxyConfig, Scenario};

const DEFAULT_THINK_DURATION: u64 = 30;
const DEFAULT_ITERATION_DELAY_DURATION: u64 = 10;

/// The create-or-update request body.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioPayload {
    /// The scenario body.
    pub scenario: ScenarioBody,
}

/// The scenario portion of the payload.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioBody {
    /// Scenario name.
    pub name: String,
    /// Total duration in minutes.
    pub total_time_minutes: u64,
    /// Profiles keyed by position.
    pub profiles: BTreeMap<usize, ProfilePayload>,
    /// Time-boxed stages derived from the ramp definition.
    pub stages: Vec<StagePayload>,
}

/// One profile in the console's shape.
#[derive(Debug, Clone, Serialize)]
pub struct ProfilePayload {
    /// Profile name.
    pub name: String,
    /// Allocation percentage.
    pub percent: u32,
    /// Seconds between iterations.
    pub iteration_delay_duration: u64,
    /// Whether the session resets between iterations.
    pub reset_session_after_iteration: bool,
    /// Iteration command.
    pub command: Option<String>,
    /// Think time in seconds.
    pub think_duration: u64,
    /// Proxy configuration with any custom config inlined.
    pub proxy_config: ProxyConfigPayload,
    /// Image reference, when the profile runs a named image.
    pub image: Option<ImagePayload>,
    /// Inlined databank CSV content.
    pub databank: Option<String>,
    /// Virtual users per vCPU.
    pub vus_per_vcpu: u32,
    /// Region override for this profile's minions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Content hash of the uploaded artifact archive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_sha: Option<String>,
}

/// Proxy configuration in the console's shape.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyConfigPayload {
    /// Drop image requests from capture.
    pub filter_images: bool,
    /// Drop well-known third-party JS from capture.
    pub filter_common_third_party_js: bool,
    /// Drop audio/video from capture.
    pub filter_multimedia: bool,
    /// Whether a custom configuration is inlined.
    pub use_custom_config: bool,
    /// The inlined custom configuration file content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_config: Option<String>,
}

/// Image reference in the console's shape.
#[derive(Debug, Clone, Serialize)]
pub struct ImagePayload {
    /// Image name.
    pub name: String,
    /// Registry, when not the default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_name: Option<String>,
    /// Tag, when not `latest`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// One time-boxed stage.
#[derive(Debug, Clone, Serialize)]
pub struct StagePayload {
    /// Stage order.
    pub position: usize,
    /// Stage duration in the ramp's units.
    pub duration: u64,
    /// `ramp_to` or `constant`.
    pub stage_type: String,
    /// `even` for ramps, `immediate` for the constant phase.
    pub throttle_type: String,
    /// Concurrent users targeted at the end of the stage.
    pub target_users_count: u32,
}

/// Builds the full scenario payload for create-or-update.
///
/// # Errors
///
/// Returns an error when a custom proxy config or databank file referenced
/// by a profile is missing or unreadable.
pub fn prepare_scenario_payload(config: &LoadConfig) -> Result<ScenarioPayload> {
    let scenario = config.scenario();
    debug!(scenario = %scenario.name, "preparing scenario payload");

    let mut profiles = BTreeMap::new();
    for (position, profile) in scenario.profiles.iter().enumerate() {
        profiles.insert(position, prepare_profile_payload(profile, config)?);
    }

    Ok(ScenarioPayload {
        scenario: ScenarioBody {
            name: scenario.name.clone(),
            total_time_minutes: numeric_prefix(&scenario.stop_after).unwrap_or(0),
            profiles,
            stages: prepare_stages(scenario),
        },
    })
}

fn prepare_profile_payload(profile: &Profile, config: &LoadConfig) -> Result<ProfilePayload> {
    let image = profile.image.as_deref().and_then(|name| {
        config.image(name).map(|image| ImagePayload {
            name: image.name.clone(),
            registry_name: image.registry.clone(),
            tag: image.tag.clone(),
        })
    });

    let databank = match &profile.databank {
        Some(databank) => {
            let path = config.root_dir().join(&databank.path);
            Some(
                fs::read_to_string(&path)
                    .map_err(|source| ConfigError::DatabankUnreadable { path, source })?,
            )
        }
        None => None,
    };

    Ok(ProfilePayload {
        name: profile.name.clone(),
        percent: profile
            .allocation
            .as_deref()
            .and_then(parse_percent)
            .unwrap_or(0),
        iteration_delay_duration: numeric_prefix(&profile.iteration_delay)
            .unwrap_or(DEFAULT_ITERATION_DELAY_DURATION),
        reset_session_after_iteration: profile.reset_session_after_iteration,
        command: profile.command.clone(),
        think_duration: numeric_prefix(&profile.think_time).unwrap_or(DEFAULT_THINK_DURATION),
        proxy_config: prepare_proxy_config(&profile.proxy_config, config)?,
        image,
        databank,
        vus_per_vcpu: profile.vus_per_vcpu,
        region: profile.region.clone(),
        artifact_sha: profile.artifact_sha.clone(),
    })
}

fn prepare_proxy_config(
    proxy_config: &ProxyConfig,
    config: &LoadConfig,
) -> Result<ProxyConfigPayload> {
    let custom_config = if proxy_config.use_custom_config {
        let relative = proxy_config.custom_config_path.clone().unwrap_or_default();
        let path = config.root_dir().join(relative);
        if !path.is_file() {
            return Err(ConfigError::ProxyConfigMissing { path });
        }
        let content = fs::read_to_string(&path)?;
        serde_yaml::from_str::<serde_yaml::Value>(&content)
            .map_err(|source| ConfigError::ProxyConfigInvalid { path, source })?;
        Some(content)
    } else {
        None
    };

    Ok(ProxyConfigPayload {
        filter_images: proxy_config.filter_images,
        filter_common_third_party_js: proxy_config.filter_common_third_party_js,
        filter_multimedia: proxy_config.filter_multimedia,
        use_custom_config: proxy_config.use_custom_config,
        custom_config,
    })
}

fn prepare_stages(scenario: &Scenario) -> Vec<StagePayload> {
    let mut stages = Vec::new();
    let mut ramp_duration: u64 = 0;

    for (position, ramp) in scenario.ramp.iter().enumerate() {
        let ramp_to = parse_percent(&ramp.ramp_to).unwrap_or(0);
        let duration = numeric_prefix(&ramp.over).unwrap_or(0);
        ramp_duration += duration;

        stages.push(StagePayload {
            position,
            duration,
            stage_type: "ramp_to".to_string(),
            throttle_type: "even".to_string(),
            target_users_count: (f64::from(scenario.total_users) * f64::from(ramp_to) / 100.0)
                .round() as u32,
        });
    }

    let total_time = numeric_prefix(&scenario.stop_after).unwrap_or(0);
    if total_time > ramp_duration {
        stages.push(StagePayload {
            position: scenario.ramp.len(),
            duration: total_time - ramp_duration,
            stage_type: "constant".to_string(),
            throttle_type: "immediate".to_string(),
            target_users_count: scenario.total_users,
        });
    }

    stages
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn config_with(contents: &str) -> (TempDir, LoadConfig) {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("browserup.load.yaml");
        let mut file = fs::File::create(&path).expect("create");
        file.write_all(contents.as_bytes()).expect("write");
        let config = LoadConfig::load(&path).expect("load");
        (dir, config)
    }

    const RAMPED: &str = r"
scenario:
  name: ramped
  total_users: 20
  stop_after: 30m
  ramp:
    - ramp_to: 50%
      over: 5m
    - ramp_to: 100%
      over: 10m
  profiles:
    - name: Shoppers
      allocation: 40%
      artifact_dir: .
    - name: Browsers
      artifact_dir: .
";

    #[test]
    fn stages_cover_ramp_then_constant_phase() {
        let (_dir, config) = config_with(RAMPED);
        let payload = prepare_scenario_payload(&config).expect("payload");

        let stages = &payload.scenario.stages;
        assert_eq!(stages.len(), 3);

        assert_eq!(stages[0].stage_type, "ramp_to");
        assert_eq!(stages[0].throttle_type, "even");
        assert_eq!(stages[0].duration, 5);
        assert_eq!(stages[0].target_users_count, 10);

        assert_eq!(stages[1].target_users_count, 20);

        assert_eq!(stages[2].stage_type, "constant");
        assert_eq!(stages[2].throttle_type, "immediate");
        assert_eq!(stages[2].duration, 15);
        assert_eq!(stages[2].target_users_count, 20);
        assert_eq!(payload.scenario.total_time_minutes, 30);
    }

    #[test]
    fn profiles_are_keyed_by_position_with_defaulted_fields() {
        let (_dir, config) = config_with(RAMPED);
        let payload = prepare_scenario_payload(&config).expect("payload");

        let profiles = &payload.scenario.profiles;
        assert_eq!(profiles.len(), 2);
        let first = profiles.get(&0).expect("first profile");
        assert_eq!(first.name, "Shoppers");
        assert_eq!(first.percent, 40);
        assert_eq!(first.think_duration, 30);
        assert_eq!(first.iteration_delay_duration, 5);
        assert_eq!(first.vus_per_vcpu, 2);
        let second = profiles.get(&1).expect("second profile");
        assert_eq!(second.percent, 60);
    }

    #[test]
    fn payload_serializes_with_string_keys() {
        let (_dir, config) = config_with(RAMPED);
        let payload = prepare_scenario_payload(&config).expect("payload");
        let json = serde_json::to_value(&payload).expect("to json");
        assert!(json["scenario"]["profiles"]["0"]["name"] == "Shoppers");
        assert!(json["scenario"]["profiles"]["0"].get("region").is_none());
    }

    #[test]
    fn custom_proxy_config_is_inlined() {
        let dir = TempDir::new().expect("tempdir");
        let proxy_path = dir.path().join("proxy.yaml");
        fs::write(&proxy_path, "har_capture: full\n").expect("write proxy config");
        let config_path = dir.path().join("browserup.load.yaml");
        fs::write(
            &config_path,
            r"
scenario:
  name: proxied
  total_users: 2
  stop_after: 10m
  profiles:
    - name: P
      artifact_dir: .
      proxy_config:
        use_custom_config: true
        custom_config_path: proxy.yaml
",
        )
        .expect("write config");

        let config = LoadConfig::load(&config_path).expect("load");
        let payload = prepare_scenario_payload(&config).expect("payload");
        let proxy = &payload.scenario.profiles[&0].proxy_config;
        assert!(proxy.use_custom_config);
        assert_eq!(proxy.custom_config.as_deref(), Some("har_capture: full\n"));
    }

    #[test]
    fn missing_custom_proxy_config_fails() {
        let (_dir, config) = config_with(
            r"
scenario:
  name: proxied
  total_users: 2
  stop_after: 10m
  profiles:
    - name: P
      artifact_dir: .
      proxy_config:
        use_custom_config: true
        custom_config_path: nowhere.yaml
",
        );
        let err = prepare_scenario_payload(&config);
        assert!(matches!(err, Err(ConfigError::ProxyConfigMissing { .. })));
    }

    #[test]
    fn databank_content_is_inlined() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("users.csv"), "user,pass\na,b\n").expect("write csv");
        let config_path = dir.path().join("browserup.load.yaml");
        fs::write(
            &config_path,
            r"
scenario:
  name: banked
  total_users: 2
  stop_after: 10m
  profiles:
    - name: P
      artifact_dir: .
      databank:
        name: users
        path: users.csv
",
        )
        .expect("write config");

        let config = LoadConfig::load(&config_path).expect("load");
        let payload = prepare_scenario_payload(&config).expect("payload");
        assert_eq!(
            payload.scenario.profiles[&0].databank.as_deref(),
            Some("user,pass\na,b\n")
        );
    }
}
