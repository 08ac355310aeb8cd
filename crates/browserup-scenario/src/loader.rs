//! Loading and validating the configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::allocation::populate_allocations;
use crate::error::{ConfigError, Result};
use crate::model::{ConfigModel, ImageRef, Profile, Report, Scenario};

/// Report and image names must be safe to use as file names on the console
/// side: letters, digits, underscores, periods and dashes, 2 to 40 chars,
/// no leading/trailing period.
static FILE_SAFE_NAME: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)] // the pattern is a compile-time constant
    Regex::new(r"^[A-Za-z0-9_-][A-Za-z0-9_.-]{0,38}[A-Za-z0-9_-]$").unwrap()
});

/// A loaded, validated configuration with its on-disk location.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    model: ConfigModel,
    config_path: PathBuf,
}

impl LoadConfig {
    /// Loads the configuration at `path`, applies defaults, and validates.
    ///
    /// # Errors
    ///
    /// Returns an error when the file is missing, is not valid YAML, or
    /// fails any validation rule. All validation problems are reported
    /// together in [`ConfigError::Invalid`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config_path = path.as_ref().to_path_buf();
        debug!(path = %config_path.display(), "loading config");

        if !config_path.is_file() {
            return Err(ConfigError::Missing { path: config_path });
        }

        let raw = fs::read_to_string(&config_path)?;
        let mut model: ConfigModel =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
                path: config_path.clone(),
                source,
            })?;

        populate_allocations(&mut model.scenario.profiles, model.scenario.total_users)?;

        let problems = validate(&model);
        if !problems.is_empty() {
            return Err(ConfigError::Invalid {
                path: config_path,
                problems,
            });
        }

        Ok(Self { model, config_path })
    }

    /// The validated scenario.
    #[must_use]
    pub fn scenario(&self) -> &Scenario {
        &self.model.scenario
    }

    /// Mutable scenario access, used while artifact hashes are assigned.
    pub fn scenario_mut(&mut self) -> &mut Scenario {
        &mut self.model.scenario
    }

    /// Named SLA report definitions.
    #[must_use]
    pub fn reports(&self) -> &[Report] {
        &self.model.reports
    }

    /// Resolves an image reference by name.
    #[must_use]
    pub fn image(&self, name: &str) -> Option<&ImageRef> {
        self.model.images.iter().find(|i| i.name == name)
    }

    /// The configured cluster type, when the file pins one.
    #[must_use]
    pub fn cluster_type(&self) -> Option<&str> {
        self.model.browserup.cluster_type.as_deref()
    }

    /// Where the config file lives.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Directory the config file lives in; relative profile paths resolve
    /// against this.
    #[must_use]
    pub fn root_dir(&self) -> &Path {
        self.config_path.parent().unwrap_or_else(|| Path::new("."))
    }
}

fn validate(model: &ConfigModel) -> Vec<String> {
    let mut problems = Vec::new();

    validate_profiles(&model.scenario.profiles, &model.images, &mut problems);

    for image in &model.images {
        if !FILE_SAFE_NAME.is_match(&image.name) {
            problems.push(format!(
                "invalid image name \"{}\": only letters, numbers, underscores, periods, and dashes are allowed",
                image.name
            ));
        }
    }

    for report in &model.reports {
        if !FILE_SAFE_NAME.is_match(&report.name) {
            problems.push(format!(
                "invalid report name \"{}\": only letters, numbers, underscores, periods, and dashes are allowed",
                report.name
            ));
        }
    }

    problems
}

fn validate_profiles(profiles: &[Profile], images: &[ImageRef], problems: &mut Vec<String>) {
    for (i, profile) in profiles.iter().enumerate() {
        if profiles[..i].iter().any(|p| p.name == profile.name) {
            problems.push(format!(
                "scenario profiles must have unique names, found duplicate: {}",
                profile.name
            ));
        }

        if profile.artifact_dir.is_none() && profile.image.is_none() {
            problems.push(format!(
                "invalid profile \"{}\": profile must contain an artifact_dir or image",
                profile.name
            ));
        }

        if let Some(image) = &profile.image {
            if !images.iter().any(|i| &i.name == image) {
                problems.push(format!(
                    "profile \"{}\" has non-existent image: \"{image}\"",
                    profile.name
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const VALID_CONFIG: &str = r#"
scenario:
  name: checkout_load
  total_users: 10
  stop_after: 30m
  ramp:
    - ramp_to: 100%
      over: 5m
  profiles:
    - name: Shoppers
      allocation: 40%
      command: ruby shop.rb
      artifact_dir: ./shoppers
    - name: Browsers
      command: ruby browse.rb
      artifact_dir: ./browsers
reports:
  - name: checkout_sla
    checks:
      - metric: latency_p95
        max: 800
images:
  - name: loadgen
    registry: docker.io/browserup
    tag: release-1.4.7
browserup:
  cluster_type: local
"#;

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("browserup.load.yaml");
        let mut file = fs::File::create(&path).expect("create config");
        file.write_all(contents.as_bytes()).expect("write config");
        path
    }

    #[test]
    fn loads_and_defaults_a_valid_config() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(&dir, VALID_CONFIG);

        let config = LoadConfig::load(&path).expect("load config");
        let scenario = config.scenario();
        assert_eq!(scenario.name, "checkout_load");
        assert_eq!(scenario.profiles[0].allocation_actual, Some(4));
        assert_eq!(scenario.profiles[1].allocation.as_deref(), Some("60%"));
        assert_eq!(scenario.profiles[1].allocation_actual, Some(6));
        assert_eq!(config.cluster_type(), Some("local"));
        assert!(config.image("loadgen").is_some());
        assert_eq!(config.root_dir(), dir.path());
    }

    #[test]
    fn missing_file_is_reported() {
        let err = LoadConfig::load("/nonexistent/browserup.load.yaml");
        assert!(matches!(err, Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn unparseable_yaml_is_reported() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(&dir, "scenario: [not: closed");
        let err = LoadConfig::load(&path);
        assert!(matches!(err, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn duplicate_profile_names_fail_validation() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(
            &dir,
            r"
scenario:
  name: dupes
  total_users: 4
  stop_after: 10m
  profiles:
    - name: Same
      artifact_dir: .
    - name: Same
      artifact_dir: .
",
        );
        match LoadConfig::load(&path) {
            Err(ConfigError::Invalid { problems, .. }) => {
                assert!(problems.iter().any(|p| p.contains("unique names")));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn profile_needs_artifact_dir_or_image() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(
            &dir,
            r"
scenario:
  name: bare
  total_users: 2
  stop_after: 10m
  profiles:
    - name: Naked
",
        );
        match LoadConfig::load(&path) {
            Err(ConfigError::Invalid { problems, .. }) => {
                assert!(problems
                    .iter()
                    .any(|p| p.contains("artifact_dir or image")));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn unknown_image_reference_fails_validation() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(
            &dir,
            r"
scenario:
  name: bad_image
  total_users: 2
  stop_after: 10m
  profiles:
    - name: Imager
      image: missing_image
",
        );
        match LoadConfig::load(&path) {
            Err(ConfigError::Invalid { problems, .. }) => {
                assert!(problems.iter().any(|p| p.contains("non-existent image")));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn unsafe_report_name_fails_validation() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(
            &dir,
            r"
scenario:
  name: reports
  total_users: 2
  stop_after: 10m
  profiles:
    - name: P
      artifact_dir: .
reports:
  - name: ../escape
    checks: []
",
        );
        match LoadConfig::load(&path) {
            Err(ConfigError::Invalid { problems, .. }) => {
                assert!(problems.iter().any(|p| p.contains("invalid report name")));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }
}
