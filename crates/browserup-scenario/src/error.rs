//! Scenario configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, validating, or translating a scenario
/// configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration file at the expected path.
    #[error("config missing at {}", path.display())]
    Missing {
        /// Where the file was expected.
        path: PathBuf,
    },

    /// The file is not valid YAML.
    #[error("config at {} is not a valid YAML file: {source}", path.display())]
    Yaml {
        /// The file that failed to parse.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The parsed configuration failed validation.
    #[error("invalid config at {}: {}", path.display(), problems.join(", "))]
    Invalid {
        /// The file that failed validation.
        path: PathBuf,
        /// Every validation problem found.
        problems: Vec<String>,
    },

    /// An allocation value is not a percentage like `"25%"`.
    #[error("invalid allocation \"{value}\", expected a percentage like \"25%\"")]
    BadPercent {
        /// The offending value.
        value: String,
    },

    /// Explicit allocations do not leave a valid split.
    #[error("profile allocations sum to {total}%, cannot allocate to 100%")]
    BadAllocationTotal {
        /// Sum of the explicit allocation percentages.
        total: u32,
    },

    /// A profile's proxy config references a custom config file that does
    /// not exist.
    #[error("\"use_custom_config\" specified, but no config file at {}", path.display())]
    ProxyConfigMissing {
        /// The missing file.
        path: PathBuf,
    },

    /// A profile's custom proxy config file is not valid YAML.
    #[error("proxy config at {} is not a valid YAML file: {source}", path.display())]
    ProxyConfigInvalid {
        /// The file that failed to parse.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A profile's databank file could not be read.
    #[error("databank not readable at {}: {source}", path.display())]
    DatabankUnreadable {
        /// The file that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading the configuration file failed.
    #[error("config file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for scenario configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_lists_every_problem() {
        let err = ConfigError::Invalid {
            path: PathBuf::from("browserup.load.yaml"),
            problems: vec![
                "duplicate profile name: Shoppers".to_string(),
                "profile \"Browsers\" must have an artifact_dir or image".to_string(),
            ],
        };
        let shown = err.to_string();
        assert!(shown.contains("duplicate profile name: Shoppers"));
        assert!(shown.contains("artifact_dir or image"));
    }
}
