//! Services version skew checks.
//!
//! Version enforcement only applies to release-tagged services images
//! (`release-X.Y.Z`). Custom tags such as a developer build or a branch
//! tag are never compared.

use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;

use browserup_secrets::ClusterCredentials;

use crate::error::{ClusterError, Result};

/// The services version this CLI deploys and expects.
pub const SERVICES_VERSION: &str = "release-1.4.7";

static RELEASE_TAG: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)] // the pattern is a compile-time constant
    Regex::new(r"^release-\d+\.\d+\.\d+$").unwrap()
});

/// Whether a services tag is a release tag.
#[must_use]
pub fn is_release(tag: &str) -> bool {
    RELEASE_TAG.is_match(tag)
}

fn release_version(tag: &str) -> Option<Version> {
    Version::parse(tag.strip_prefix("release-")?).ok()
}

/// Compares two release tags; `None` when either is not a release tag.
#[must_use]
pub fn compare_releases(left: &str, right: &str) -> Option<std::cmp::Ordering> {
    Some(release_version(left)?.cmp(&release_version(right)?))
}

/// Fails when release-tagged cluster services and this CLI have diverged.
///
/// Custom tags and non-release tags pass; so do credentials with no
/// services tag at all.
///
/// # Errors
///
/// [`ClusterError::ClusterNewerThanCli`] or
/// [`ClusterError::ClusterOlderThanCli`] on version skew.
pub fn validate_cluster_version(credentials: &ClusterCredentials) -> Result<()> {
    if credentials.is_custom_services_image_tag {
        return Ok(());
    }
    let Some(cluster_tag) = credentials.services_image_tag.as_deref() else {
        return Ok(());
    };
    if !is_release(cluster_tag) {
        return Ok(());
    }

    match compare_releases(cluster_tag, SERVICES_VERSION) {
        Some(std::cmp::Ordering::Greater) => Err(ClusterError::ClusterNewerThanCli {
            cluster: cluster_tag.to_string(),
            cli: SERVICES_VERSION.to_string(),
        }),
        Some(std::cmp::Ordering::Less) => Err(ClusterError::ClusterOlderThanCli {
            cluster: cluster_tag.to_string(),
            cli: SERVICES_VERSION.to_string(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use browserup_secrets::CredentialParts;

    fn credentials_with_tag(tag: &str, custom: bool) -> ClusterCredentials {
        ClusterCredentials::new(
            CredentialParts {
                services_image_tag: Some(tag.to_string()),
                is_custom_services_image_tag: custom,
                ..Default::default()
            },
            &[],
        )
        .expect("valid credentials")
    }

    #[test]
    fn release_tag_detection() {
        assert!(is_release("release-1.4.7"));
        assert!(!is_release("release-1.4"));
        assert!(!is_release("my-branch"));
        assert!(!is_release("1.4.7"));
    }

    #[test]
    fn matching_version_passes() {
        validate_cluster_version(&credentials_with_tag(SERVICES_VERSION, false))
            .expect("same version is fine");
    }

    #[test]
    fn newer_cluster_is_rejected() {
        let err = validate_cluster_version(&credentials_with_tag("release-99.0.0", false));
        assert!(matches!(err, Err(ClusterError::ClusterNewerThanCli { .. })));
    }

    #[test]
    fn older_cluster_is_rejected() {
        let err = validate_cluster_version(&credentials_with_tag("release-0.1.0", false));
        assert!(matches!(err, Err(ClusterError::ClusterOlderThanCli { .. })));
    }

    #[test]
    fn custom_and_non_release_tags_are_ignored() {
        validate_cluster_version(&credentials_with_tag("release-99.0.0", true))
            .expect("custom tags skip the check");
        validate_cluster_version(&credentials_with_tag("nightly", false))
            .expect("non-release tags skip the check");
    }

    #[test]
    fn release_ordering_uses_semver_not_strings() {
        assert_eq!(
            compare_releases("release-1.10.0", "release-1.9.0"),
            Some(std::cmp::Ordering::Greater)
        );
    }
}
