//! Cluster name generation.

use browserup_secrets::{
    friendly_token, ClusterType, CLUSTER_NAME_LOCAL_PREFIX, CLUSTER_NAME_PREFIX,
};

/// Generates the name for a new cluster.
///
/// Local clusters share one fixed name (only one can exist per machine);
/// remote clusters get a random suffix so several can coexist in an
/// account.
#[must_use]
pub fn generate_cluster_name(cluster_type: ClusterType) -> String {
    match cluster_type {
        ClusterType::Local => CLUSTER_NAME_LOCAL_PREFIX.to_string(),
        ClusterType::Aws => format!("{CLUSTER_NAME_PREFIX}-{}", friendly_token(6).to_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_name_is_fixed() {
        assert_eq!(generate_cluster_name(ClusterType::Local), "BrowserUpLocal");
    }

    #[test]
    fn remote_names_are_prefixed_and_unique() {
        let first = generate_cluster_name(ClusterType::Aws);
        let second = generate_cluster_name(ClusterType::Aws);
        assert!(first.starts_with(CLUSTER_NAME_PREFIX));
        assert_ne!(first, second);
    }
}
