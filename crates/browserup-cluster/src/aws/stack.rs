//! Stack model, tag-based discovery, and teardown planning.
//!
//! Every stack the CLI creates carries two tags: the cluster name and the
//! stack type. Discovery matches exact tag key/value pairs. Teardown
//! respects the hard dependency order: service stacks reference resources
//! owned by the compute stack's VPC, and minion stacks reference both, so
//! deletion runs services, then minions, then compute.

use serde::Deserialize;

/// Tag key carrying the owning cluster's name.
pub const TAG_CLUSTER_NAME: &str = "BROWSERUP_CLUSTER_NAME";

/// Tag key carrying the stack's role.
pub const TAG_STACK_TYPE: &str = "BROWSERUP_STACK_TYPE";

/// The roles a stack can play for a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackType {
    /// Shared compute and networking: VPC, security groups, ECS cluster.
    ClusterEcs,
    /// The workload services running on the cluster.
    ClusterEcsServices,
    /// A minion worker pool's compute.
    MinionsEcs,
    /// A minion pool's update hook back into the cluster.
    MinionsBuStackUpdate,
    /// A minion pool's networking.
    MinionsNetwork,
}

impl StackType {
    /// The tag value identifying this stack type.
    #[must_use]
    pub const fn tag_value(self) -> &'static str {
        match self {
            Self::ClusterEcs => "BROWSERUP_CLUSTER_ECS_STACK_TYPE",
            Self::ClusterEcsServices => "BROWSERUP_CLUSTER_ECS_SERVICES_STACK_TYPE",
            Self::MinionsEcs => "BROWSERUP_MINIONS_ECS_STACK_TYPE",
            Self::MinionsBuStackUpdate => "BROWSERUP_MINIONS_BU_STACK_UPDATE_STACK_TYPE",
            Self::MinionsNetwork => "BROWSERUP_MINIONS_NETWORK_STACK_TYPE",
        }
    }
}

/// A stack tag.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

/// One declared stack output.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    /// Output key.
    pub output_key: String,
    /// Output value.
    pub output_value: String,
}

/// One stack parameter.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    /// Parameter key.
    pub parameter_key: String,
    /// Parameter value, absent when the stack uses a previous value.
    #[serde(default)]
    pub parameter_value: Option<String>,
}

/// A deployed stack, as described by the provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Stack {
    /// Provider-assigned stack id.
    pub stack_id: String,
    /// Stack name.
    pub stack_name: String,
    /// Current status, e.g. `CREATE_COMPLETE`.
    pub stack_status: String,
    /// Stack tags.
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Declared outputs.
    #[serde(default)]
    pub outputs: Vec<Output>,
    /// Stack parameters.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl Stack {
    /// Whether the stack carries the exact tag key/value pair.
    #[must_use]
    pub fn has_tag(&self, key: &str, value: &str) -> bool {
        self.tags.iter().any(|t| t.key == key && t.value == value)
    }

    /// The value of a declared output, when present.
    #[must_use]
    pub fn output(&self, key: &str) -> Option<&str> {
        self.outputs
            .iter()
            .find(|o| o.output_key == key)
            .map(|o| o.output_value.as_str())
    }
}

/// Whether a status string reports a failed or deleting stack, which is
/// terminal for a creation wait.
#[must_use]
pub fn is_failed_or_deleting(status: &str) -> bool {
    let lowered = status.to_lowercase();
    lowered.contains("fail") || lowered.contains("delete")
}

/// Stacks matching every given tag key/value pair exactly.
#[must_use]
pub fn stacks_by_tags(stacks: &[Stack], filters: &[(&str, &str)]) -> Vec<Stack> {
    stacks
        .iter()
        .filter(|stack| filters.iter().all(|(key, value)| stack.has_tag(key, value)))
        .cloned()
        .collect()
}

/// Stacks of one type belonging to one cluster.
#[must_use]
pub fn cluster_stacks(
    stacks: &[Stack],
    cluster_name: &str,
    stack_type: StackType,
) -> Vec<Stack> {
    stacks_by_tags(
        stacks,
        &[
            (TAG_CLUSTER_NAME, cluster_name),
            (TAG_STACK_TYPE, stack_type.tag_value()),
        ],
    )
}

/// One teardown stage: a label and the stacks deleted together.
#[derive(Debug, Clone)]
pub struct TeardownStage {
    /// What this stage removes.
    pub label: &'static str,
    /// The stacks deleted in this stage.
    pub stacks: Vec<Stack>,
}

/// The ordered teardown plan for one cluster within one region.
///
/// Stage N's deletions are confirmed gone before stage N+1 begins. An
/// empty stage is a no-op, not an error.
#[derive(Debug, Clone)]
pub struct TeardownPlan {
    /// Stages in deletion order.
    pub stages: Vec<TeardownStage>,
}

/// Plans teardown for `cluster_name` from the region's stacks, regardless
/// of the order discovery returned them in.
#[must_use]
pub fn teardown_stages(stacks: &[Stack], cluster_name: &str) -> TeardownPlan {
    TeardownPlan {
        stages: vec![
            TeardownStage {
                label: "service stacks",
                stacks: cluster_stacks(stacks, cluster_name, StackType::ClusterEcsServices),
            },
            TeardownStage {
                label: "minion compute stacks",
                stacks: cluster_stacks(stacks, cluster_name, StackType::MinionsEcs),
            },
            TeardownStage {
                label: "minion update stacks",
                stacks: cluster_stacks(stacks, cluster_name, StackType::MinionsBuStackUpdate),
            },
            TeardownStage {
                label: "minion network stacks",
                stacks: cluster_stacks(stacks, cluster_name, StackType::MinionsNetwork),
            },
            TeardownStage {
                label: "cluster compute stack",
                stacks: cluster_stacks(stacks, cluster_name, StackType::ClusterEcs),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(name: &str, cluster: &str, stack_type: StackType) -> Stack {
        Stack {
            stack_id: format!("arn:aws:cloudformation:::stack/{name}"),
            stack_name: name.to_string(),
            stack_status: "CREATE_COMPLETE".to_string(),
            tags: vec![
                Tag {
                    key: TAG_CLUSTER_NAME.to_string(),
                    value: cluster.to_string(),
                },
                Tag {
                    key: TAG_STACK_TYPE.to_string(),
                    value: stack_type.tag_value().to_string(),
                },
            ],
            outputs: Vec::new(),
            parameters: Vec::new(),
        }
    }

    #[test]
    fn tag_filters_match_exact_pairs() {
        let stacks = vec![
            stack("svc-a", "BrowserUp-one", StackType::ClusterEcsServices),
            stack("svc-b", "BrowserUp-two", StackType::ClusterEcsServices),
            stack("compute-a", "BrowserUp-one", StackType::ClusterEcs),
        ];

        let found = cluster_stacks(&stacks, "BrowserUp-one", StackType::ClusterEcsServices);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].stack_name, "svc-a");
    }

    #[test]
    fn teardown_orders_services_then_minions_then_compute() {
        // Discovery order deliberately scrambled.
        let stacks = vec![
            stack("compute", "BrowserUp-one", StackType::ClusterEcs),
            stack("minions", "BrowserUp-one", StackType::MinionsEcs),
            stack("services", "BrowserUp-one", StackType::ClusterEcsServices),
            stack("minions-net", "BrowserUp-one", StackType::MinionsNetwork),
            stack("minions-update", "BrowserUp-one", StackType::MinionsBuStackUpdate),
        ];

        let plan = teardown_stages(&stacks, "BrowserUp-one");
        let order: Vec<&str> = plan
            .stages
            .iter()
            .flat_map(|stage| stage.stacks.iter().map(|s| s.stack_name.as_str()))
            .collect();

        let services_pos = order.iter().position(|n| *n == "services").expect("services");
        let minions_pos = order.iter().position(|n| *n == "minions").expect("minions");
        let compute_pos = order.iter().position(|n| *n == "compute").expect("compute");
        assert!(services_pos < minions_pos);
        assert!(minions_pos < compute_pos);
        assert_eq!(order.last(), Some(&"compute"));
    }

    #[test]
    fn teardown_ignores_other_clusters() {
        let stacks = vec![
            stack("other-svc", "BrowserUp-two", StackType::ClusterEcsServices),
            stack("compute", "BrowserUp-one", StackType::ClusterEcs),
        ];
        let plan = teardown_stages(&stacks, "BrowserUp-one");
        let total: usize = plan.stages.iter().map(|s| s.stacks.len()).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn empty_region_plans_empty_stages() {
        let plan = teardown_stages(&[], "BrowserUp-one");
        assert_eq!(plan.stages.len(), 5);
        assert!(plan.stages.iter().all(|s| s.stacks.is_empty()));
    }

    #[test]
    fn failed_or_deleting_status_detection() {
        assert!(is_failed_or_deleting("CREATE_FAILED"));
        assert!(is_failed_or_deleting("ROLLBACK_FAILED"));
        assert!(is_failed_or_deleting("DELETE_IN_PROGRESS"));
        assert!(!is_failed_or_deleting("CREATE_IN_PROGRESS"));
        assert!(!is_failed_or_deleting("CREATE_COMPLETE"));
    }

    #[test]
    fn stack_output_lookup() {
        let mut s = stack("compute", "BrowserUp-one", StackType::ClusterEcs);
        s.outputs.push(Output {
            output_key: "VpcId".to_string(),
            output_value: "vpc-123".to_string(),
        });
        assert_eq!(s.output("VpcId"), Some("vpc-123"));
        assert_eq!(s.output("Missing"), None);
    }

    #[test]
    fn describe_stacks_json_deserializes() {
        let raw = r#"{
            "StackId": "arn:aws:cloudformation:us-east-1:123:stack/ClusterStack-BrowserUp-abc/guid",
            "StackName": "ClusterStack-BrowserUp-abc",
            "StackStatus": "CREATE_COMPLETE",
            "Tags": [{"Key": "BROWSERUP_CLUSTER_NAME", "Value": "BrowserUp-abc"}],
            "Outputs": [{"OutputKey": "VpcId", "OutputValue": "vpc-1"}],
            "Parameters": [{"ParameterKey": "EcsClusterName", "ParameterValue": "BrowserUp-abc"}]
        }"#;
        let parsed: Stack = serde_json::from_str(raw).expect("parse stack");
        assert_eq!(parsed.stack_name, "ClusterStack-BrowserUp-abc");
        assert!(parsed.has_tag(TAG_CLUSTER_NAME, "BrowserUp-abc"));
        assert_eq!(parsed.output("VpcId"), Some("vpc-1"));
    }
}
