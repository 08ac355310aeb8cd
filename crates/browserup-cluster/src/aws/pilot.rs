//! The remote cluster pilot: AWS stack lifecycle.
//!
//! Create sequence: compute stack, wait, read outputs, resolve the ingress
//! IP, services stack, wait, dashboards, web console health, persist
//! credentials. Any failure along the way triggers a best-effort destroy
//! of whatever was created, then the original error is re-raised.
//!
//! There is no cancellation model beyond process termination; an operator
//! who interrupts a deploy mid-flight recovers by running destroy.

use std::collections::BTreeMap;
use std::env;
use std::io::BufRead;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use browserup_console::ConsoleClient;
use browserup_secrets::{
    ClusterCredentials, ClusterType, CredentialParts, CredentialsRepository,
};
use browserup_wait::WaitStrategy;

use crate::aws::cf::{CfClient, ResourceChange, StackRef, StackRequest};
use crate::aws::ec2::{public_ip, validate_aws_credentials, Ec2Client};
use crate::aws::dashboards::GrafanaClient;
use crate::aws::stack::{
    cluster_stacks, teardown_stages, Stack, StackType, TAG_CLUSTER_NAME, TAG_STACK_TYPE,
};
use crate::error::{ClusterError, Result};
use crate::params::RemoteClusterParams;
use crate::secrets_provider::cluster_secrets;
use crate::version::SERVICES_VERSION;

/// Named template for the shared compute/networking stack.
const CLUSTER_STACK_TEMPLATE: &str = include_str!("../../resources/cluster_stack.yaml");
/// Named template for the workload services stack.
const SERVICES_STACK_TEMPLATE: &str = include_str!("../../resources/services_stack.yaml");

const GRAFANA_DATASOURCE_YAML: &str =
    include_str!("../../resources/grafana-datasource.yaml");
const GRAFANA_DASHBOARDS_PROVIDER_YAML: &str =
    include_str!("../../resources/grafana-dashboards-provider.yaml");
const FLUENT_BIT_CONF: &str = include_str!("../../resources/fluent-bit.conf");
const LOKI_CONFIG_YAML: &str = include_str!("../../resources/loki-config.yaml");
const PROMETHEUS_YML: &str = include_str!("../../resources/prometheus.yml");
const ZOOKEEPER_CFG: &str = include_str!("../../resources/zoo.cfg");

/// Ingress CIDR when the caller's IP is unknown or no key pair was given.
const DEFAULT_INGRESS_IP: &str = "0.0.0.0";

/// Outputs declared by the compute stack, consumed by the services stack.
#[derive(Debug, Clone)]
struct ClusterStackOutputs {
    sg_id: String,
    vpc_id: String,
    private_namespace_id: String,
    nginx_asg_id: String,
    instance_profile_arn: String,
    ecs_instance_role_arn: String,
    private_subnet_ids: String,
    public_subnet_ids: String,
    task_def_role_arn: String,
}

impl ClusterStackOutputs {
    fn from_stack(stack: &Stack) -> Result<Self> {
        let output = |key: &str| -> Result<String> {
            stack
                .output(key)
                .map(str::to_owned)
                .ok_or_else(|| ClusterError::AwsOutput {
                    action: "cloudformation describe-stacks".to_string(),
                    reason: format!(
                        "stack {} declared no \"{key}\" output",
                        stack.stack_name
                    ),
                })
        };
        Ok(Self {
            sg_id: output("SgId")?,
            vpc_id: output("VpcId")?,
            private_namespace_id: output("PrivateNamespaceId")?,
            nginx_asg_id: output("NginxAsgId")?,
            instance_profile_arn: output("InstanceProfileArn")?,
            ecs_instance_role_arn: output("EcsInstanceRoleArn")?,
            private_subnet_ids: output("PrivateSubnetIds")?,
            public_subnet_ids: output("PublicSubnetIds")?,
            task_def_role_arn: output("TaskDefinitionsRoleArn")?,
        })
    }
}

/// Orchestrates remote cluster create / destroy / upgrade through the
/// cloud provider's stack service.
#[derive(Debug, Clone)]
pub struct AwsClusterPilot {
    region: String,
}

impl AwsClusterPilot {
    /// A pilot for `region`.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    /// Deploys a remote cluster and returns its credentials.
    ///
    /// On any failure after stack creation begins, already-created stacks
    /// are destroyed best-effort and saved secrets are cleared before the
    /// original error is returned.
    ///
    /// # Errors
    ///
    /// Credential/key-pair validation failures, stack creation failures,
    /// wait timeouts, and web console readiness failures.
    pub async fn create_cluster(
        &self,
        params: &RemoteClusterParams,
        cluster_name: &str,
        repository: &mut CredentialsRepository,
    ) -> Result<ClusterCredentials> {
        validate_aws_credentials().await?;
        let ec2 = Ec2Client::new(&self.region);

        let key_pair_name = if params.create_key_pair {
            ec2.create_key_pair(cluster_name).await?;
            Some(cluster_name.to_string())
        } else {
            if let Some(name) = params
                .key_pair_name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
            {
                ec2.validate_key_pair(name).await?;
            }
            params.key_pair_name.clone()
        };

        info!(cluster = cluster_name, region = %self.region, "creating cluster");
        match self
            .create_cluster_inner(params, cluster_name, key_pair_name.as_deref(), repository)
            .await
        {
            Ok(credentials) => Ok(credentials),
            Err(e) => {
                error!(
                    cluster = cluster_name,
                    region = %self.region,
                    error = %e,
                    "failed to initialize cluster; any created stacks will be destroyed"
                );
                if let Err(cleanup) = self.destroy_cluster(cluster_name).await {
                    warn!(error = %cleanup, "best-effort cleanup failed");
                }
                if let Err(cleanup) = repository.clear() {
                    warn!(error = %cleanup, "could not clear saved secrets");
                }
                Err(e)
            }
        }
    }

    async fn create_cluster_inner(
        &self,
        params: &RemoteClusterParams,
        cluster_name: &str,
        key_pair_name: Option<&str>,
        repository: &mut CredentialsRepository,
    ) -> Result<ClusterCredentials> {
        let secrets = cluster_secrets(repository.store_mut())?;
        let cf = CfClient::new(&self.region);
        let ec2 = Ec2Client::new(&self.region);

        let cluster_stack = self
            .create_cluster_stack(&cf, &ec2, params, cluster_name, key_pair_name, &secrets)
            .await?;
        let outputs = ClusterStackOutputs::from_stack(&cluster_stack)?;

        let cluster_public_ip = ec2.asg_instance_public_ip(&outputs.nginx_asg_id).await?;
        debug!(ip = %cluster_public_ip, "resolved cluster ingress IP");

        self.create_service_stack(
            &cf,
            params,
            cluster_name,
            &outputs,
            &cluster_public_ip,
            &secrets,
        )
        .await?;

        let protocol = secrets
            .get("WEBCONSOLE_PROTOCOL")
            .map_or("http", String::as_str);
        let webconsole_url = format!("{protocol}://{cluster_public_ip}");

        let grafana = GrafanaClient::new(
            &webconsole_url,
            secrets.get("GRAFANA_PORT").map_or("", String::as_str),
            secrets.get("GRAFANA_USERNAME").map_or("", String::as_str),
            secrets.get("GRAFANA_PASSWORD").map_or("", String::as_str),
        );
        grafana.create_zookeeper_dashboard().await;
        grafana.create_default_dashboard().await;

        ConsoleClient::wait_for_ready(&webconsole_url).await?;
        info!(cluster = cluster_name, "service stack created successfully");

        let credentials = ClusterCredentials::new(
            CredentialParts {
                cluster_url: Some(webconsole_url),
                cluster_type: Some(ClusterType::Aws.as_str().to_string()),
                api_token: Some(params.api_token.clone()),
                cluster_name: Some(cluster_name.to_string()),
                region: Some(self.region.clone()),
                services_image_tag: Some(params.services_image_tag().to_string()),
                standard_image_tag: params.standard_image_tag.clone(),
                is_custom_services_image_tag: params.is_custom_services_image_tag(),
            },
            &[],
        )?;
        repository.save(&credentials)?;
        Ok(credentials)
    }

    async fn create_cluster_stack(
        &self,
        cf: &CfClient,
        ec2: &Ec2Client,
        params: &RemoteClusterParams,
        cluster_name: &str,
        key_pair_name: Option<&str>,
        secrets: &BTreeMap<String, String>,
    ) -> Result<Stack> {
        info!(cluster = cluster_name, region = %self.region, "creating cluster stack");

        let caller_ip = public_ip().await.unwrap_or_else(|| {
            DEFAULT_INGRESS_IP.to_string()
        });
        let ssh_access_ip = if key_pair_name.is_some() {
            caller_ip.as_str()
        } else {
            DEFAULT_INGRESS_IP
        };
        let protocol = secrets
            .get("WEBCONSOLE_PROTOCOL")
            .map_or("http", String::as_str);
        let wc_port = if protocol == "http" { "80" } else { "443" };

        let mut parameters = BTreeMap::new();
        parameters.insert(
            "PrivateDnsNamespaceName".to_string(),
            secrets
                .get("PRIVATE_DNS_NAMESPACE_NAME")
                .cloned()
                .unwrap_or_default(),
        );
        parameters.insert(
            "S3MinioIngressPort".to_string(),
            secrets
                .get("S3_MINIO_HOST_PORT_1")
                .cloned()
                .unwrap_or_default(),
        );
        parameters.insert("WcIngressPort".to_string(), wc_port.to_string());
        parameters.insert(
            "GrafanaIngressPort".to_string(),
            secrets.get("GRAFANA_PORT").cloned().unwrap_or_default(),
        );
        parameters.insert(
            "KeyName".to_string(),
            key_pair_name.unwrap_or_default().to_string(),
        );
        parameters.insert(
            "VpcAvailabilityZones".to_string(),
            ec2.availability_zones().await?,
        );
        parameters.insert("EcsClusterName".to_string(), cluster_name.to_string());
        parameters.insert(
            "InstanceType".to_string(),
            params.instance_type.clone().unwrap_or_default(),
        );
        parameters.insert(
            "X86AmiId".to_string(),
            ec2.recommended_ecs_ami("amazon-linux-2").await?,
        );
        parameters.insert(
            "Arm64AmiId".to_string(),
            ec2.recommended_ecs_ami("amazon-linux-2/arm64").await?,
        );
        parameters.insert(
            "AllowSshAccessToClusterFromCidr".to_string(),
            format!("{ssh_access_ip}/32"),
        );
        parameters.insert(
            "GrafanaDatasourceYaml".to_string(),
            GRAFANA_DATASOURCE_YAML.to_string(),
        );
        parameters.insert(
            "GrafanaDashboardsProviderYaml".to_string(),
            GRAFANA_DASHBOARDS_PROVIDER_YAML.to_string(),
        );
        parameters.insert("FluentBitConfig".to_string(), FLUENT_BIT_CONF.to_string());
        parameters.insert("LokiConfig".to_string(), LOKI_CONFIG_YAML.to_string());
        parameters.insert("PrometheusConfig".to_string(), PROMETHEUS_YML.to_string());
        parameters.insert("ZookeeperConfig".to_string(), ZOOKEEPER_CFG.to_string());

        let request = StackRequest {
            name: format!("ClusterStack-{cluster_name}"),
            template_body: CLUSTER_STACK_TEMPLATE,
            parameters,
            tags: stack_tags(cluster_name, StackType::ClusterEcs),
        };

        let stack_ref = cf.create_stack(&request).await?;
        info!("waiting for cluster stack to be deployed");
        let stack = cf
            .wait_for_stack(&stack_ref, WaitStrategy::stack_create())
            .await?;
        info!("cluster stack has been created successfully");
        Ok(stack)
    }

    async fn create_service_stack(
        &self,
        cf: &CfClient,
        params: &RemoteClusterParams,
        cluster_name: &str,
        outputs: &ClusterStackOutputs,
        cluster_public_ip: &str,
        secrets: &BTreeMap<String, String>,
    ) -> Result<()> {
        info!(cluster = cluster_name, region = %self.region, "creating service stack");

        let caller_ip = public_ip().await.unwrap_or_else(|| {
            DEFAULT_INGRESS_IP.to_string()
        });
        let minion_ssh_ip = if params.minions_key_pair_name.is_some() {
            caller_ip.as_str()
        } else {
            DEFAULT_INGRESS_IP
        };
        let protocol = secrets
            .get("WEBCONSOLE_PROTOCOL")
            .map_or("http", String::as_str);

        let mut parameters = BTreeMap::new();
        parameters.insert("AdminEmails".to_string(), params.admin_emails.join(","));
        parameters.insert(
            "PrivateDnsNamespaceName".to_string(),
            secrets
                .get("PRIVATE_DNS_NAMESPACE_NAME")
                .cloned()
                .unwrap_or_default(),
        );
        parameters.insert(
            "PrivateNamespaceId".to_string(),
            outputs.private_namespace_id.clone(),
        );
        parameters.insert(
            "InstanceProfileArn".to_string(),
            outputs.instance_profile_arn.clone(),
        );
        parameters.insert(
            "EcsInstanceRoleArn".to_string(),
            outputs.ecs_instance_role_arn.clone(),
        );
        parameters.insert(
            "TaskDefinitionsRoleArn".to_string(),
            outputs.task_def_role_arn.clone(),
        );
        parameters.insert(
            "PrivateSubnetIDs".to_string(),
            outputs.private_subnet_ids.clone(),
        );
        parameters.insert(
            "PublicSubnetIDs".to_string(),
            outputs.public_subnet_ids.clone(),
        );
        parameters.insert("ClusterSgId".to_string(), outputs.sg_id.clone());
        parameters.insert("ClusterName".to_string(), cluster_name.to_string());
        parameters.insert("ClusterVpcId".to_string(), outputs.vpc_id.clone());
        parameters.insert(
            "AwsAccessKeyId".to_string(),
            env::var("AWS_ACCESS_KEY_ID").unwrap_or_default(),
        );
        parameters.insert(
            "AwsSecretAccessKey".to_string(),
            env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
        );
        parameters.insert("InitialApiToken".to_string(), params.api_token.clone());
        parameters.insert(
            "MinionsKeyName".to_string(),
            params.minions_key_pair_name.clone().unwrap_or_default(),
        );
        parameters.insert(
            "S3MinioAccessKeyID".to_string(),
            secrets
                .get("S3_MINIO_ACCESS_KEY_ID")
                .cloned()
                .unwrap_or_default(),
        );
        parameters.insert(
            "S3MinioSecretAccessKeyID".to_string(),
            secrets
                .get("S3_MINIO_SECRET_ACCESS_KEY")
                .cloned()
                .unwrap_or_default(),
        );
        parameters.insert(
            "S3MinioIngressPort".to_string(),
            secrets
                .get("S3_MINIO_HOST_PORT_1")
                .cloned()
                .unwrap_or_default(),
        );
        parameters.insert(
            "AllowSshAccessToMinionFromCidr".to_string(),
            format!("{minion_ssh_ip}/32"),
        );
        parameters.insert("WebconsoleProtocol".to_string(), protocol.to_string());
        parameters.insert(
            "WcIngressPort".to_string(),
            if protocol == "http" { "80" } else { "443" }.to_string(),
        );
        parameters.insert(
            "GrafanaIngressPort".to_string(),
            secrets.get("GRAFANA_PORT").cloned().unwrap_or_default(),
        );
        parameters.insert(
            "ServicesImageTag".to_string(),
            params.services_image_tag().to_string(),
        );
        parameters.insert(
            "ClusterPublicIP".to_string(),
            cluster_public_ip.to_string(),
        );
        parameters.insert(
            "StandardImageVersionTag".to_string(),
            params.standard_image_tag.clone().unwrap_or_default(),
        );
        parameters.insert(
            "ForceRecreateNginxFlag".to_string(),
            force_recreate_nonce(),
        );

        let request = StackRequest {
            name: format!("ServiceStack-{cluster_name}"),
            template_body: SERVICES_STACK_TEMPLATE,
            parameters,
            tags: stack_tags(cluster_name, StackType::ClusterEcsServices),
        };

        let stack_ref = cf.create_stack(&request).await?;
        debug!("waiting for service stack to be deployed");
        cf.wait_for_stack(&stack_ref, WaitStrategy::stack_create())
            .await?;
        Ok(())
    }

    /// Destroys every stack belonging to `cluster_name`, in dependency
    /// order: services first, then minion stacks (minion compute across
    /// all regions), then the base compute stack.
    ///
    /// # Errors
    ///
    /// Discovery failures, delete failures, and destroy-wait timeouts.
    pub async fn destroy_cluster(&self, cluster_name: &str) -> Result<()> {
        let cf = CfClient::new(&self.region);
        let ec2 = Ec2Client::new(&self.region);
        let all_stacks = cf.all_stacks().await?;
        let plan = teardown_stages(&all_stacks, cluster_name);

        for stage in &plan.stages {
            if stage.label == "minion compute stacks" {
                // Minion pools can live in any region; sweep the others
                // before continuing past this stage.
                self.destroy_minion_stacks_in_other_regions(&ec2, cluster_name)
                    .await?;
            }
            if stage.stacks.is_empty() {
                debug!(stage = stage.label, "no stacks present");
                continue;
            }
            info!(
                stage = stage.label,
                count = stage.stacks.len(),
                "destroying stacks"
            );
            for stack in &stage.stacks {
                cf.delete_stack(&stack.stack_id).await;
            }
            cf.wait_for_stacks_destroyed(&stage.stacks, WaitStrategy::stack_destroy())
                .await?;
        }
        Ok(())
    }

    async fn destroy_minion_stacks_in_other_regions(
        &self,
        ec2: &Ec2Client,
        cluster_name: &str,
    ) -> Result<()> {
        let regions = ec2.regions().await?;
        for region in regions.iter().filter(|r| **r != self.region) {
            let cf = CfClient::new(region);
            let stacks = cf.all_stacks().await?;
            let minion_stacks = cluster_stacks(&stacks, cluster_name, StackType::MinionsEcs);
            if minion_stacks.is_empty() {
                continue;
            }
            debug!(region = %region, count = minion_stacks.len(), "found minion stacks");
            for stack in &minion_stacks {
                cf.delete_stack(&stack.stack_id).await;
            }
            cf.wait_for_stacks_destroyed(&minion_stacks, WaitStrategy::stack_destroy())
                .await?;
        }
        Ok(())
    }

    /// Upgrades the cluster's services stack to the CLI's services version
    /// via a change set, forcing replacement of the ingress component.
    ///
    /// Unless `bypass_confirmation`, the resource replacements are printed
    /// and the operator must confirm before the change set is applied.
    ///
    /// # Errors
    ///
    /// Change set failures and update-wait timeouts.
    pub async fn upgrade_cluster(
        &self,
        credentials: &ClusterCredentials,
        bypass_confirmation: bool,
    ) -> Result<()> {
        let cluster_name = credentials.cluster_name.as_deref().unwrap_or_default();
        let stack_name = format!("ServiceStack-{cluster_name}");
        let change_set_name = generate_change_set_name();
        let cf = CfClient::new(&self.region);

        let mut new_params = BTreeMap::new();
        new_params.insert(
            "ForceRecreateNginxFlag".to_string(),
            force_recreate_nonce(),
        );
        new_params.insert(
            "ServicesImageTag".to_string(),
            SERVICES_VERSION.to_string(),
        );

        let changes = cf
            .create_change_set(
                &stack_name,
                &change_set_name,
                SERVICES_STACK_TEMPLATE,
                &new_params,
            )
            .await?;

        print_resource_changes(&changes);
        if !bypass_confirmation && !operator_confirms_upgrade() {
            info!("upgrade cancelled by operator");
            return Ok(());
        }

        debug!(change_set = %change_set_name, stack = %stack_name, "applying change set");
        cf.execute_change_set(&stack_name, &change_set_name).await?;
        let stack = cf.stack_by_name(&stack_name).await?;
        cf.wait_for_stack(
            &StackRef {
                name: stack.stack_name.clone(),
                id: stack.stack_id,
            },
            WaitStrategy::stack_update(),
        )
        .await?;
        Ok(())
    }
}

fn stack_tags(cluster_name: &str, stack_type: StackType) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    tags.insert(TAG_CLUSTER_NAME.to_string(), cluster_name.to_string());
    tags.insert(
        TAG_STACK_TYPE.to_string(),
        stack_type.tag_value().to_string(),
    );
    tags
}

fn force_recreate_nonce() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn generate_change_set_name() -> String {
    let version = SERVICES_VERSION.replace('.', "-");
    let suffix = Uuid::new_v4().simple().to_string()[..5].to_string();
    format!("UpgradeTo{version}{suffix}")
}

fn print_resource_changes(changes: &[ResourceChange]) {
    println!("The following resources will be replaced:");
    for change in changes {
        println!("  {} ({})", change.logical_id, change.resource_type);
    }
}

fn operator_confirms_upgrade() -> bool {
    loop {
        println!("Do you confirm the upgrade? (Y/n)");
        let mut input = String::new();
        if std::io::stdin().lock().read_line(&mut input).is_err() {
            return false;
        }
        match input.trim().to_lowercase().as_str() {
            "" | "y" | "yes" => return true,
            "n" | "no" => return false,
            _ => warn!("invalid input, please enter \"yes\" or \"no\""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::stack::{Output, Tag};

    fn stack_with_outputs(pairs: &[(&str, &str)]) -> Stack {
        Stack {
            stack_id: "id".to_string(),
            stack_name: "ClusterStack-BrowserUp-abc".to_string(),
            stack_status: "CREATE_COMPLETE".to_string(),
            tags: vec![Tag {
                key: TAG_CLUSTER_NAME.to_string(),
                value: "BrowserUp-abc".to_string(),
            }],
            outputs: pairs
                .iter()
                .map(|(key, value)| Output {
                    output_key: (*key).to_string(),
                    output_value: (*value).to_string(),
                })
                .collect(),
            parameters: Vec::new(),
        }
    }

    fn all_output_pairs() -> Vec<(&'static str, &'static str)> {
        vec![
            ("SgId", "sg-1"),
            ("VpcId", "vpc-1"),
            ("PrivateNamespaceId", "ns-1"),
            ("NginxAsgId", "asg-1"),
            ("InstanceProfileArn", "arn:profile"),
            ("EcsInstanceRoleArn", "arn:role"),
            ("PrivateSubnetIds", "subnet-1,subnet-2"),
            ("PublicSubnetIds", "subnet-3,subnet-4"),
            ("TaskDefinitionsRoleArn", "arn:taskrole"),
        ]
    }

    #[test]
    fn cluster_stack_outputs_resolve() {
        let stack = stack_with_outputs(&all_output_pairs());
        let outputs = ClusterStackOutputs::from_stack(&stack).expect("outputs");
        assert_eq!(outputs.vpc_id, "vpc-1");
        assert_eq!(outputs.nginx_asg_id, "asg-1");
        assert_eq!(outputs.private_subnet_ids, "subnet-1,subnet-2");
    }

    #[test]
    fn missing_output_is_named_in_the_error() {
        let pairs: Vec<_> = all_output_pairs()
            .into_iter()
            .filter(|(key, _)| *key != "NginxAsgId")
            .collect();
        let stack = stack_with_outputs(&pairs);
        let err = ClusterStackOutputs::from_stack(&stack);
        match err {
            Err(ClusterError::AwsOutput { reason, .. }) => {
                assert!(reason.contains("NginxAsgId"));
            }
            other => panic!("expected missing-output error, got {other:?}"),
        }
    }

    #[test]
    fn change_set_names_embed_version_and_vary() {
        let first = generate_change_set_name();
        let second = generate_change_set_name();
        assert!(first.starts_with("UpgradeTorelease-1-4-7"));
        assert_ne!(first, second);
    }

    #[test]
    fn force_recreate_nonce_is_short_hex() {
        let nonce = force_recreate_nonce();
        assert_eq!(nonce.len(), 8);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn stack_tags_carry_cluster_and_type() {
        let tags = stack_tags("BrowserUp-abc", StackType::ClusterEcsServices);
        assert_eq!(tags[TAG_CLUSTER_NAME], "BrowserUp-abc");
        assert_eq!(
            tags[TAG_STACK_TYPE],
            "BROWSERUP_CLUSTER_ECS_SERVICES_STACK_TYPE"
        );
    }
}
