//! EC2, autoscaling, SSM, and identity helpers.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::aws::cli::AwsCli;
use crate::error::{ClusterError, Result};

/// Where the caller's public IP is looked up for SSH ingress rules.
const PUBLIC_IP_ENDPOINT: &str = "https://checkip.amazonaws.com";

/// EC2-adjacent client for one region.
#[derive(Debug, Clone)]
pub struct Ec2Client {
    cli: AwsCli,
}

impl Ec2Client {
    /// A client pinned to `region`.
    #[must_use]
    pub fn new(region: &str) -> Self {
        Self {
            cli: AwsCli::in_region(region),
        }
    }

    /// The region's availability zone names, comma-joined for template
    /// parameters.
    ///
    /// # Errors
    ///
    /// Provider failures; malformed output.
    pub async fn availability_zones(&self) -> Result<String> {
        let response = self
            .cli
            .json("ec2", "describe-availability-zones", &[])
            .await?;
        let zones: Vec<String> = response["AvailabilityZones"]
            .as_array()
            .map(|zones| {
                zones
                    .iter()
                    .filter_map(|z| z["ZoneName"].as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default();
        if zones.is_empty() {
            return Err(ClusterError::AwsOutput {
                action: "ec2 describe-availability-zones".to_string(),
                reason: "no availability zones reported".to_string(),
            });
        }
        Ok(zones.join(","))
    }

    /// The recommended ECS-optimized AMI for an architecture, via the
    /// public SSM parameter.
    ///
    /// `ami_type` is e.g. `amazon-linux-2` or `amazon-linux-2/arm64`.
    ///
    /// # Errors
    ///
    /// Provider failures; malformed output.
    pub async fn recommended_ecs_ami(&self, ami_type: &str) -> Result<String> {
        let parameter = format!("/aws/service/ecs/optimized-ami/{ami_type}/recommended/image_id");
        let response = self
            .cli
            .json("ssm", "get-parameter", &["--name", &parameter])
            .await?;
        response["Parameter"]["Value"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| ClusterError::AwsOutput {
                action: "ssm get-parameter".to_string(),
                reason: format!("no value for {parameter}"),
            })
    }

    /// Public IP of the single instance behind an autoscaling group.
    ///
    /// # Errors
    ///
    /// Provider failures; an ASG with no instance yet.
    pub async fn asg_instance_public_ip(&self, asg_name: &str) -> Result<String> {
        let response = self
            .cli
            .json(
                "autoscaling",
                "describe-auto-scaling-groups",
                &["--auto-scaling-group-names", asg_name],
            )
            .await?;
        let instance_id = response["AutoScalingGroups"][0]["Instances"][0]["InstanceId"]
            .as_str()
            .ok_or_else(|| ClusterError::AwsOutput {
                action: "autoscaling describe-auto-scaling-groups".to_string(),
                reason: format!("no instance behind ASG {asg_name}"),
            })?
            .to_string();

        let response = self
            .cli
            .json(
                "ec2",
                "describe-instances",
                &["--instance-ids", &instance_id],
            )
            .await?;
        response["Reservations"][0]["Instances"][0]["PublicIpAddress"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| ClusterError::AwsOutput {
                action: "ec2 describe-instances".to_string(),
                reason: format!("instance {instance_id} has no public IP"),
            })
    }

    /// All region names visible to the account.
    ///
    /// # Errors
    ///
    /// Provider failures.
    pub async fn regions(&self) -> Result<Vec<String>> {
        let response = self.cli.json("ec2", "describe-regions", &[]).await?;
        Ok(response["Regions"]
            .as_array()
            .map(|regions| {
                regions
                    .iter()
                    .filter_map(|r| r["RegionName"].as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Creates a key pair and writes its private key to `{name}.pem` in the
    /// working directory.
    ///
    /// # Errors
    ///
    /// [`ClusterError::KeyPair`] when the name already exists or the key
    /// cannot be created or saved.
    pub async fn create_key_pair(&self, name: &str) -> Result<()> {
        let response = self
            .cli
            .json("ec2", "create-key-pair", &["--key-name", name])
            .await
            .map_err(|e| match &e {
                ClusterError::AwsCommand { stderr, .. }
                    if stderr.contains("InvalidKeyPair.Duplicate") =>
                {
                    ClusterError::KeyPair {
                        reason: format!("a key pair named \"{name}\" already exists"),
                    }
                }
                _ => e,
            })?;

        let material =
            response["KeyMaterial"]
                .as_str()
                .ok_or_else(|| ClusterError::KeyPair {
                    reason: "create-key-pair returned no key material".to_string(),
                })?;
        let file_name = format!("{name}.pem");
        std::fs::write(&file_name, material)?;
        info!(key_pair = name, file = %file_name, "created key pair and saved private key");
        Ok(())
    }

    /// Confirms a key pair with this name exists in the region.
    ///
    /// # Errors
    ///
    /// [`ClusterError::KeyPair`] when the lookup fails.
    pub async fn validate_key_pair(&self, name: &str) -> Result<()> {
        debug!(key_pair = name, "validating key pair name");
        self.cli
            .json("ec2", "describe-key-pairs", &["--key-names", name])
            .await
            .map_err(|e| ClusterError::KeyPair {
                reason: format!("invalid key pair \"{name}\": {e}"),
            })?;
        Ok(())
    }
}

/// Confirms AWS credentials are present and accepted.
///
/// # Errors
///
/// [`ClusterError::AwsCredentials`] with the identity check's output.
pub async fn validate_aws_credentials() -> Result<()> {
    AwsCli::global()
        .json("sts", "get-caller-identity", &[])
        .await
        .map_err(|e| ClusterError::AwsCredentials {
            reason: e.to_string(),
        })?;
    Ok(())
}

/// The caller's public IP, when discoverable. Failures are logged and
/// read as "unknown"; the caller falls back to an open ingress CIDR.
pub async fn public_ip() -> Option<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .ok()?;
    match client.get(PUBLIC_IP_ENDPOINT).send().await {
        Ok(response) => match response.text().await {
            Ok(body) => {
                let ip = body.trim().to_string();
                if ip.is_empty() { None } else { Some(ip) }
            }
            Err(e) => {
                warn!(error = %e, "could not read public IP response");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, "could not determine public IP");
            None
        }
    }
}
