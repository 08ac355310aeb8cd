//! CloudFormation operations: create, delete, change sets, and the
//! wait-for-state polls.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info};

use browserup_wait::{retry, RetryOutcome, WaitError, WaitStrategy};

use crate::aws::cli::AwsCli;
use crate::aws::stack::{is_failed_or_deleting, Stack};
use crate::error::{ClusterError, Result};

const STACK_CREATE_TIMEOUT_MINUTES: &str = "20";

/// A just-requested stack, before it reaches a terminal state.
#[derive(Debug, Clone)]
pub struct StackRef {
    /// Stack name.
    pub name: String,
    /// Provider-assigned id.
    pub id: String,
}

/// A stack creation request.
#[derive(Debug, Clone)]
pub struct StackRequest {
    /// Stack name.
    pub name: String,
    /// Template body (YAML).
    pub template_body: &'static str,
    /// Template parameters.
    pub parameters: BTreeMap<String, String>,
    /// Stack tags.
    pub tags: BTreeMap<String, String>,
}

/// One resource replacement from a change set.
#[derive(Debug, Clone)]
pub struct ResourceChange {
    /// Logical id of the resource.
    pub logical_id: String,
    /// Resource type.
    pub resource_type: String,
}

/// CloudFormation client for one region.
#[derive(Debug, Clone)]
pub struct CfClient {
    cli: AwsCli,
}

/// Why one stack poll did not finish the wait.
#[derive(Debug, Error)]
pub enum StackPoll {
    /// The stack is still in progress.
    #[error("stack is not ready yet, status: \"{status}\"")]
    InProgress {
        /// The observed status.
        status: String,
    },
    /// The stack reached a failed or deleting state.
    #[error("stack status: \"{status}\"")]
    Terminal {
        /// The terminal status.
        status: String,
    },
    /// The provider query itself failed.
    #[error("{message}")]
    Query {
        /// The query failure.
        message: String,
    },
}

impl CfClient {
    /// A client pinned to `region`.
    #[must_use]
    pub fn new(region: &str) -> Self {
        Self {
            cli: AwsCli::in_region(region),
        }
    }

    /// All stacks in the region, following pagination.
    ///
    /// # Errors
    ///
    /// Provider query failures.
    pub async fn all_stacks(&self) -> Result<Vec<Stack>> {
        let mut stacks = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut args: Vec<&str> = Vec::new();
            if let Some(token) = &next_token {
                args.extend(["--next-token", token.as_str()]);
            }
            let response = self
                .cli
                .json("cloudformation", "describe-stacks", &args)
                .await?;

            let page: Vec<Stack> =
                serde_json::from_value(response["Stacks"].clone()).map_err(|e| {
                    ClusterError::AwsOutput {
                        action: "cloudformation describe-stacks".to_string(),
                        reason: e.to_string(),
                    }
                })?;
            stacks.extend(page);

            match response["NextToken"].as_str() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(stacks)
    }

    /// The stack with the given name.
    ///
    /// # Errors
    ///
    /// [`ClusterError::StackNotFound`] when no stack matches.
    pub async fn stack_by_name(&self, name: &str) -> Result<Stack> {
        let stacks = self.all_stacks().await?;
        stacks
            .into_iter()
            .find(|s| s.stack_name == name)
            .ok_or_else(|| ClusterError::StackNotFound {
                name: name.to_string(),
            })
    }

    /// Requests stack creation and returns the new stack's reference.
    ///
    /// The stack is created with a 20 minute provider-side timeout,
    /// delete-on-failure, and IAM capabilities, matching the templates.
    ///
    /// # Errors
    ///
    /// Provider failures; malformed create output.
    pub async fn create_stack(&self, request: &StackRequest) -> Result<StackRef> {
        debug!(stack = %request.name, "sending stack create request");
        let staging = tempfile::tempdir()?;
        let template = write_staged(staging.path(), "template.yaml", request.template_body)?;
        let parameters = write_staged(
            staging.path(),
            "parameters.json",
            &parameters_json(&request.parameters)?,
        )?;
        let tags = write_staged(staging.path(), "tags.json", &tags_json(&request.tags)?)?;

        let response = self
            .cli
            .json(
                "cloudformation",
                "create-stack",
                &[
                    "--stack-name",
                    &request.name,
                    "--template-body",
                    &template,
                    "--parameters",
                    &parameters,
                    "--tags",
                    &tags,
                    "--timeout-in-minutes",
                    STACK_CREATE_TIMEOUT_MINUTES,
                    "--on-failure",
                    "DELETE",
                    "--capabilities",
                    "CAPABILITY_IAM",
                    "CAPABILITY_NAMED_IAM",
                ],
            )
            .await?;

        let id = response["StackId"]
            .as_str()
            .ok_or_else(|| ClusterError::AwsOutput {
                action: "cloudformation create-stack".to_string(),
                reason: "response carried no StackId".to_string(),
            })?
            .to_string();
        Ok(StackRef {
            name: request.name.clone(),
            id,
        })
    }

    /// Requests deletion of a stack. Delete errors are logged, not raised;
    /// the destroy wait decides whether teardown actually failed.
    pub async fn delete_stack(&self, stack_id: &str) {
        debug!(stack_id, "sending stack delete request");
        if let Err(e) = self
            .cli
            .json(
                "cloudformation",
                "delete-stack",
                &["--stack-name", stack_id],
            )
            .await
        {
            error!(stack_id, error = %e, "error while deleting stack");
        }
    }

    /// Waits until the stack reaches `CREATE_COMPLETE`/`UPDATE_COMPLETE`.
    ///
    /// A status matching a failed or deleting pattern is terminal and is
    /// not retried even if attempts remain.
    ///
    /// # Errors
    ///
    /// [`ClusterError::StackCreateFailed`] on a terminal status,
    /// [`ClusterError::StackWaitTimeout`] when the budget expires.
    pub async fn wait_for_stack(
        &self,
        stack: &StackRef,
        strategy: WaitStrategy,
    ) -> Result<Stack> {
        info!(stack = %stack.name, timeout_secs = strategy.max_elapsed.as_secs(), "waiting for stack");
        let outcome = retry(strategy, || async {
            match self.stack_by_id(&stack.id).await {
                Ok(described) => {
                    let status = described.stack_status.clone();
                    if status == "CREATE_COMPLETE" || status == "UPDATE_COMPLETE" {
                        RetryOutcome::Done(described)
                    } else if is_failed_or_deleting(&status) {
                        RetryOutcome::Fatal(StackPoll::Terminal { status })
                    } else {
                        RetryOutcome::Retry(StackPoll::InProgress { status })
                    }
                }
                Err(e) => RetryOutcome::Fatal(StackPoll::Query {
                    message: e.to_string(),
                }),
            }
        })
        .await;

        outcome.map_err(|e| stack_wait_error(&stack.name, e))
    }

    /// Waits until every one of `stacks` is gone (or `DELETE_COMPLETE`).
    ///
    /// # Errors
    ///
    /// [`ClusterError::StackDeleteFailed`] when any stack reports a delete
    /// failure, [`ClusterError::StackWaitTimeout`] when the budget expires.
    pub async fn wait_for_stacks_destroyed(
        &self,
        stacks: &[Stack],
        strategy: WaitStrategy,
    ) -> Result<()> {
        if stacks.is_empty() {
            return Ok(());
        }
        let names: Vec<String> = stacks.iter().map(|s| s.stack_name.clone()).collect();
        let ids: Vec<String> = stacks.iter().map(|s| s.stack_id.clone()).collect();
        info!(
            stacks = %names.join(", "),
            timeout_secs = strategy.max_elapsed.as_secs(),
            "waiting for stacks to be deleted"
        );

        let outcome = retry(strategy, || {
            let ids = ids.clone();
            async move {
                match self.all_stacks().await {
                    Ok(current) => {
                        let remaining: Vec<&Stack> = current
                            .iter()
                            .filter(|s| {
                                ids.contains(&s.stack_id)
                                    && s.stack_status != "DELETE_COMPLETE"
                            })
                            .collect();
                        if remaining.is_empty() {
                            return RetryOutcome::Done(());
                        }
                        let failed: Vec<String> = remaining
                            .iter()
                            .filter(|s| s.stack_status.to_lowercase().contains("fail"))
                            .map(|s| s.stack_name.clone())
                            .collect();
                        if failed.is_empty() {
                            RetryOutcome::Retry(StackPoll::InProgress {
                                status: "DELETE_IN_PROGRESS".to_string(),
                            })
                        } else {
                            RetryOutcome::Fatal(StackPoll::Terminal {
                                status: format!("delete failed: {}", failed.join(", ")),
                            })
                        }
                    }
                    Err(e) => RetryOutcome::Fatal(StackPoll::Query {
                        message: e.to_string(),
                    }),
                }
            }
        })
        .await;

        outcome.map_err(|e| match e {
            WaitError::Fatal(StackPoll::Terminal { .. }) => {
                ClusterError::StackDeleteFailed { stacks: names }
            }
            other => stack_wait_error(&names.join(", "), other),
        })
    }

    /// Creates a change set against an existing stack, merging `new_params`
    /// over the stack's current parameters (unchanged ones use previous
    /// values), and returns the resource replacements it would perform.
    ///
    /// # Errors
    ///
    /// Provider failures; a change set that never reaches
    /// `CREATE_COMPLETE`.
    pub async fn create_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
        template_body: &'static str,
        new_params: &BTreeMap<String, String>,
    ) -> Result<Vec<ResourceChange>> {
        let existing = self.stack_by_name(stack_name).await?;
        info!(stack = stack_name, change_set = change_set_name, "preparing change set");

        let staging = tempfile::tempdir()?;
        let template = write_staged(staging.path(), "template.yaml", template_body)?;
        let parameters = write_staged(
            staging.path(),
            "parameters.json",
            &update_parameters_json(&existing, new_params)?,
        )?;

        self.cli
            .json(
                "cloudformation",
                "create-change-set",
                &[
                    "--stack-name",
                    stack_name,
                    "--change-set-name",
                    change_set_name,
                    "--change-set-type",
                    "UPDATE",
                    "--template-body",
                    &template,
                    "--parameters",
                    &parameters,
                    "--capabilities",
                    "CAPABILITY_IAM",
                    "CAPABILITY_NAMED_IAM",
                ],
            )
            .await?;

        // Change sets are computed quickly; a short fixed budget suffices.
        let strategy = WaitStrategy::new(
            std::time::Duration::from_secs(2),
            30,
            std::time::Duration::from_secs(120),
        );
        let changes = retry(strategy, || async {
            match self.describe_change_set(stack_name, change_set_name).await {
                Ok(Some(changes)) => RetryOutcome::Done(changes),
                Ok(None) => RetryOutcome::Retry(StackPoll::InProgress {
                    status: "CREATE_IN_PROGRESS".to_string(),
                }),
                Err(e) => RetryOutcome::Fatal(StackPoll::Query {
                    message: e.to_string(),
                }),
            }
        })
        .await
        .map_err(|e| stack_wait_error(stack_name, e))?;

        Ok(changes)
    }

    /// Executes a prepared change set.
    ///
    /// # Errors
    ///
    /// Provider failures.
    pub async fn execute_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<()> {
        debug!(stack = stack_name, change_set = change_set_name, "executing change set");
        self.cli
            .json(
                "cloudformation",
                "execute-change-set",
                &[
                    "--stack-name",
                    stack_name,
                    "--change-set-name",
                    change_set_name,
                ],
            )
            .await?;
        Ok(())
    }

    async fn stack_by_id(&self, stack_id: &str) -> Result<Stack> {
        let response = self
            .cli
            .json(
                "cloudformation",
                "describe-stacks",
                &["--stack-name", stack_id],
            )
            .await?;
        let stacks: Vec<Stack> =
            serde_json::from_value(response["Stacks"].clone()).map_err(|e| {
                ClusterError::AwsOutput {
                    action: "cloudformation describe-stacks".to_string(),
                    reason: e.to_string(),
                }
            })?;
        stacks
            .into_iter()
            .next()
            .ok_or_else(|| ClusterError::StackNotFound {
                name: stack_id.to_string(),
            })
    }

    /// `Ok(Some(changes))` once the change set is computed, `Ok(None)`
    /// while it is still being created.
    async fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<Option<Vec<ResourceChange>>> {
        let response = self
            .cli
            .json(
                "cloudformation",
                "describe-change-set",
                &[
                    "--stack-name",
                    stack_name,
                    "--change-set-name",
                    change_set_name,
                ],
            )
            .await?;

        match response["Status"].as_str() {
            Some("CREATE_COMPLETE") => {}
            Some("FAILED") => {
                return Err(ClusterError::AwsOutput {
                    action: "cloudformation describe-change-set".to_string(),
                    reason: response["StatusReason"]
                        .as_str()
                        .unwrap_or("change set failed")
                        .to_string(),
                });
            }
            _ => return Ok(None),
        }

        let changes = response["Changes"]
            .as_array()
            .map(|changes| {
                changes
                    .iter()
                    .filter_map(|change| {
                        let resource = &change["ResourceChange"];
                        Some(ResourceChange {
                            logical_id: resource["LogicalResourceId"].as_str()?.to_string(),
                            resource_type: resource["ResourceType"]
                                .as_str()
                                .unwrap_or("")
                                .to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(Some(changes))
    }
}

fn stack_wait_error(stack: &str, error: WaitError<StackPoll>) -> ClusterError {
    match error {
        WaitError::Fatal(StackPoll::Terminal { status }) => ClusterError::StackCreateFailed {
            stack: stack.to_string(),
            status,
        },
        WaitError::Fatal(StackPoll::Query { message }) => ClusterError::AwsOutput {
            action: "cloudformation describe-stacks".to_string(),
            reason: message,
        },
        WaitError::Fatal(StackPoll::InProgress { status })
        | WaitError::AttemptsExhausted {
            last: StackPoll::InProgress { status } | StackPoll::Terminal { status },
            ..
        }
        | WaitError::TimedOut {
            last: StackPoll::InProgress { status } | StackPoll::Terminal { status },
            ..
        } => ClusterError::StackWaitTimeout {
            stack: stack.to_string(),
            status,
        },
        WaitError::AttemptsExhausted {
            last: StackPoll::Query { message },
            ..
        }
        | WaitError::TimedOut {
            last: StackPoll::Query { message },
            ..
        } => ClusterError::StackWaitTimeout {
            stack: stack.to_string(),
            status: message,
        },
    }
}

fn parameters_json(parameters: &BTreeMap<String, String>) -> Result<String> {
    let entries: Vec<serde_json::Value> = parameters
        .iter()
        .map(|(key, value)| json!({ "ParameterKey": key, "ParameterValue": value }))
        .collect();
    Ok(serde_json::to_string(&entries)?)
}

fn tags_json(tags: &BTreeMap<String, String>) -> Result<String> {
    let entries: Vec<serde_json::Value> = tags
        .iter()
        .map(|(key, value)| json!({ "Key": key, "Value": value }))
        .collect();
    Ok(serde_json::to_string(&entries)?)
}

/// Merged update parameters: new values win, everything else keeps its
/// previous value.
fn update_parameters_json(
    existing: &Stack,
    new_params: &BTreeMap<String, String>,
) -> Result<String> {
    let mut entries: Vec<serde_json::Value> = Vec::new();
    for parameter in &existing.parameters {
        if !new_params.contains_key(&parameter.parameter_key) {
            entries.push(json!({
                "ParameterKey": parameter.parameter_key,
                "UsePreviousValue": true,
            }));
        }
    }
    for (key, value) in new_params {
        entries.push(json!({ "ParameterKey": key, "ParameterValue": value }));
    }
    Ok(serde_json::to_string(&entries)?)
}

fn write_staged(dir: &Path, file_name: &str, contents: &str) -> Result<String> {
    let path = dir.join(file_name);
    let mut file = std::fs::File::create(&path)?;
    file.write_all(contents.as_bytes())?;
    Ok(format!("file://{}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::stack::Parameter;

    #[test]
    fn parameters_json_shape() {
        let mut parameters = BTreeMap::new();
        parameters.insert("EcsClusterName".to_string(), "BrowserUp-abc".to_string());
        let raw = parameters_json(&parameters).expect("json");
        let parsed: serde_json::Value = serde_json::from_str(&raw).expect("parse");
        assert_eq!(parsed[0]["ParameterKey"], "EcsClusterName");
        assert_eq!(parsed[0]["ParameterValue"], "BrowserUp-abc");
    }

    #[test]
    fn update_parameters_keep_previous_values_unless_overridden() {
        let existing = Stack {
            stack_id: "id".to_string(),
            stack_name: "ServiceStack-BrowserUp-abc".to_string(),
            stack_status: "UPDATE_COMPLETE".to_string(),
            tags: Vec::new(),
            outputs: Vec::new(),
            parameters: vec![
                Parameter {
                    parameter_key: "ServicesImageTag".to_string(),
                    parameter_value: Some("release-1.4.6".to_string()),
                },
                Parameter {
                    parameter_key: "AdminEmails".to_string(),
                    parameter_value: Some("ops@example.com".to_string()),
                },
            ],
        };
        let mut new_params = BTreeMap::new();
        new_params.insert("ServicesImageTag".to_string(), "release-1.4.7".to_string());

        let raw = update_parameters_json(&existing, &new_params).expect("json");
        let parsed: Vec<serde_json::Value> =
            serde_json::from_str(&raw).expect("parse");

        let kept = parsed
            .iter()
            .find(|p| p["ParameterKey"] == "AdminEmails")
            .expect("kept parameter");
        assert_eq!(kept["UsePreviousValue"], true);
        assert!(kept.get("ParameterValue").is_none());

        let updated = parsed
            .iter()
            .find(|p| p["ParameterKey"] == "ServicesImageTag")
            .expect("updated parameter");
        assert_eq!(updated["ParameterValue"], "release-1.4.7");
    }

    #[test]
    fn wait_error_mapping_distinguishes_terminal_from_timeout() {
        let terminal = stack_wait_error(
            "ClusterStack-x",
            WaitError::Fatal(StackPoll::Terminal {
                status: "ROLLBACK_COMPLETE".to_string(),
            }),
        );
        assert!(matches!(terminal, ClusterError::StackCreateFailed { .. }));

        let timeout = stack_wait_error(
            "ClusterStack-x",
            WaitError::AttemptsExhausted {
                attempts: 300,
                last: StackPoll::InProgress {
                    status: "CREATE_IN_PROGRESS".to_string(),
                },
            },
        );
        assert!(matches!(timeout, ClusterError::StackWaitTimeout { .. }));
    }
}
