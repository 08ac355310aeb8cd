//! The AWS cluster pilot and its infrastructure clients.
//!
//! All cloud calls go through the `aws` CLI with JSON output; the modules
//! here own argument construction, output parsing, tag-based discovery,
//! wait policies, and teardown ordering.

pub mod cf;
pub mod cli;
pub mod dashboards;
pub mod ec2;
pub mod pilot;
pub mod stack;

pub use pilot::AwsClusterPilot;
pub use stack::{teardown_stages, Stack, StackType, TeardownPlan, TAG_CLUSTER_NAME, TAG_STACK_TYPE};
