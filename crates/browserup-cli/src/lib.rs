//! # browserup-cli
//!
//! The `browserup` command-line tool: deploy, monitor, and tear down
//! BrowserUp load testing clusters, and drive load test runs against them.
//!
//! Commands come in two groups:
//!
//! - `cluster` for lifecycle: deploy, destroy, upgrade, upload-license,
//!   info, install
//! - `load` for runs: init, verify, start, stop, status, reports,
//!   upload-scenario
//!
//! # Architecture
//!
//! Each command composes the library crates:
//!
//! ```text
//! browserup-cli ──► browserup-cluster ──► docker / aws CLI
//!      │                   │
//!      │                   └─► browserup-console ──► web console REST API
//!      ├─► browserup-scenario (config, payloads)
//!      └─► browserup-secrets (credentials, secret store)
//! ```
//!
//! Every command exits 0 on success and 1 on any unhandled failure;
//! `load reports` additionally exits 1 when any SLA check fails.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, ClusterCommands, Commands, Format, LoadCommands};
pub use error::CliError;
pub use output::OutputFormat;
