//! # browserup-console
//!
//! Client for the BrowserUp web console's REST API.
//!
//! Every request carries the cluster API token as a query parameter and is
//! validated against an explicit set of expected status codes; anything
//! else surfaces as an "unexpected response" error with the status and
//! body retained.
//!
//! The crate covers:
//!
//! - request plumbing and the health-check wait ([`client`])
//! - run lifecycle: start, stop, list active ([`runs`])
//! - scenario create-or-update ([`scenario`])
//! - content-addressed artifact upload: tar.gz + SHA-256, uploaded at most
//!   once per content hash ([`artifact`])
//! - SLA report execution and upload ([`report`])
//! - license upload ([`license`])

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod artifact;
pub mod client;
pub mod error;
pub mod license;
pub mod report;
pub mod runs;
pub mod scenario;

pub use artifact::MAX_ARTIFACT_BYTES;
pub use client::ConsoleClient;
pub use error::{ConsoleError, Result};
pub use license::LicenseUpload;
pub use report::{ReportResult, SYSTEM_REPORTS};
pub use scenario::RemoteScenario;
