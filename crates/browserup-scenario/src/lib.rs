//! # browserup-scenario
//!
//! The load test definition: a YAML configuration file with a `scenario`
//! (profiles, ramp stages, total duration), named SLA `reports`, and named
//! container `images`.
//!
//! This crate owns:
//!
//! - the configuration model and its defaults ([`model`])
//! - loading and validation ([`loader`]): unique profile names, every
//!   profile backed by an artifact directory or an image, image references
//!   resolving, file-safe report/image names
//! - allocation defaulting ([`allocation`]): explicit percentages are kept,
//!   the remainder of 100 is split evenly across unallocated profiles, and
//!   any integer remainder goes to the first unallocated profile
//! - translation into the web console's payload shape ([`payload`]),
//!   including ramp stages becoming discrete time-boxed stages with target
//!   user counts

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod allocation;
pub mod error;
pub mod loader;
pub mod model;
pub mod payload;

pub use error::{ConfigError, Result};
pub use loader::LoadConfig;
pub use model::{Databank, ImageRef, Profile, ProxyConfig, RampStage, Report, Scenario};
pub use payload::{prepare_scenario_payload, ScenarioPayload};
