//! # browserup-wait
//!
//! Bounded retry for operations that wait on asynchronous infrastructure
//! state: stack creation, stack teardown, and web console health.
//!
//! The polled operation reports its own classification through
//! [`RetryOutcome`] (done, retryable, or fatal) instead of the caller
//! inspecting error types to decide whether to keep going. Expected
//! conditions like "stack not ready yet" are ordinary retryable outcomes,
//! not exceptions used for control flow.
//!
//! Delays are fixed (no exponential backoff), and a policy is bounded both
//! by attempt count and by cumulative elapsed time. On exhaustion the most
//! recent underlying error is surfaced, so callers can tell "timed out"
//! apart from "failed because X".

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod retry;
pub mod strategy;

pub use error::WaitError;
pub use retry::{retry, RetryOutcome};
pub use strategy::WaitStrategy;
