//! Wait strategy budgets.

use std::time::Duration;

/// Delay, attempt, and overall-time budget for one waiting operation.
///
/// Each kind of infrastructure wait carries its own fixed budget; the named
/// constructors below are the standard ones used across the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitStrategy {
    /// Sleep between attempts. Fixed, no backoff.
    pub delay: Duration,
    /// Maximum number of attempts before giving up.
    pub max_attempts: u32,
    /// Cap on cumulative elapsed time across all attempts.
    pub max_elapsed: Duration,
}

impl WaitStrategy {
    /// Builds a strategy from raw parts.
    #[must_use]
    pub const fn new(delay: Duration, max_attempts: u32, max_elapsed: Duration) -> Self {
        Self {
            delay,
            max_attempts,
            max_elapsed,
        }
    }

    /// Waiting for the web console health check to report every subsystem up.
    #[must_use]
    pub const fn web_console() -> Self {
        Self::new(Duration::from_secs(3), 120, Duration::from_secs(1000))
    }

    /// Waiting for a cloud stack create to complete.
    #[must_use]
    pub const fn stack_create() -> Self {
        Self::new(Duration::from_secs(3), 300, Duration::from_secs(1000))
    }

    /// Waiting for a cloud stack update (change set) to complete.
    #[must_use]
    pub const fn stack_update() -> Self {
        Self::new(Duration::from_secs(3), 300, Duration::from_secs(1500))
    }

    /// Waiting for a group of cloud stacks to finish deleting.
    #[must_use]
    pub const fn stack_destroy() -> Self {
        Self::new(Duration::from_secs(20), 30, Duration::from_secs(1000))
    }
}
