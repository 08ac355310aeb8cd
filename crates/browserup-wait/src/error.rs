//! Wait failure modes.

use std::time::Duration;

use thiserror::Error;

/// How a bounded wait ended without success.
///
/// The last underlying operation error is always carried, never replaced
/// with a generic message, so "timed out while the stack was still in
/// progress" stays distinguishable from "the stack reported a failure".
#[derive(Debug, Error)]
pub enum WaitError<E>
where
    E: std::error::Error + 'static,
{
    /// The operation classified its failure as non-retryable.
    #[error("non-retryable failure: {0}")]
    Fatal(#[source] E),

    /// The attempt budget ran out.
    #[error("gave up after {attempts} attempts; last error: {last}")]
    AttemptsExhausted {
        /// How many times the operation was invoked.
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        last: E,
    },

    /// The elapsed-time budget ran out.
    #[error("timed out after {}s; last error: {last}", waited.as_secs())]
    TimedOut {
        /// How long the wait ran before expiring.
        waited: Duration,
        /// The error from the final attempt.
        #[source]
        last: E,
    },
}

impl<E> WaitError<E>
where
    E: std::error::Error + 'static,
{
    /// The most recent underlying operation error.
    #[must_use]
    pub fn last_error(&self) -> &E {
        match self {
            Self::Fatal(e)
            | Self::AttemptsExhausted { last: e, .. }
            | Self::TimedOut { last: e, .. } => e,
        }
    }

    /// Whether the wait expired (by attempts or time) rather than hitting a
    /// terminal failure.
    #[must_use]
    pub const fn is_expiry(&self) -> bool {
        matches!(self, Self::AttemptsExhausted { .. } | Self::TimedOut { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("still creating")]
    struct NotReady;

    #[test]
    fn display_keeps_last_error() {
        let err: WaitError<NotReady> = WaitError::AttemptsExhausted {
            attempts: 5,
            last: NotReady,
        };
        assert_eq!(
            err.to_string(),
            "gave up after 5 attempts; last error: still creating"
        );
        assert!(err.is_expiry());
    }

    #[test]
    fn fatal_is_not_expiry() {
        let err: WaitError<NotReady> = WaitError::Fatal(NotReady);
        assert!(!err.is_expiry());
        assert_eq!(err.last_error().to_string(), "still creating");
    }
}
