//! Web console client errors.

use std::path::PathBuf;

use browserup_wait::WaitError;
use thiserror::Error;

use crate::client::HealthPollError;

/// Errors raised by web console operations.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The configured base URL does not parse.
    #[error("invalid web console URL \"{url}\": {source}")]
    InvalidBaseUrl {
        /// The offending URL.
        url: String,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },

    /// The console could not be reached at all.
    #[error("unable to connect to BrowserUp server at {url}")]
    Unreachable {
        /// The URL that refused the connection.
        url: String,
    },

    /// A transport-level failure other than connection refusal.
    #[error("web console request failed: {source}")]
    Transport {
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The console answered with a status outside the expected set.
    #[error("unexpected response from web console: {status} {body}")]
    UnexpectedResponse {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnosis.
        body: String,
    },

    /// The API token was rejected.
    #[error("authorization failed against the web console; check the api token")]
    Unauthorized,

    /// The health check never reported every subsystem up.
    #[error("app not ready at {url}: {source}")]
    NotReady {
        /// The health check URL.
        url: String,
        /// How the wait ended.
        #[source]
        source: WaitError<HealthPollError>,
    },

    /// No run matches the requested id.
    #[error("no run found with id {run_id}")]
    RunNotFound {
        /// The requested run id.
        run_id: u64,
    },

    /// Artifact preflight: the directory is a recognized OS directory.
    #[error("refusing to archive system directory {}", path.display())]
    ArtifactInSystemDirectory {
        /// The rejected directory.
        path: PathBuf,
    },

    /// Artifact preflight: the directory exceeds the upload limit.
    #[error("artifact directory {} is {size} bytes, over the {limit} byte limit", path.display())]
    ArtifactTooLarge {
        /// The rejected directory.
        path: PathBuf,
        /// Its measured size.
        size: u64,
        /// The configured limit.
        limit: u64,
    },

    /// Artifact preflight: the directory does not exist.
    #[error("artifact directory does not exist at {}", path.display())]
    ArtifactMissing {
        /// The missing directory.
        path: PathBuf,
    },

    /// An upload failed in transport or was rejected by the console.
    #[error("failed to upload {what}: {source}")]
    Upload {
        /// What was being uploaded: scenario, artifact, report, license.
        what: &'static str,
        /// The underlying failure.
        #[source]
        source: Box<ConsoleError>,
    },

    /// Starting a run failed.
    #[error("failed to start run: {source}")]
    StartRun {
        /// The underlying failure.
        #[source]
        source: Box<ConsoleError>,
    },

    /// Stopping a run failed.
    #[error("failed to stop run {run_id}: {source}")]
    StopRun {
        /// The run being stopped.
        run_id: u64,
        /// The underlying failure.
        #[source]
        source: Box<ConsoleError>,
    },

    /// A response body was not the expected JSON shape.
    #[error("malformed response from web console: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    /// Local file I/O failed while preparing an upload.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConsoleError {
    /// Wraps an error as an upload failure for `what`.
    #[must_use]
    pub fn upload(what: &'static str, source: Self) -> Self {
        Self::Upload {
            what,
            source: Box::new(source),
        }
    }
}

/// Result type alias for console operations.
pub type Result<T> = std::result::Result<T, ConsoleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_wraps_and_keeps_cause() {
        let cause = ConsoleError::UnexpectedResponse {
            status: 500,
            body: "boom".to_string(),
        };
        let err = ConsoleError::upload("scenario", cause);
        let shown = err.to_string();
        assert!(shown.starts_with("failed to upload scenario"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
