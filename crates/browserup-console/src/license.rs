//! License upload.

use std::path::Path;

use reqwest::{Method, StatusCode};
use serde_json::json;
use tracing::info;

use crate::client::{ConsoleClient, RequestSpec};
use crate::error::{ConsoleError, Result};

/// What the console did with an uploaded license.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseUpload {
    /// The license was accepted and stored.
    Uploaded,
    /// The console already holds this license.
    AlreadyPresent,
}

impl ConsoleClient {
    /// Uploads the license JSON at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Upload`] tagged `license` when the file is
    /// missing, is not valid JSON, or the console rejects it.
    pub async fn upload_license(&self, path: &Path) -> Result<LicenseUpload> {
        info!(path = %path.display(), "uploading license");
        let result: Result<LicenseUpload> = async {
            let raw = tokio::fs::read_to_string(path).await?;
            let license: serde_json::Value = serde_json::from_str(&raw)?;

            let response = self
                .send_request(
                    RequestSpec::new(Method::POST, "licenses")
                        .json(json!({ "license": license }))
                        .expect(&[StatusCode::OK, StatusCode::NOT_MODIFIED]),
                )
                .await?;

            if response.status() == StatusCode::NOT_MODIFIED {
                Ok(LicenseUpload::AlreadyPresent)
            } else {
                Ok(LicenseUpload::Uploaded)
            }
        }
        .await;

        result.map_err(|source| ConsoleError::upload("license", source))
    }
}
