//! Cluster license upload.

use std::path::Path;

use tracing::{debug, info};

use browserup_console::{ConsoleClient, LicenseUpload};
use browserup_cluster::validate_cluster_version;
use browserup_secrets::{CredentialField, CredentialOverrides, CredentialsRepository};

use crate::cli::UploadLicenseArgs;
use crate::error::CliError;

/// Handler for `cluster upload-license`.
pub struct UploadLicenseCommand;

impl UploadLicenseCommand {
    /// Uploads a license file to the deployed cluster.
    ///
    /// # Errors
    ///
    /// A missing file, credential resolution failures, and upload
    /// failures.
    pub async fn execute(
        args: &UploadLicenseArgs,
        repository: &CredentialsRepository,
    ) -> Result<(), CliError> {
        debug!("running upload license");
        let credentials = repository.credentials(
            &CredentialOverrides::default(),
            &[CredentialField::ClusterUrl, CredentialField::ApiToken],
        )?;
        validate_cluster_version(&credentials)?;

        let path = Path::new(&args.path);
        debug!("uploading license: \"{}\"", path.display());
        if !path.is_file() {
            return Err(CliError::LicenseMissing {
                path: path.to_path_buf(),
            });
        }

        let client = ConsoleClient::new(
            credentials.cluster_url.as_deref().unwrap_or(""),
            credentials.api_token.clone().unwrap_or_default(),
        )?;
        match client.upload_license(path).await? {
            LicenseUpload::AlreadyPresent => info!("upload completed: license already exists"),
            LicenseUpload::Uploaded => info!("upload completed: license uploaded"),
        }
        Ok(())
    }
}
