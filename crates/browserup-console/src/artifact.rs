//! Content-addressed artifact upload.
//!
//! A profile's artifact directory is archived as tar.gz, addressed by the
//! SHA-256 of the archive, and uploaded only when the console does not
//! already have that hash, so there is at most one transport upload per
//! content.
//!
//! Preflight refuses recognized OS directories and anything over the
//! 200 MiB limit, so a mistyped `artifact_dir: /` never leaves the machine.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::{Method, StatusCode};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use walkdir::WalkDir;

use browserup_scenario::LoadConfig;

use crate::client::{ConsoleClient, RequestSpec};
use crate::error::{ConsoleError, Result};

/// Upper bound on an artifact directory's total size.
pub const MAX_ARTIFACT_BYTES: u64 = 200 * 1024 * 1024;

/// Directories that are never valid artifact roots.
const SYSTEM_DIRS: &[&str] = &[
    // Windows
    "c:/",
    "c:/windows/",
    "c:/program files/",
    "c:/program files (x86)/",
    "c:/programdata/",
    "c:/users/",
    "c:/windows/system32/",
    "c:/windows/syswow64/",
    // Unix
    "/",
    "/bin/",
    "/sbin/",
    "/usr/",
    "/usr/bin/",
    "/usr/sbin/",
    "/etc/",
    "/var/",
    "/var/lib/",
    "/opt/",
    "/lib/",
    "/lib64/",
    "/tmp/",
    "/boot/",
    "/home/",
    "/root/",
    "/mnt/",
    "/media/",
    "/srv/",
];

/// Whether `path` is a recognized OS/system directory.
fn is_system_directory(path: &Path) -> bool {
    let mut normalized = path.to_string_lossy().to_lowercase().replace('\\', "/");
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    SYSTEM_DIRS.contains(&normalized.as_str())
}

/// Total size in bytes of all files under `path`.
fn directory_size(path: &Path) -> Result<u64> {
    let mut size = 0;
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(|e| {
            ConsoleError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::other("unreadable directory entry")
            }))
        })?;
        if entry.file_type().is_file() {
            size += entry.metadata().map_err(|e| {
                ConsoleError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::other("unreadable file metadata")
                }))
            })?.len();
        }
    }
    Ok(size)
}

/// Packs the contents of `src` into `<dest_dir>/<dirname>.tar.gz`.
fn pack_tar_gz(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let dir_name = src
        .file_name()
        .map_or_else(|| "artifact".to_string(), |n| n.to_string_lossy().into_owned());
    let dest = dest_dir.join(format!("{dir_name}.tar.gz"));
    debug!(src = %src.display(), dest = %dest.display(), "packing artifact archive");

    let file = File::create(&dest)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(".", src)?;
    builder.into_inner()?.finish()?;
    Ok(dest)
}

/// Hex SHA-256 of a file's contents.
fn sha256_hex(path: &Path) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    let digest = hasher.finalize();
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

impl ConsoleClient {
    /// Whether the console already holds an artifact with this hash.
    ///
    /// A 200 means present; 404 and 401 both read as absent, so a fresh
    /// cluster that has never seen the token still gets the upload.
    ///
    /// # Errors
    ///
    /// Any other status or a transport failure is an error.
    pub async fn artifact_present(&self, sha256: &str) -> Result<bool> {
        debug!(sha256, "checking artifact status");
        let response = self
            .send_request(
                RequestSpec::new(Method::GET, &format!("load/customer_artifacts/{sha256}"))
                    .expect(&[
                        StatusCode::OK,
                        StatusCode::NOT_FOUND,
                        StatusCode::UNAUTHORIZED,
                    ]),
            )
            .await?;
        Ok(response.status() == StatusCode::OK)
    }

    /// Uploads an artifact archive under its content hash.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Upload`] tagged `artifact` on failure.
    pub async fn upload_artifact(&self, sha256: &str, archive: &Path) -> Result<()> {
        info!(sha256, archive = %archive.display(), "uploading artifact");
        let result: Result<()> = async {
            let url = self.url_for(&format!("load/customer_artifacts/{sha256}"))?;
            let bytes = tokio::fs::read(archive).await?;
            let file_name = archive
                .file_name()
                .map_or_else(|| "artifact.tar.gz".to_string(), |n| {
                    n.to_string_lossy().into_owned()
                });
            let form = reqwest::multipart::Form::new().part(
                "customer_artifact",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );

            let response = self
                .http()
                .put(url)
                .query(&[("api_token", self.api_token())])
                .header("sha256", sha256)
                .multipart(form)
                .send()
                .await
                .map_err(|source| ConsoleError::Transport { source })?;

            if response.status() == StatusCode::OK {
                Ok(())
            } else {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                Err(ConsoleError::UnexpectedResponse { status, body })
            }
        }
        .await;

        result.map_err(|source| ConsoleError::upload("artifact", source))
    }

    /// Archives `artifact_dir`, uploads it if the console does not already
    /// hold its hash, and returns the hash.
    ///
    /// # Errors
    ///
    /// Preflight rejections ([`ConsoleError::ArtifactMissing`],
    /// [`ConsoleError::ArtifactInSystemDirectory`],
    /// [`ConsoleError::ArtifactTooLarge`]) and upload failures.
    pub async fn ensure_artifact_uploaded(&self, artifact_dir: &Path) -> Result<String> {
        self.ensure_artifact_uploaded_with_limit(artifact_dir, MAX_ARTIFACT_BYTES)
            .await
    }

    async fn ensure_artifact_uploaded_with_limit(
        &self,
        artifact_dir: &Path,
        limit: u64,
    ) -> Result<String> {
        if !artifact_dir.is_dir() {
            return Err(ConsoleError::ArtifactMissing {
                path: artifact_dir.to_path_buf(),
            });
        }
        if is_system_directory(artifact_dir) {
            return Err(ConsoleError::ArtifactInSystemDirectory {
                path: artifact_dir.to_path_buf(),
            });
        }
        let size = directory_size(artifact_dir)?;
        if size > limit {
            return Err(ConsoleError::ArtifactTooLarge {
                path: artifact_dir.to_path_buf(),
                size,
                limit,
            });
        }

        let staging = tempfile::tempdir()?;
        let archive = pack_tar_gz(artifact_dir, staging.path())?;
        let sha256 = sha256_hex(&archive)?;

        if self.artifact_present(&sha256).await? {
            debug!(sha256, "artifact already present, skipping upload");
        } else {
            self.upload_artifact(&sha256, &archive).await?;
        }
        Ok(sha256)
    }

    /// Uploads the artifact directory of every profile that has one,
    /// recording the content hash on the profile. Uploads run one at a
    /// time, in profile order.
    ///
    /// # Errors
    ///
    /// Fails on the first profile whose artifact cannot be uploaded.
    pub async fn upload_profile_artifacts(&self, config: &mut LoadConfig) -> Result<()> {
        let root_dir = config.root_dir().to_path_buf();
        for profile in &mut config.scenario_mut().profiles {
            let Some(artifact_dir) = profile.artifact_dir.clone() else {
                continue;
            };
            let full_path = root_dir.join(&artifact_dir);
            let sha256 = self.ensure_artifact_uploaded(&full_path).await?;
            profile.artifact_sha = Some(sha256);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn system_directories_are_recognized() {
        assert!(is_system_directory(Path::new("/")));
        assert!(is_system_directory(Path::new("/tmp")));
        assert!(is_system_directory(Path::new("/usr/bin")));
        assert!(is_system_directory(Path::new("C:\\Windows")));
        assert!(!is_system_directory(Path::new("/home/dev/scripts")));
    }

    #[test]
    fn directory_size_sums_nested_files() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("a.txt"), vec![0u8; 100]).expect("write");
        fs::create_dir(dir.path().join("sub")).expect("mkdir");
        fs::write(dir.path().join("sub/b.txt"), vec![0u8; 50]).expect("write");
        assert_eq!(directory_size(dir.path()).expect("size"), 150);
    }

    #[test]
    fn packed_archive_hash_is_stable_for_same_content() {
        let src = TempDir::new().expect("tempdir");
        fs::write(src.path().join("script.rb"), "puts 'hi'\n").expect("write");

        let staging = TempDir::new().expect("tempdir");
        let first = pack_tar_gz(src.path(), staging.path()).expect("pack");
        let first_sha = sha256_hex(&first).expect("sha");

        let staging2 = TempDir::new().expect("tempdir");
        let second = pack_tar_gz(src.path(), staging2.path()).expect("pack");
        let second_sha = sha256_hex(&second).expect("sha");

        assert_eq!(first_sha, second_sha);
        assert_eq!(first_sha.len(), 64);
    }

    #[tokio::test]
    async fn same_directory_twice_uploads_exactly_once() {
        let mut server = mockito::Server::new_async().await;
        let sha_path =
            mockito::Matcher::Regex(r"^/load/customer_artifacts/[0-9a-f]{64}$".to_string());

        let absent = server
            .mock("GET", sha_path.clone())
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        let upload = server
            .mock("PUT", sha_path.clone())
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let src = TempDir::new().expect("tempdir");
        fs::write(src.path().join("script.rb"), "puts 'hi'\n").expect("write");

        let client = ConsoleClient::new(&server.url(), "t".repeat(20)).expect("client");
        let first_sha = client
            .ensure_artifact_uploaded(src.path())
            .await
            .expect("first upload");

        // The console now reports the hash as present; a later mock takes
        // precedence over the 404 one.
        let present = server
            .mock("GET", sha_path)
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .create_async()
            .await;

        let second_sha = client
            .ensure_artifact_uploaded(src.path())
            .await
            .expect("second call skips transport");

        assert_eq!(first_sha, second_sha);
        upload.assert_async().await;
        drop(absent);
        drop(present);
    }

    #[tokio::test]
    async fn system_directory_is_rejected_before_any_network_call() {
        let client =
            ConsoleClient::new("http://127.0.0.1:9", "t".repeat(20)).expect("client");
        let err = client.ensure_artifact_uploaded(Path::new("/tmp")).await;
        assert!(matches!(
            err,
            Err(ConsoleError::ArtifactInSystemDirectory { .. })
        ));
    }

    #[tokio::test]
    async fn oversized_directory_is_rejected() {
        let src = TempDir::new().expect("tempdir");
        fs::write(src.path().join("big.bin"), vec![0u8; 2048]).expect("write");

        let client =
            ConsoleClient::new("http://127.0.0.1:9", "t".repeat(20)).expect("client");
        let err = client
            .ensure_artifact_uploaded_with_limit(src.path(), 1024)
            .await;
        assert!(matches!(
            err,
            Err(ConsoleError::ArtifactTooLarge { size: 2048, .. })
        ));
    }

    #[tokio::test]
    async fn missing_directory_is_rejected() {
        let client =
            ConsoleClient::new("http://127.0.0.1:9", "t".repeat(20)).expect("client");
        let err = client
            .ensure_artifact_uploaded(Path::new("/definitely/not/here"))
            .await;
        assert!(matches!(err, Err(ConsoleError::ArtifactMissing { .. })));
    }

    #[tokio::test]
    async fn profile_artifacts_record_hashes() {
        let mut server = mockito::Server::new_async().await;
        let sha_path =
            mockito::Matcher::Regex(r"^/load/customer_artifacts/[0-9a-f]{64}$".to_string());
        let _absent = server
            .mock("GET", sha_path.clone())
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        let _upload = server
            .mock("PUT", sha_path)
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .create_async()
            .await;

        let dir = TempDir::new().expect("tempdir");
        fs::create_dir(dir.path().join("scripts")).expect("mkdir");
        fs::write(dir.path().join("scripts/run.sh"), "echo hi\n").expect("write");
        let config_path = dir.path().join("browserup.load.yaml");
        fs::write(
            &config_path,
            r"
scenario:
  name: artifacts
  total_users: 2
  stop_after: 10m
  profiles:
    - name: P
      artifact_dir: scripts
",
        )
        .expect("write config");

        let mut config = LoadConfig::load(&config_path).expect("load");
        let client = ConsoleClient::new(&server.url(), "t".repeat(20)).expect("client");
        client
            .upload_profile_artifacts(&mut config)
            .await
            .expect("upload artifacts");

        let sha = config.scenario().profiles[0]
            .artifact_sha
            .as_deref()
            .expect("sha recorded");
        assert_eq!(sha.len(), 64);
    }
}
