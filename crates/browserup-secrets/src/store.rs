//! File-backed secret storage.
//!
//! Secrets live in a YAML mapping at a fixed path under the per-user
//! application settings directory. The file is read fully into memory when
//! the store is opened and rewritten fully on each save; there is no file
//! locking, because the CLI assumes one interactive operator at a time.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::RngCore;
use tracing::debug;

use crate::error::{Result, SecretsError};

const APP_NAME: &str = "browserup";
const SECRETS_FILE: &str = "secrets.yaml";

/// Per-user settings directory, `~/.browserup/browserup`.
///
/// # Errors
///
/// Returns [`SecretsError::NoHomeDirectory`] when no home directory can be
/// determined for the current user.
pub fn app_settings_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(SecretsError::NoHomeDirectory)?;
    Ok(home.join(".browserup").join(APP_NAME))
}

/// A YAML-file-backed map of secret names to values.
#[derive(Debug)]
pub struct SecretsStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl SecretsStore {
    /// Opens the store at the default per-user path, loading any existing
    /// secrets file.
    ///
    /// # Errors
    ///
    /// Returns an error when the settings directory cannot be determined or
    /// an existing file cannot be read or parsed.
    pub fn open_default() -> Result<Self> {
        Self::open(app_settings_dir()?.join(SECRETS_FILE))
    }

    /// Opens a store backed by the file at `path`.
    ///
    /// A missing file is treated as an empty store; it is created on the
    /// first save.
    ///
    /// # Errors
    ///
    /// Returns an error when an existing file cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            debug!(path = %path.display(), "loading secrets");
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_yaml::from_str(&raw)?
            }
        } else {
            debug!(path = %path.display(), "no secrets file found");
            BTreeMap::new()
        };
        Ok(Self { path, values })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the named secret, treating empty values as absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Sets one secret and rewrites the backing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        self.values.insert(name.to_string(), value.to_string());
        self.persist()
    }

    /// Sets several secrets and rewrites the backing file once.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn set_many<'a>(
        &mut self,
        pairs: impl IntoIterator<Item = (&'a str, String)>,
    ) -> Result<()> {
        for (name, value) in pairs {
            self.values.insert(name.to_string(), value);
        }
        self.persist()
    }

    /// Returns the named secret, generating and persisting a random value
    /// when it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if a generated value cannot be persisted.
    pub fn get_or_create(&mut self, name: &str) -> Result<String> {
        if let Some(existing) = self.get(name) {
            return Ok(existing.to_string());
        }
        let mut bytes = [0u8; 24];
        rand::thread_rng().fill_bytes(&mut bytes);
        let value: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        self.set(name, &value)?;
        Ok(value)
    }

    /// Removes all secrets and truncates the backing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be truncated.
    pub fn clear(&mut self) -> Result<()> {
        debug!(path = %self.path.display(), "truncating secrets file");
        self.values.clear();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, "")?;
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_yaml::to_string(&self.values)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}
