//! Config Store - the generated device configuration and its backups
//!
//! The live artifact is the single source of truth for receivers,
//! transmitters and global settings. Every commit:
//! 1. confirms the artifact is writable
//! 2. copies it to a timestamped backup (abort on failure)
//! 3. rotates backups down to the newest [`MAX_BACKUPS`]
//! 4. serializes the new snapshot and atomically replaces the artifact
//!
//! A failure at any step leaves the previous artifact authoritative.

pub mod artifact;
pub mod backup;
pub mod model;
pub mod validate;

pub use backup::{BackupEntry, BackupKind, MAX_BACKUPS};
pub use model::*;
pub use validate::{validate_and_stage, Section, SettingsForm, ValidationError};

use chrono::{NaiveDateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(
        "Config file is not writable. Current permissions: {permissions}. File owner: {owner}. \
         Web user: {effective_user}. Please make the file writable by running: chmod 666 {path}"
    )]
    NotWritable {
        path: String,
        permissions: String,
        owner: String,
        effective_user: String,
    },

    #[error("Failed to create backup file: {source}")]
    BackupFailed { source: io::Error },

    #[error("Failed to write to config file. Please check file permissions. ({source})")]
    WriteFailed { source: io::Error },

    #[error("Invalid backup file selected: {name}")]
    InvalidBackup { name: String },

    #[error("Configuration file {path} is malformed: {message}")]
    Corrupt { path: String, message: String },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Configuration I/O error: {0}")]
    Io(#[from] io::Error),
}

/// File-backed store for the device configuration
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self { path, dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a default configuration if none exists yet (first deployment)
    pub fn ensure_initialized(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir)?;
        let contents = artifact::render(&ConfigSnapshot::default(), Utc::now().naive_utc())?;
        self.write_atomic(contents.as_bytes())
            .map_err(|source| StoreError::WriteFailed { source })?;
        info!(path = %self.path.display(), "Created default configuration");
        Ok(())
    }

    /// Read the live artifact. A missing file yields the defaults.
    pub fn load(&self) -> Result<ConfigSnapshot, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No configuration file, using defaults");
                return Ok(ConfigSnapshot::default());
            }
            Err(e) => return Err(e.into()),
        };
        artifact::parse(&contents).map_err(|e| StoreError::Corrupt {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Validate a settings submission against the current snapshot and commit it
    pub fn apply_form(&self, form: &SettingsForm, current: &ConfigSnapshot) -> Result<ConfigSnapshot, StoreError> {
        let staged = validate_and_stage(form.section()?, form, current)?;
        self.commit(&staged)?;
        Ok(staged)
    }

    pub fn commit(&self, snapshot: &ConfigSnapshot) -> Result<(), StoreError> {
        self.commit_at(snapshot, Utc::now().naive_utc())
    }

    pub(crate) fn commit_at(&self, snapshot: &ConfigSnapshot, now: NaiveDateTime) -> Result<(), StoreError> {
        self.ensure_writable()?;

        let backup = backup::create(&self.path, &self.dir, BackupKind::Regular, now)
            .map_err(|source| StoreError::BackupFailed { source })?;
        backup::prune(&self.dir, MAX_BACKUPS);

        let contents = artifact::render(snapshot, now)?;
        self.write_atomic(contents.as_bytes())
            .map_err(|source| StoreError::WriteFailed { source })?;

        info!(backup = %backup.name, "Configuration updated");
        Ok(())
    }

    /// Backups next to the live artifact, newest first
    pub fn list_backups(&self) -> Result<Vec<BackupEntry>, StoreError> {
        Ok(backup::list(&self.dir)?)
    }

    /// Replace the live artifact with a named backup.
    ///
    /// The current artifact is saved as a `pre_restore` backup first.
    pub fn restore(&self, name: &str) -> Result<ConfigSnapshot, StoreError> {
        self.restore_at(name, Utc::now().naive_utc())
    }

    pub(crate) fn restore_at(&self, name: &str, now: NaiveDateTime) -> Result<ConfigSnapshot, StoreError> {
        let invalid = || StoreError::InvalidBackup {
            name: name.to_string(),
        };
        let entry = backup::resolve(&self.dir, name).ok_or_else(invalid)?;
        let contents = fs::read(&entry.path).map_err(|_| invalid())?;
        let snapshot = std::str::from_utf8(&contents)
            .ok()
            .and_then(|text| artifact::parse(text).ok())
            .ok_or_else(invalid)?;

        self.ensure_writable()?;
        backup::create(&self.path, &self.dir, BackupKind::PreRestore, now)
            .map_err(|source| StoreError::BackupFailed { source })?;

        self.write_atomic(&contents)
            .map_err(|source| StoreError::WriteFailed { source })?;
        backup::prune(&self.dir, MAX_BACKUPS);

        info!(backup = %entry.name, "Configuration restored from backup");
        Ok(snapshot)
    }

    /// Whether the live artifact can be rewritten
    pub fn writable(&self) -> Result<(), StoreError> {
        self.ensure_writable()
    }

    fn ensure_writable(&self) -> Result<(), StoreError> {
        // Opening for append checks permission without touching the contents
        match OpenOptions::new().append(true).open(&self.path) {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(path = %self.path.display(), "Configuration file not writable: {}", e);
                Err(self.not_writable())
            }
        }
    }

    fn not_writable(&self) -> StoreError {
        let (permissions, owner) = describe_file(&self.path);
        StoreError::NotWritable {
            path: self.path.display().to_string(),
            permissions,
            owner,
            effective_user: effective_user(),
        }
    }

    fn write_atomic(&self, contents: &[u8]) -> io::Result<()> {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config.toml".to_string());
        let tmp = self.dir.join(format!(".{file_name}.tmp"));

        let result = (|| {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(contents)?;
            file.sync_all()?;
            if let Ok(meta) = fs::metadata(&self.path) {
                let _ = fs::set_permissions(&tmp, meta.permissions());
            }
            fs::rename(&tmp, &self.path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

#[cfg(unix)]
fn describe_file(path: &Path) -> (String, String) {
    use std::os::unix::fs::MetadataExt;

    match fs::metadata(path) {
        Ok(meta) => (
            format_mode(meta.mode()),
            format!("uid {}", meta.uid()),
        ),
        Err(_) => ("unknown".to_string(), "unknown".to_string()),
    }
}

#[cfg(not(unix))]
fn describe_file(path: &Path) -> (String, String) {
    match fs::metadata(path) {
        Ok(meta) if meta.permissions().readonly() => ("read-only".to_string(), "unknown".to_string()),
        Ok(_) => ("read-write".to_string(), "unknown".to_string()),
        Err(_) => ("unknown".to_string(), "unknown".to_string()),
    }
}

#[cfg_attr(not(unix), allow(dead_code))]
fn format_mode(mode: u32) -> String {
    format!("{:04o}", mode & 0o7777)
}

fn effective_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
