//! Timestamped backups kept next to the live artifact
//!
//! Names follow `config_backup_{YYYY-MM-DD_HH-MM-SS}.toml` (or
//! `config_backup_pre_restore_...` before a restore). A second backup within
//! the same second gets a `_{n}` suffix.

use chrono::NaiveDateTime;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

pub const BACKUP_PREFIX: &str = "config_backup_";
pub const BACKUP_EXTENSION: &str = "toml";
/// Backups kept after each rotation
pub const MAX_BACKUPS: usize = 3;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

static BACKUP_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^config_backup_(pre_restore_)?(\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2})(?:_(\d{1,4}))?\.toml$",
    )
    .expect("static backup name pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupKind {
    Regular,
    PreRestore,
}

/// A backup file found in the store directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: BackupKind,
    pub taken_at: NaiveDateTime,
    pub sequence: u32,
}

/// Parse a file name against the backup naming pattern
pub fn parse_name(name: &str) -> Option<(BackupKind, NaiveDateTime, u32)> {
    let caps = BACKUP_NAME.captures(name)?;
    let kind = if caps.get(1).is_some() {
        BackupKind::PreRestore
    } else {
        BackupKind::Regular
    };
    let taken_at = NaiveDateTime::parse_from_str(caps.get(2)?.as_str(), TIMESTAMP_FORMAT).ok()?;
    let sequence = match caps.get(3) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    Some((kind, taken_at, sequence))
}

fn file_name(kind: BackupKind, taken_at: NaiveDateTime, sequence: u32) -> String {
    let marker = match kind {
        BackupKind::Regular => "",
        BackupKind::PreRestore => "pre_restore_",
    };
    let stamp = taken_at.format(TIMESTAMP_FORMAT);
    if sequence == 0 {
        format!("{BACKUP_PREFIX}{marker}{stamp}.{BACKUP_EXTENSION}")
    } else {
        format!("{BACKUP_PREFIX}{marker}{stamp}_{sequence}.{BACKUP_EXTENSION}")
    }
}

/// List backups in `dir`, newest first
pub fn list(dir: &Path) -> io::Result<Vec<BackupEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let Some((kind, taken_at, sequence)) = parse_name(&name) else {
            continue;
        };
        if !entry.file_type()?.is_file() {
            continue;
        }
        entries.push(BackupEntry {
            path: entry.path(),
            name,
            kind,
            taken_at,
            sequence,
        });
    }
    entries.sort_by(|a, b| {
        (b.taken_at, b.sequence, &b.name).cmp(&(a.taken_at, a.sequence, &a.name))
    });
    Ok(entries)
}

/// Resolve a user-supplied backup name to a file inside `dir`.
///
/// Only names matching the backup pattern that refer to a regular file
/// directly inside `dir` are accepted.
pub fn resolve(dir: &Path, name: &str) -> Option<BackupEntry> {
    let (kind, taken_at, sequence) = parse_name(name)?;
    let path = dir.join(name);
    let meta = fs::symlink_metadata(&path).ok()?;
    if !meta.is_file() {
        return None;
    }
    Some(BackupEntry {
        name: name.to_string(),
        path,
        kind,
        taken_at,
        sequence,
    })
}

/// Copy `live` to a new backup in `dir`
pub fn create(live: &Path, dir: &Path, kind: BackupKind, taken_at: NaiveDateTime) -> io::Result<BackupEntry> {
    let mut sequence = 0;
    let name = loop {
        let candidate = file_name(kind, taken_at, sequence);
        if !dir.join(&candidate).is_file() {
            break candidate;
        }
        sequence += 1;
    };
    let path = dir.join(&name);
    fs::copy(live, &path)?;
    debug!(backup = %name, "Configuration backup created");
    Ok(BackupEntry {
        name,
        path,
        kind,
        taken_at,
        sequence,
    })
}

/// Delete all but the `keep` newest backups. Failures are logged and ignored.
pub fn prune(dir: &Path, keep: usize) {
    let entries = match list(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to list configuration backups: {}", e);
            return;
        }
    };
    for old in entries.into_iter().skip(keep) {
        match fs::remove_file(&old.path) {
            Ok(()) => debug!(backup = %old.name, "Old configuration backup removed"),
            Err(e) => warn!(backup = %old.name, "Failed to remove old backup: {}", e),
        }
    }
}
