//! IR payload table and remote-control targets
//!
//! Both files are plain text kept next to the device configuration and are
//! re-read on every request, so edits apply without a restart.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, error};

/// Remote action name -> device IR code, from `action=code` lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IrPayloadTable {
    codes: HashMap<String, String>,
}

impl IrPayloadTable {
    /// Blank lines and lines without `=` are skipped; the last duplicate wins
    pub fn parse(source: &str) -> Self {
        let mut codes = HashMap::new();
        for line in source.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let Some((action, code)) = line.split_once('=') else {
                debug!(line, "Skipping payload line without '='");
                continue;
            };
            codes.insert(action.trim().to_string(), code.trim().to_string());
        }
        Self { codes }
    }

    /// A missing file is an empty table
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(source) => Self::parse(&source),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No IR payload file");
                Self::default()
            }
            Err(e) => {
                error!(path = %path.display(), "Failed to read IR payload file: {}", e);
                Self::default()
            }
        }
    }

    pub fn get(&self, action: &str) -> Option<&str> {
        self.codes.get(action).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// An IR transmitter offered in the remote-control panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub name: String,
    pub url: String,
}

impl RemoteTarget {
    /// Parse `name,url` lines, in file order
    pub fn parse_list(source: &str) -> Vec<Self> {
        source
            .lines()
            .filter_map(|line| {
                let (name, url) = line.split_once(',')?;
                let (name, url) = (name.trim(), url.trim());
                if name.is_empty() || url.is_empty() {
                    return None;
                }
                Some(RemoteTarget {
                    name: name.to_string(),
                    url: url.to_string(),
                })
            })
            .collect()
    }

    pub fn load_list(path: &Path) -> Vec<Self> {
        match fs::read_to_string(path) {
            Ok(source) => Self::parse_list(&source),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                error!(path = %path.display(), "Failed to read transmitter list: {}", e);
                Vec::new()
            }
        }
    }
}
