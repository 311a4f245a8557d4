//! Server configuration
//!
//! How the process runs (port, file locations). The device inventory and
//! global settings live in the generated artifact managed by [`crate::store`].

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory the relative file names below resolve against
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_config_file")]
    pub config_file: PathBuf,

    /// IR payloads, `action=code` per line
    #[serde(default = "default_payloads_file")]
    pub payloads_file: PathBuf,

    /// Remote-control targets, `name,url` per line
    #[serde(default = "default_targets_file")]
    pub targets_file: PathBuf,

    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_config_file() -> PathBuf {
    PathBuf::from("config.toml")
}

fn default_payloads_file() -> PathBuf {
    PathBuf::from("payloads.txt")
}

fn default_targets_file() -> PathBuf {
    PathBuf::from("transmitters.txt")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("av_controls.log")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            data_dir: default_data_dir(),
            config_file: default_config_file(),
            payloads_file: default_payloads_file(),
            targets_file: default_targets_file(),
            log_file: default_log_file(),
        }
    }
}

impl ServerConfig {
    fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.data_dir.join(file)
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.resolve(&self.config_file)
    }

    pub fn payloads_path(&self) -> PathBuf {
        self.resolve(&self.payloads_file)
    }

    pub fn targets_path(&self) -> PathBuf {
        self.resolve(&self.targets_file)
    }

    pub fn log_path(&self) -> PathBuf {
        self.resolve(&self.log_file)
    }
}

pub fn load_config() -> Result<ServerConfig> {
    let config = ::config::Config::builder()
        // Start with defaults
        .set_default("port", 8080)?
        // Optional av-controls.{toml,json} next to the binary's working directory
        .add_source(::config::File::with_name("av-controls").required(false))
        // Override with environment variables (AVC__PORT, AVC__DATA_DIR, etc.)
        .add_source(
            ::config::Environment::with_prefix("AVC")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}
