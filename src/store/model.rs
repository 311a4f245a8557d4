//! Device inventory and global settings
//!
//! A [`ConfigSnapshot`] is the whole persisted configuration: receivers,
//! transmitters, global limits and the static catalog (remote command names,
//! volume-capable models, user-facing message templates). Every field has a
//! documented default so a partial or missing artifact still loads.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const DEFAULT_MAX_VOLUME: i32 = 11;
pub const DEFAULT_MIN_VOLUME: i32 = 0;
pub const DEFAULT_VOLUME_STEP: u32 = 1;
/// Device API timeout in seconds
pub const DEFAULT_API_TIMEOUT: u64 = 5;
pub const DEFAULT_HOME_URL: &str = "http://localhost";

/// Remote-control actions offered on the control page
pub const REMOTE_CONTROL_COMMANDS: [&str; 21] = [
    "power",
    "guide",
    "up",
    "down",
    "left",
    "right",
    "select",
    "channel_up",
    "channel_down",
    "0",
    "1",
    "2",
    "3",
    "4",
    "5",
    "6",
    "7",
    "8",
    "9",
    "last",
    "exit",
];

/// Receiver models that expose the stereo volume endpoints
pub const VOLUME_CONTROL_MODELS: [&str; 5] = [
    "3G+4+ TX",
    "3G+AVP RX",
    "3G+AVP TX",
    "3G+WP4 TX",
    "2G/3G SX",
];

/// Logging verbosity stored in the device configuration.
///
/// Errors are always logged; `info` and `debug` enable exactly that level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Error,
    Info,
    Debug,
}

impl LogLevel {
    pub const ALL: [LogLevel; 3] = [LogLevel::Error, LogLevel::Info, LogLevel::Debug];

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    /// Parse a submitted value; anything unrecognized falls back to `error`.
    pub fn from_form(value: &str) -> Self {
        match value.trim() {
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            _ => LogLevel::Error,
        }
    }
}

/// An AV receiver, keyed by name in [`ConfigSnapshot::receivers`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receiver {
    pub ip: Ipv4Addr,
    #[serde(default)]
    pub show_power: bool,
}

/// Global limits and presentation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    pub max_volume: i32,
    pub min_volume: i32,
    pub volume_step: u32,
    /// Seconds before a device call is abandoned
    pub api_timeout: u64,
    pub home_url: String,
    pub log_level: LogLevel,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            max_volume: DEFAULT_MAX_VOLUME,
            min_volume: DEFAULT_MIN_VOLUME,
            volume_step: DEFAULT_VOLUME_STEP,
            api_timeout: DEFAULT_API_TIMEOUT,
            home_url: DEFAULT_HOME_URL.to_string(),
            log_level: LogLevel::Error,
        }
    }
}

impl GlobalSettings {
    pub fn volume_in_range(&self, volume: i32) -> bool {
        (self.min_volume..=self.max_volume).contains(&volume)
    }
}

/// User-facing message templates.
///
/// `connection` accepts `{name}` and `{ip}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorMessages {
    pub connection: String,
    pub global: String,
    pub remote: String,
}

impl Default for ErrorMessages {
    fn default() -> Self {
        Self {
            connection:
                "Unable to connect to {name} ({ip}). Please check the connection and try again."
                    .to_string(),
            global: "Unable to connect to any receivers. Please check your network connection and try again."
                .to_string(),
            remote: "Unable to send remote command. Please try again.".to_string(),
        }
    }
}

impl ErrorMessages {
    pub fn connection_for(&self, name: &str, ip: &str) -> String {
        self.connection.replace("{name}", name).replace("{ip}", ip)
    }
}

/// Static enumerations written alongside the inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub remote_control_commands: Vec<String>,
    pub volume_control_models: Vec<String>,
    pub error_messages: ErrorMessages,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            remote_control_commands: REMOTE_CONTROL_COMMANDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            volume_control_models: VOLUME_CONTROL_MODELS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            error_messages: ErrorMessages::default(),
        }
    }
}

/// The full persisted configuration at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSnapshot {
    pub global: GlobalSettings,
    /// Receiver name -> receiver
    pub receivers: IndexMap<String, Receiver>,
    /// Transmitter name -> channel number
    pub transmitters: IndexMap<String, u32>,
    pub catalog: Catalog,
}

impl ConfigSnapshot {
    /// Find the configured receiver addressed by `ip`
    pub fn receiver_by_ip(&self, ip: Ipv4Addr) -> Option<(&str, &Receiver)> {
        self.receivers
            .iter()
            .find(|(_, receiver)| receiver.ip == ip)
            .map(|(name, receiver)| (name.as_str(), receiver))
    }
}

/// Shared reference to the current snapshot.
///
/// Readers clone the inner `Arc`; a reload swaps it wholesale.
#[derive(Clone, Default)]
pub struct SnapshotHandle {
    inner: Arc<RwLock<Arc<ConfigSnapshot>>>,
}

impl SnapshotHandle {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    pub async fn current(&self) -> Arc<ConfigSnapshot> {
        self.inner.read().await.clone()
    }

    pub async fn replace(&self, snapshot: ConfigSnapshot) {
        *self.inner.write().await = Arc::new(snapshot);
    }
}
