//! Settings form parsing and per-section validation

use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::Ipv4Addr;
use thiserror::Error;
use url::Url;

use super::model::{ConfigSnapshot, GlobalSettings, LogLevel, Receiver};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid IP address for receiver: {name}")]
    InvalidIp { name: String },

    #[error("Invalid channel number for transmitter: {name}")]
    InvalidChannel { name: String },

    #[error("Duplicate name: {name}")]
    DuplicateName { name: String },

    #[error("Invalid numeric value in global settings ({field})")]
    InvalidNumber { field: &'static str },

    #[error("Minimum volume must be less than maximum volume")]
    VolumeRange,

    #[error("Volume step must be greater than 0")]
    Step,

    #[error("API timeout must be greater than 0")]
    Timeout,

    #[error("Invalid home URL")]
    InvalidUrl,

    #[error("Unknown settings section: {0}")]
    UnknownSection(String),
}

/// Which part of the configuration a submission replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Receivers,
    Transmitters,
    Global,
    All,
}

impl Section {
    pub fn parse(value: Option<&str>) -> Result<Self, ValidationError> {
        match value.map(str::trim) {
            None | Some("") | Some("all") => Ok(Section::All),
            Some("receivers") => Ok(Section::Receivers),
            Some("transmitters") => Ok(Section::Transmitters),
            Some("global") => Ok(Section::Global),
            Some(other) => Err(ValidationError::UnknownSection(other.to_string())),
        }
    }

    fn includes(self, other: Section) -> bool {
        self == Section::All || self == other
    }
}

/// Raw settings submission.
///
/// Repeated row fields use `name[index]` keys; `name[]` appends.
#[derive(Debug, Default, Clone)]
pub struct SettingsForm {
    scalars: HashMap<String, String>,
    rows: HashMap<String, BTreeMap<usize, String>>,
}

impl SettingsForm {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut form = SettingsForm::default();
        let mut next_index: HashMap<String, usize> = HashMap::new();

        for (key, value) in pairs {
            match split_indexed(&key) {
                Some((base, index)) => {
                    let counter = next_index.entry(base.to_string()).or_insert(0);
                    let index = index.unwrap_or(*counter);
                    *counter = (*counter).max(index.saturating_add(1));
                    form.rows
                        .entry(base.to_string())
                        .or_default()
                        .insert(index, value);
                }
                None => {
                    form.scalars.insert(key, value);
                }
            }
        }
        form
    }

    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.scalars.get(key).map(String::as_str)
    }

    fn row(&self, base: &str, index: usize) -> Option<&str> {
        self.rows
            .get(base)
            .and_then(|values| values.get(&index))
            .map(String::as_str)
    }

    fn row_indices(&self, bases: &[&str]) -> BTreeSet<usize> {
        bases
            .iter()
            .filter_map(|base| self.rows.get(*base))
            .flat_map(|values| values.keys().copied())
            .collect()
    }

    pub fn section(&self) -> Result<Section, ValidationError> {
        Section::parse(self.scalar("section"))
    }
}

fn split_indexed(key: &str) -> Option<(&str, Option<usize>)> {
    let open = key.find('[')?;
    let inner = key[open + 1..].strip_suffix(']')?;
    let base = &key[..open];
    if inner.is_empty() {
        Some((base, None))
    } else {
        inner.parse().ok().map(|index| (base, Some(index)))
    }
}

/// Validate the sections named by `section` and stage them over `prior`.
///
/// Sections not included keep their values from `prior`; on error `prior` is
/// untouched.
pub fn validate_and_stage(
    section: Section,
    form: &SettingsForm,
    prior: &ConfigSnapshot,
) -> Result<ConfigSnapshot, ValidationError> {
    let mut staged = prior.clone();

    if section.includes(Section::Receivers) {
        staged.receivers = validate_receivers(form)?;
    }
    if section.includes(Section::Transmitters) {
        staged.transmitters = validate_transmitters(form)?;
    }
    if section.includes(Section::Global) {
        staged.global = validate_global(form)?;
    }

    Ok(staged)
}

fn validate_receivers(form: &SettingsForm) -> Result<IndexMap<String, Receiver>, ValidationError> {
    let mut receivers = IndexMap::new();

    for index in form.row_indices(&["receiver_name", "receiver_ip"]) {
        let name = form.row("receiver_name", index).unwrap_or("").trim();
        if name.is_empty() {
            continue;
        }
        let ip: Ipv4Addr = form
            .row("receiver_ip", index)
            .unwrap_or("")
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidIp {
                name: name.to_string(),
            })?;
        let show_power = form.row("receiver_power", index).map(str::trim) == Some("1");

        if receivers.contains_key(name) {
            return Err(ValidationError::DuplicateName {
                name: name.to_string(),
            });
        }
        receivers.insert(name.to_string(), Receiver { ip, show_power });
    }

    Ok(receivers)
}

fn validate_transmitters(form: &SettingsForm) -> Result<IndexMap<String, u32>, ValidationError> {
    let mut transmitters = IndexMap::new();

    for index in form.row_indices(&["transmitter_name", "transmitter_channel"]) {
        let name = form.row("transmitter_name", index).unwrap_or("").trim();
        if name.is_empty() {
            continue;
        }
        let channel = form
            .row("transmitter_channel", index)
            .unwrap_or("")
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|channel| *channel >= 1)
            .ok_or_else(|| ValidationError::InvalidChannel {
                name: name.to_string(),
            })?;

        if transmitters.contains_key(name) {
            return Err(ValidationError::DuplicateName {
                name: name.to_string(),
            });
        }
        transmitters.insert(name.to_string(), channel);
    }

    Ok(transmitters)
}

fn int_field<T: std::str::FromStr>(form: &SettingsForm, field: &'static str) -> Result<T, ValidationError> {
    form.scalar(field)
        .unwrap_or("")
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidNumber { field })
}

fn validate_global(form: &SettingsForm) -> Result<GlobalSettings, ValidationError> {
    let max_volume: i32 = int_field(form, "max_volume")?;
    let min_volume: i32 = int_field(form, "min_volume")?;
    let volume_step: i64 = int_field(form, "volume_step")?;
    let api_timeout: i64 = int_field(form, "api_timeout")?;

    if min_volume >= max_volume {
        return Err(ValidationError::VolumeRange);
    }
    let volume_step = u32::try_from(volume_step)
        .ok()
        .filter(|step| *step > 0)
        .ok_or(ValidationError::Step)?;
    let api_timeout = u64::try_from(api_timeout)
        .ok()
        .filter(|timeout| *timeout > 0)
        .ok_or(ValidationError::Timeout)?;

    let home_url = form.scalar("home_url").unwrap_or("").trim();
    match Url::parse(home_url) {
        Ok(url) if url.has_host() => {}
        _ => return Err(ValidationError::InvalidUrl),
    }

    Ok(GlobalSettings {
        max_volume,
        min_volume,
        volume_step,
        api_timeout,
        home_url: home_url.to_string(),
        log_level: LogLevel::from_form(form.scalar("log_level").unwrap_or("")),
    })
}
