//! Generated configuration artifact (TOML)

use chrono::NaiveDateTime;

use super::model::ConfigSnapshot;

/// Render the full snapshot as the generated artifact
pub fn render(snapshot: &ConfigSnapshot, generated_at: NaiveDateTime) -> Result<String, toml::ser::Error> {
    let body = toml::to_string_pretty(snapshot)?;
    Ok(format!(
        "# Generated Configuration File\n# Last Updated: {}\n# Regenerated on every settings change; edit through the settings page.\n\n{}",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        body
    ))
}

/// Parse an artifact; absent entries take their defaults
pub fn parse(contents: &str) -> Result<ConfigSnapshot, toml::de::Error> {
    toml::from_str(contents)
}
