//! Settings page.
//!
//! Lets an administrator:
//! - edit receivers (name, IP, power control)
//! - edit transmitters (name, channel)
//! - change global limits, home URL and log level
//! - restore one of the recent configuration backups
//!
//! Row fields carry explicit indices (`receiver_name[3]`) so an unchecked
//! power box cannot shift later rows.

use crate::store::{BackupEntry, BackupKind, ConfigSnapshot, LogLevel, MAX_BACKUPS};
use crate::ui::{escape_html, layout, Flash};

pub struct SettingsView<'a> {
    pub snapshot: &'a ConfigSnapshot,
    pub backups: &'a [BackupEntry],
    /// `Err` holds the reason the artifact cannot be rewritten
    pub writable: Result<(), String>,
    pub flash: Option<Flash>,
}

/// Client-side confirmation prompts for the settings forms.
const SETTINGS_SCRIPT: &str = r#"
document.querySelectorAll('button[name="section"]').forEach(function (button) {
    button.addEventListener('click', function (event) {
        const message = button.value === 'all'
            ? 'Are you sure you want to save all changes?'
            : 'Are you sure you want to save changes to ' + button.value + '?';
        if (!confirm(message)) {
            event.preventDefault();
        }
    });
});

const restoreForm = document.getElementById('restore-form');
if (restoreForm) {
    restoreForm.addEventListener('submit', function (event) {
        const selected = document.getElementById('backup_file').value;
        if (!confirm('Restore configuration from ' + selected + '? The current configuration will be backed up first.')) {
            event.preventDefault();
        }
    });
}
"#;

pub fn render_settings(view: &SettingsView<'_>) -> String {
    let mut body = String::from(
        "<header>\n<h1>AV Controls Settings</h1>\n<div class=\"header-buttons\"><a href=\"/\" class=\"button home-button\">Back to Controls</a></div>\n</header>\n",
    );

    if let Some(flash) = &view.flash {
        body.push_str(&flash.render());
    }
    if let Err(reason) = &view.writable {
        body.push_str(&format!(
            "<div class=\"message error\">{}</div>\n",
            escape_html(reason)
        ));
    }

    body.push_str("<form method=\"POST\" action=\"/settings\">\n");
    body.push_str(&receivers_section(view.snapshot));
    body.push_str(&transmitters_section(view.snapshot));
    body.push_str(&global_section(view.snapshot));
    body.push_str(&format!(
        "<div class=\"save-all\">\n\
         <button type=\"submit\" name=\"section\" value=\"all\" class=\"button home-button\">Save All Changes</button>\n\
         <div class=\"backup-info\">A backup of the current configuration is created before saving. \
         Only the {MAX_BACKUPS} most recent backups are kept.</div>\n\
         </div>\n</form>\n"
    ));

    body.push_str(&restore_section(view.backups));
    body.push_str(&format!("<script>{SETTINGS_SCRIPT}</script>\n"));

    layout("AV Controls Settings", &body)
}

fn receivers_section(snapshot: &ConfigSnapshot) -> String {
    let mut html = String::from("<section class=\"section\">\n<h2>Receivers Configuration</h2>\n");
    let rows = snapshot
        .receivers
        .iter()
        .map(|(name, receiver)| (name.as_str(), receiver.ip.to_string(), receiver.show_power))
        .chain(std::iter::once(("", String::new(), false)));

    for (index, (name, ip, show_power)) in rows.enumerate() {
        let checked = if show_power { " checked" } else { "" };
        html.push_str(&format!(
            "<div class=\"config-row\">\n\
             <input type=\"text\" name=\"receiver_name[{index}]\" value=\"{name}\" placeholder=\"Receiver name\" class=\"config-input\">\n\
             <input type=\"text\" name=\"receiver_ip[{index}]\" value=\"{ip}\" placeholder=\"192.168.1.100\" class=\"config-input\">\n\
             <label><input type=\"checkbox\" name=\"receiver_power[{index}]\" value=\"1\"{checked}> Show power</label>\n\
             </div>\n",
            name = escape_html(name),
            ip = escape_html(&ip),
        ));
    }
    html.push_str(
        "<button type=\"submit\" name=\"section\" value=\"receivers\" class=\"apply-button\">Apply Receiver Changes</button>\n</section>\n",
    );
    html
}

fn transmitters_section(snapshot: &ConfigSnapshot) -> String {
    let mut html = String::from("<section class=\"section\">\n<h2>Transmitters Configuration</h2>\n");
    let rows = snapshot
        .transmitters
        .iter()
        .map(|(name, channel)| (name.as_str(), channel.to_string()))
        .chain(std::iter::once(("", String::new())));

    for (index, (name, channel)) in rows.enumerate() {
        html.push_str(&format!(
            "<div class=\"config-row\">\n\
             <input type=\"text\" name=\"transmitter_name[{index}]\" value=\"{name}\" placeholder=\"Transmitter name\" class=\"config-input\">\n\
             <input type=\"number\" min=\"1\" name=\"transmitter_channel[{index}]\" value=\"{channel}\" placeholder=\"Channel\" class=\"config-input\">\n\
             </div>\n",
            name = escape_html(name),
        ));
    }
    html.push_str(
        "<button type=\"submit\" name=\"section\" value=\"transmitters\" class=\"apply-button\">Apply Transmitter Changes</button>\n</section>\n",
    );
    html
}

fn global_section(snapshot: &ConfigSnapshot) -> String {
    let global = &snapshot.global;
    let mut html = String::from("<section class=\"section\">\n<h2>Global Settings</h2>\n");

    for (field, label, value) in [
        ("max_volume", "Maximum Volume", global.max_volume.to_string()),
        ("min_volume", "Minimum Volume", global.min_volume.to_string()),
        ("volume_step", "Volume Step", global.volume_step.to_string()),
        ("api_timeout", "API Timeout (seconds)", global.api_timeout.to_string()),
    ] {
        html.push_str(&format!(
            "<div class=\"config-row\"><label for=\"{field}\">{label}</label>\
             <input type=\"number\" id=\"{field}\" name=\"{field}\" value=\"{value}\" class=\"config-input\"></div>\n"
        ));
    }

    html.push_str(&format!(
        "<div class=\"config-row\"><label for=\"home_url\">Home URL</label>\
         <input type=\"url\" id=\"home_url\" name=\"home_url\" value=\"{}\" class=\"config-input\"></div>\n",
        escape_html(&global.home_url)
    ));

    html.push_str("<div class=\"config-row\"><label for=\"log_level\">Log Level</label><select id=\"log_level\" name=\"log_level\" class=\"config-input\">\n");
    for level in LogLevel::ALL {
        let selected = if level == global.log_level { " selected" } else { "" };
        html.push_str(&format!(
            "<option value=\"{value}\"{selected}>{value}</option>\n",
            value = level.as_str()
        ));
    }
    html.push_str("</select></div>\n");

    html.push_str(
        "<button type=\"submit\" name=\"section\" value=\"global\" class=\"apply-button\">Apply Global Changes</button>\n</section>\n",
    );
    html
}

fn restore_section(backups: &[BackupEntry]) -> String {
    let mut html = String::from("<section class=\"section\">\n<h2>Restore Configuration</h2>\n");
    if backups.is_empty() {
        html.push_str("<p>No backup files available.</p>\n</section>\n");
        return html;
    }

    html.push_str(
        "<form id=\"restore-form\" method=\"POST\" action=\"/settings/restore\">\n\
         <label for=\"backup_file\">Select Backup File</label>\n\
         <select name=\"backup_file\" id=\"backup_file\" class=\"config-input\" required>\n",
    );
    for backup in backups {
        let suffix = match backup.kind {
            BackupKind::Regular => "",
            BackupKind::PreRestore => " (before restore)",
        };
        html.push_str(&format!(
            "<option value=\"{}\">{}{suffix}</option>\n",
            escape_html(&backup.name),
            backup.taken_at.format("%Y-%m-%d %H:%M:%S UTC"),
        ));
    }
    html.push_str(
        "</select>\n\
         <div class=\"backup-warning\">Restoring a backup overwrites the current configuration. \
         The current configuration is backed up first.</div>\n\
         <button type=\"submit\" class=\"restore-button\">Restore Selected Backup</button>\n\
         </form>\n</section>\n",
    );
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Receiver;
    use chrono::NaiveDate;
    use std::net::Ipv4Addr;
    use std::path::PathBuf;

    fn snapshot() -> ConfigSnapshot {
        let mut snapshot = ConfigSnapshot::default();
        snapshot.receivers.insert(
            "Lobby".to_string(),
            Receiver {
                ip: Ipv4Addr::new(10, 0, 0, 5),
                show_power: true,
            },
        );
        snapshot.transmitters.insert("Apple \"TV\"".to_string(), 7);
        snapshot.global.log_level = LogLevel::Info;
        snapshot
    }

    #[test]
    fn rows_are_indexed_with_a_blank_row_to_add() {
        let snapshot = snapshot();
        let html = render_settings(&SettingsView {
            snapshot: &snapshot,
            backups: &[],
            writable: Ok(()),
            flash: None,
        });

        assert!(html.contains("name=\"receiver_name[0]\" value=\"Lobby\""));
        assert!(html.contains("name=\"receiver_power[0]\" value=\"1\" checked"));
        assert!(html.contains("name=\"receiver_name[1]\" value=\"\""));
        assert!(html.contains("value=\"Apple &quot;TV&quot;\""));
        assert!(html.contains("<option value=\"info\" selected>info</option>"));
        assert!(html.contains("No backup files available."));
    }

    #[test]
    fn shows_backups_and_write_problems() {
        let snapshot = snapshot();
        let backups = [BackupEntry {
            name: "config_backup_pre_restore_2024-11-03_09-30-00.toml".to_string(),
            path: PathBuf::from("config_backup_pre_restore_2024-11-03_09-30-00.toml"),
            kind: BackupKind::PreRestore,
            taken_at: NaiveDate::from_ymd_opt(2024, 11, 3)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            sequence: 0,
        }];

        let html = render_settings(&SettingsView {
            snapshot: &snapshot,
            backups: &backups,
            writable: Err("Config file is not writable.".to_string()),
            flash: Some(Flash::success("Configuration updated successfully")),
        });

        assert!(html.contains("2024-11-03 09:30:00 UTC (before restore)"));
        assert!(html.contains("Config file is not writable."));
        assert!(html.contains("message success"));
    }
}
