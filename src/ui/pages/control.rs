//! Control page: receiver cards and the IR remote panel

use crate::control::{ReceiverCard, VolumeControl};
use crate::device::{PowerCommand, RemoteTarget};
use crate::store::ConfigSnapshot;
use crate::ui::{escape_html, layout};

/// Everything the control page shows
pub struct IndexView<'a> {
    pub snapshot: &'a ConfigSnapshot,
    /// False when the reachability probe found no receiver answering
    pub any_reachable: bool,
    pub cards: &'a [ReceiverCard],
    pub targets: &'a [RemoteTarget],
}

pub fn render_index(view: &IndexView<'_>) -> String {
    let mut body = header(view.snapshot);

    if !view.any_reachable {
        body.push_str(&format!(
            "<div class=\"global-error\">{}</div>\n",
            escape_html(&view.snapshot.catalog.error_messages.global)
        ));
    }
    body.push_str("<div id=\"response-message\"></div>\n");
    body.push_str("<div class=\"main-container\">\n");

    body.push_str("<section id=\"av-controls\" class=\"section\">\n<div class=\"receivers-wrapper\">\n");
    if view.snapshot.receivers.is_empty() {
        body.push_str("<div class=\"error\">No receivers configured</div>\n");
    } else if view.any_reachable {
        for card in view.cards {
            body.push_str(&receiver_card(card, view.snapshot));
        }
    }
    body.push_str("</div>\n</section>\n");

    body.push_str(&remote_panel(view.snapshot, view.targets));
    body.push_str("</div>\n");

    layout("AV Controls", &body)
}

fn header(snapshot: &ConfigSnapshot) -> String {
    format!(
        r#"<header>
    <h1><a href="/settings" class="title-link">AV Controls</a></h1>
    <div class="header-buttons">
        <a href="{home}" class="button home-button">Home</a>
        <button id="power-all-on" class="button" data-command="{on}">Power All On</button>
        <button id="power-all-off" class="button" data-command="{off}">Power All Off</button>
    </div>
</header>
"#,
        home = escape_html(&snapshot.global.home_url),
        on = PowerCommand::On.script(),
        off = PowerCommand::Off.script(),
    )
}

fn receiver_card(card: &ReceiverCard, snapshot: &ConfigSnapshot) -> String {
    match card {
        ReceiverCard::Unreachable { name, message, .. } => format!(
            "<div class=\"receiver error\">\n<h2>{}</h2>\n<p class=\"error-message\">{}</p>\n</div>\n",
            escape_html(name),
            escape_html(message)
        ),
        ReceiverCard::Ready {
            name,
            ip,
            current_channel,
            volume,
            show_power,
        } => {
            let name_html = escape_html(name);
            let ip = ip.to_string();
            let mut html = format!(
                "<div class=\"receiver\">\n<form method=\"POST\" action=\"/\">\n\
                 <button type=\"button\" class=\"receiver-title\">{name_html}</button>\n\
                 <label for=\"channel_{name_html}\">Channel:</label>\n\
                 <select id=\"channel_{name_html}\" name=\"channel\">\n"
            );
            for (transmitter, channel) in &snapshot.transmitters {
                let selected = if i64::from(*channel) == i64::from(*current_channel) {
                    " selected"
                } else {
                    ""
                };
                html.push_str(&format!(
                    "<option value=\"{channel}\"{selected}>{}</option>\n",
                    escape_html(transmitter)
                ));
            }
            html.push_str("</select>\n");

            if let Some(volume) = volume {
                html.push_str(&volume_slider(&name_html, volume));
            }

            html.push_str(&format!(
                "<input type=\"hidden\" name=\"receiver_ip\" value=\"{ip}\">\n\
                 <button type=\"submit\" class=\"update-button\">Update</button>\n"
            ));

            if *show_power {
                html.push_str(&format!(
                    "<div class=\"power-buttons\">\n\
                     <button type=\"button\" class=\"power-on\" data-ip=\"{ip}\" data-command=\"{on}\">Power On</button>\n\
                     <button type=\"button\" class=\"power-off\" data-ip=\"{ip}\" data-command=\"{off}\">Power Off</button>\n\
                     </div>\n",
                    on = PowerCommand::On.script(),
                    off = PowerCommand::Off.script(),
                ));
            }
            html.push_str("</form>\n</div>\n");
            html
        }
    }
}

fn volume_slider(name_html: &str, volume: &VolumeControl) -> String {
    format!(
        "<label for=\"volume_{name_html}\">Volume:</label>\n\
         <input type=\"range\" id=\"volume_{name_html}\" name=\"volume\" min=\"{min}\" max=\"{max}\" step=\"{step}\" value=\"{current}\">\n\
         <span class=\"volume-label\">{current}</span>\n",
        min = volume.min,
        max = volume.max,
        step = volume.step,
        current = volume.current,
    )
}

fn remote_panel(snapshot: &ConfigSnapshot, targets: &[RemoteTarget]) -> String {
    let mut html = String::from(
        "<section id=\"remote-control\" class=\"section\">\n<h2>Remote Control</h2>\n<div id=\"transmitter-select\">\n",
    );
    if targets.is_empty() {
        html.push_str("No transmitters configured\n");
    } else {
        html.push_str("<label for=\"transmitter\">Select Transmitter:</label>\n<select id=\"transmitter\">\n");
        for target in targets {
            html.push_str(&format!(
                "<option value=\"{}\">{}</option>\n",
                escape_html(&target.url),
                escape_html(&target.name)
            ));
        }
        html.push_str("</select>\n");
    }
    html.push_str("</div>\n<div class=\"remote-container\">\n");
    for command in &snapshot.catalog.remote_control_commands {
        html.push_str(&format!(
            "<button type=\"button\" class=\"remote-button\" data-action=\"{}\">{}</button>\n",
            escape_html(command),
            escape_html(remote_label(command))
        ));
    }
    html.push_str(
        "</div>\n<div id=\"error-message\" class=\"error-message\"><strong>Error!</strong> <span id=\"error-text\"></span></div>\n</section>\n",
    );
    html
}

fn remote_label(command: &str) -> &str {
    match command {
        "power" => "Power",
        "guide" => "Guide",
        "up" => "▲",
        "down" => "▼",
        "left" => "◀",
        "right" => "▶",
        "select" => "OK",
        "channel_up" => "CH +",
        "channel_down" => "CH -",
        "last" => "Last",
        "exit" => "Exit",
        other => other,
    }
}
