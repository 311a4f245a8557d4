//! Control requests from the browser
//!
//! Validates AJAX command forms against the current configuration, forwards
//! them through the [`CommandRelay`] and formats the `{success, message}`
//! reply. Also gathers the live device state the control page renders.

use serde::Serialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::device::{CommandRelay, DeviceError, DeviceTransport, IrPayloadTable, PowerCommand, RemoteTarget};
use crate::store::{ConfigSnapshot, SnapshotHandle};
use crate::ui::escape_html;

/// A parsed control form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandRequest {
    Power {
        receiver_ip: String,
        command: String,
    },
    Tune {
        receiver_ip: String,
        channel: String,
        volume: Option<String>,
    },
    Remote {
        device_url: String,
        action: String,
    },
}

impl CommandRequest {
    /// Classify submitted fields; `None` when no command shape matches
    pub fn from_form(form: &HashMap<String, String>) -> Option<Self> {
        let field = |key: &str| form.get(key).cloned();

        if let Some(receiver_ip) = field("receiver_ip") {
            if let Some(command) = field("power_command") {
                return Some(CommandRequest::Power {
                    receiver_ip,
                    command,
                });
            }
            let channel = field("channel")?;
            return Some(CommandRequest::Tune {
                receiver_ip,
                channel,
                volume: field("volume").filter(|v| !v.trim().is_empty()),
            });
        }

        match (field("device_url"), field("action")) {
            (Some(device_url), Some(action)) => Some(CommandRequest::Remote { device_url, action }),
            _ => None,
        }
    }
}

/// JSON reply to a control request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandReply {
    pub success: bool,
    pub message: String,
}

impl CommandReply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    pub fn invalid_request() -> Self {
        Self::failed("Invalid request.")
    }
}

/// Volume slider state for a receiver that supports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeControl {
    pub current: i32,
    pub min: i32,
    pub max: i32,
    pub step: u32,
}

/// What the control page shows for one receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverCard {
    Ready {
        name: String,
        ip: Ipv4Addr,
        current_channel: i32,
        volume: Option<VolumeControl>,
        show_power: bool,
    },
    Unreachable {
        name: String,
        ip: Ipv4Addr,
        message: String,
    },
}

/// Wires control requests to the relay using the current snapshot
#[derive(Clone)]
pub struct ControlService {
    transport: Arc<dyn DeviceTransport>,
    snapshot: SnapshotHandle,
    payloads_path: PathBuf,
    targets_path: PathBuf,
}

impl ControlService {
    pub fn new(
        transport: Arc<dyn DeviceTransport>,
        snapshot: SnapshotHandle,
        payloads_path: impl Into<PathBuf>,
        targets_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            snapshot,
            payloads_path: payloads_path.into(),
            targets_path: targets_path.into(),
        }
    }

    fn relay(&self, snapshot: &ConfigSnapshot) -> CommandRelay {
        CommandRelay::from_snapshot(self.transport.clone(), snapshot)
    }

    /// IR payloads, re-read from disk
    pub fn payloads(&self) -> IrPayloadTable {
        IrPayloadTable::load(&self.payloads_path)
    }

    /// IR transmitters for the remote-control panel
    pub fn remote_targets(&self) -> Vec<RemoteTarget> {
        RemoteTarget::load_list(&self.targets_path)
    }

    pub async fn handle(&self, request: CommandRequest) -> CommandReply {
        let snapshot = self.snapshot.current().await;
        match request {
            CommandRequest::Power {
                receiver_ip,
                command,
            } => self.power(&snapshot, &receiver_ip, &command).await,
            CommandRequest::Tune {
                receiver_ip,
                channel,
                volume,
            } => self.tune(&snapshot, &receiver_ip, &channel, volume.as_deref()).await,
            CommandRequest::Remote { device_url, action } => {
                self.remote(&snapshot, &device_url, &action).await
            }
        }
    }

    async fn power(&self, snapshot: &ConfigSnapshot, receiver_ip: &str, command: &str) -> CommandReply {
        let allowed = receiver_ip
            .trim()
            .parse::<Ipv4Addr>()
            .ok()
            .and_then(|ip| snapshot.receiver_by_ip(ip))
            .filter(|(_, receiver)| receiver.show_power);
        let Some((name, receiver)) = allowed else {
            info!(receiver_ip, "Power command refused for receiver without power control");
            return CommandReply::failed("Power control not enabled for this receiver.");
        };
        let Some(command) = PowerCommand::from_script(command) else {
            info!(receiver = name, command, "Rejected power command");
            return CommandReply::failed("Invalid power command.");
        };

        match self.relay(snapshot).send_power(receiver.ip, command).await {
            Ok(()) => {
                info!(receiver = name, script = command.script(), "Power command sent");
                CommandReply::ok("Power command sent successfully.")
            }
            Err(DeviceError::Unacknowledged { .. } | DeviceError::Decode { .. }) => {
                error!(receiver = name, "Power command not acknowledged");
                CommandReply::failed("Error sending power command: Unexpected response.")
            }
            Err(e) => {
                error!(receiver = name, "Error sending power command: {}", e);
                CommandReply::failed(format!("Error sending power command: {e}"))
            }
        }
    }

    async fn tune(
        &self,
        snapshot: &ConfigSnapshot,
        receiver_ip: &str,
        channel: &str,
        volume: Option<&str>,
    ) -> CommandReply {
        let Some((name, receiver)) = receiver_ip
            .trim()
            .parse::<Ipv4Addr>()
            .ok()
            .and_then(|ip| snapshot.receiver_by_ip(ip))
        else {
            return CommandReply::failed("Unknown receiver.");
        };
        let Some(channel) = channel.trim().parse::<u32>().ok().filter(|c| *c >= 1) else {
            return CommandReply::failed("Invalid channel.");
        };
        let global = &snapshot.global;
        let volume = match volume {
            None => None,
            Some(raw) => match raw.trim().parse::<i32>() {
                Ok(v) if global.volume_in_range(v) => Some(v),
                _ => {
                    return CommandReply::failed(format!(
                        "Volume must be between {} and {}.",
                        global.min_volume, global.max_volume
                    ))
                }
            },
        };

        let relay = self.relay(snapshot);
        let mut message = String::new();

        let channel_ok = report(&mut message, "Channel", relay.set_channel(receiver.ip, channel).await, name);
        let mut volume_ok = true;
        if let Some(volume) = volume {
            if relay.supports_volume_control(receiver.ip).await {
                volume_ok = report(&mut message, "Volume", relay.set_volume(receiver.ip, volume).await, name);
            } else {
                debug!(receiver = name, "Volume ignored, receiver has no volume control");
            }
        }

        CommandReply {
            success: channel_ok && volume_ok,
            message,
        }
    }

    async fn remote(&self, snapshot: &ConfigSnapshot, device_url: &str, action: &str) -> CommandReply {
        let payloads = self.payloads();
        match self
            .relay(snapshot)
            .send_ir_action(device_url, action, &payloads)
            .await
        {
            Ok(()) => {
                info!(device_url, action, "Remote command sent");
                CommandReply::ok("Command sent successfully")
            }
            Err(DeviceError::UnknownAction { action }) => {
                CommandReply::failed(format!("Invalid action: {}", escape_html(&action)))
            }
            Err(e) => {
                error!(device_url, action, "Error sending remote command: {}", e);
                CommandReply::failed(format!("Error sending command: {e}"))
            }
        }
    }

    /// Replay an IR action for the legacy `/api` endpoint
    pub async fn relay_ir(&self, device_url: &str, action: &str) -> Result<(), DeviceError> {
        let snapshot = self.snapshot.current().await;
        let result = self
            .relay(&snapshot)
            .send_ir_action(device_url, action, &self.payloads())
            .await;
        if let Err(e) = &result {
            error!(device_url, action, "IR relay failed: {}", e);
        }
        result
    }

    /// Probe receivers in order, stopping at the first one that answers
    pub async fn any_receiver_reachable(&self, snapshot: &ConfigSnapshot) -> bool {
        let relay = self.relay(snapshot);
        for (name, receiver) in &snapshot.receivers {
            match relay.query_channel(receiver.ip).await {
                Ok(_) => return true,
                Err(e) => debug!(receiver = %name, "Receiver not reachable: {}", e),
            }
        }
        false
    }

    /// Fresh device state for every configured receiver
    pub async fn receiver_cards(&self, snapshot: &ConfigSnapshot) -> Vec<ReceiverCard> {
        let relay = self.relay(snapshot);
        let global = &snapshot.global;
        let mut cards = Vec::with_capacity(snapshot.receivers.len());

        for (name, receiver) in &snapshot.receivers {
            let current_channel = match relay.query_channel(receiver.ip).await {
                Ok(channel) => channel,
                Err(e) => {
                    error!(receiver = %name, ip = %receiver.ip, "Error getting current channel: {}", e);
                    cards.push(ReceiverCard::Unreachable {
                        name: name.clone(),
                        ip: receiver.ip,
                        message: snapshot
                            .catalog
                            .error_messages
                            .connection_for(name, &receiver.ip.to_string()),
                    });
                    continue;
                }
            };

            let volume = if relay.supports_volume_control(receiver.ip).await {
                Some(VolumeControl {
                    current: relay
                        .current_volume(receiver.ip)
                        .await
                        .unwrap_or(global.min_volume),
                    min: global.min_volume,
                    max: global.max_volume,
                    step: global.volume_step,
                })
            } else {
                None
            };

            cards.push(ReceiverCard::Ready {
                name: name.clone(),
                ip: receiver.ip,
                current_channel,
                volume,
                show_power: receiver.show_power,
            });
        }
        cards
    }
}

/// Append a `Label: ...` line and return whether the command succeeded
fn report(message: &mut String, label: &str, result: Result<(), DeviceError>, receiver: &str) -> bool {
    match result {
        Ok(()) => {
            message.push_str(&format!("{label}: Successfully updated\n"));
            info!(receiver, "{} updated", label);
            true
        }
        Err(e) => {
            message.push_str(&format!("{label}: Update failed\n"));
            error!(receiver, "{} update failed: {}", label, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::relay::testing::RecordingTransport;
    use crate::device::relay::{ENDPOINT_CHANNEL, ENDPOINT_CLI, ENDPOINT_MODEL, ENDPOINT_SET_CHANNEL, ENDPOINT_SET_VOLUME};
    use crate::store::Receiver;
    use std::fs;
    use tempfile::TempDir;

    fn snapshot() -> ConfigSnapshot {
        let mut snapshot = ConfigSnapshot::default();
        snapshot.receivers.insert(
            "Lobby".to_string(),
            Receiver {
                ip: Ipv4Addr::new(10, 0, 0, 5),
                show_power: false,
            },
        );
        snapshot.receivers.insert(
            "Bar TV 1".to_string(),
            Receiver {
                ip: Ipv4Addr::new(10, 0, 0, 6),
                show_power: true,
            },
        );
        snapshot.transmitters.insert("Apple TV".to_string(), 7);
        snapshot
    }

    fn service(transport: Arc<RecordingTransport>) -> (TempDir, ControlService) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("payloads.txt"), "power=AABBCC\nguide=DDEEFF\n").unwrap();
        let service = ControlService::new(
            transport,
            SnapshotHandle::new(snapshot()),
            dir.path().join("payloads.txt"),
            dir.path().join("transmitters.txt"),
        );
        (dir, service)
    }

    fn power(ip: &str, command: &str) -> CommandRequest {
        CommandRequest::Power {
            receiver_ip: ip.to_string(),
            command: command.to_string(),
        }
    }

    fn tune(channel: &str, volume: Option<&str>) -> CommandRequest {
        CommandRequest::Tune {
            receiver_ip: "10.0.0.6".to_string(),
            channel: channel.to_string(),
            volume: volume.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn power_refused_without_show_power_and_no_device_call() {
        let transport = RecordingTransport::new();
        let (_dir, service) = service(transport.clone());

        let reply = service.handle(power("10.0.0.5", "cec_tv_on.sh")).await;

        assert_eq!(
            reply,
            CommandReply::failed("Power control not enabled for this receiver.")
        );
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn power_script_must_be_allow_listed() {
        let transport = RecordingTransport::new();
        let (_dir, service) = service(transport.clone());

        let reply = service.handle(power("10.0.0.6", "reboot.sh")).await;

        assert_eq!(reply, CommandReply::failed("Invalid power command."));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn power_reply_reflects_acknowledgement() {
        let transport = RecordingTransport::new();
        let (_dir, service) = service(transport.clone());

        transport.reply(ENDPOINT_CLI, "OK");
        assert_eq!(
            service.handle(power("10.0.0.6", "cec_tv_on.sh")).await,
            CommandReply::ok("Power command sent successfully.")
        );

        transport.reply(ENDPOINT_CLI, "BUSY");
        assert_eq!(
            service.handle(power("10.0.0.6", "cec_tv_off.sh")).await,
            CommandReply::failed("Error sending power command: Unexpected response.")
        );

        transport.reply_raw(ENDPOINT_CLI, Err(DeviceError::transport("timed out")));
        assert_eq!(
            service.handle(power("10.0.0.6", "cec_tv_off.sh")).await,
            CommandReply::failed("Error sending power command: Transport error: timed out")
        );
    }

    #[tokio::test]
    async fn tune_validates_before_any_device_call() {
        let transport = RecordingTransport::new();
        let (_dir, service) = service(transport.clone());

        assert_eq!(
            service.handle(tune("7", Some("12"))).await,
            CommandReply::failed("Volume must be between 0 and 11.")
        );
        assert_eq!(
            service.handle(tune("0", None)).await,
            CommandReply::failed("Invalid channel.")
        );
        let unknown = CommandRequest::Tune {
            receiver_ip: "10.9.9.9".to_string(),
            channel: "7".to_string(),
            volume: None,
        };
        assert_eq!(service.handle(unknown).await, CommandReply::failed("Unknown receiver."));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn tune_sets_channel_and_volume() {
        let transport = RecordingTransport::new();
        transport.reply(ENDPOINT_SET_CHANNEL, "OK");
        transport.reply(ENDPOINT_MODEL, "3G+AVP RX");
        transport.reply(ENDPOINT_SET_VOLUME, "OK");
        let (_dir, service) = service(transport.clone());

        let reply = service.handle(tune("7", Some("0"))).await;

        assert_eq!(
            reply,
            CommandReply::ok("Channel: Successfully updated\nVolume: Successfully updated\n")
        );
        let bodies: Vec<_> = transport
            .sent()
            .into_iter()
            .map(|r| (r.endpoint, r.body))
            .collect();
        assert_eq!(
            bodies,
            vec![
                (ENDPOINT_SET_CHANNEL.to_string(), Some("7".to_string())),
                (ENDPOINT_MODEL.to_string(), None),
                (ENDPOINT_SET_VOLUME.to_string(), Some("0".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn tune_reports_failed_channel() {
        let transport = RecordingTransport::new();
        transport.reply(ENDPOINT_SET_CHANNEL, "ERR");
        let (_dir, service) = service(transport.clone());

        let reply = service.handle(tune("7", None)).await;

        assert_eq!(reply, CommandReply::failed("Channel: Update failed\n"));
    }

    #[tokio::test]
    async fn remote_action_is_escaped_when_unknown() {
        let transport = RecordingTransport::new();
        let (_dir, service) = service(transport.clone());

        let reply = service
            .handle(CommandRequest::Remote {
                device_url: "http://192.168.8.201".to_string(),
                action: "<b>eject</b>".to_string(),
            })
            .await;

        assert_eq!(
            reply,
            CommandReply::failed("Invalid action: &lt;b&gt;eject&lt;/b&gt;")
        );
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn remote_action_uses_payload_file() {
        let transport = RecordingTransport::new();
        transport.reply(ENDPOINT_CLI, "OK");
        let (_dir, service) = service(transport.clone());

        let reply = service
            .handle(CommandRequest::Remote {
                device_url: "http://192.168.8.201/".to_string(),
                action: "guide".to_string(),
            })
            .await;

        assert_eq!(reply, CommandReply::ok("Command sent successfully"));
        assert_eq!(
            transport.sent()[0].body.as_deref(),
            Some(r#"echo "DDEEFF" | ./fluxhandlerV2.sh"#)
        );
    }

    #[tokio::test]
    async fn reachability_probe_stops_at_first_answer() {
        let transport = RecordingTransport::new();
        let (_dir, service) = service(transport.clone());

        assert!(!service.any_receiver_reachable(&snapshot()).await);
        assert_eq!(transport.sent().len(), 2);

        transport.reply(ENDPOINT_CHANNEL, "7");
        assert!(service.any_receiver_reachable(&snapshot()).await);
        assert_eq!(transport.sent().len(), 3);
    }

    #[tokio::test]
    async fn cards_show_unreachable_receivers_inline() {
        let transport = RecordingTransport::new();
        let (_dir, service) = service(transport.clone());

        let cards = service.receiver_cards(&snapshot()).await;

        assert_eq!(
            cards[0],
            ReceiverCard::Unreachable {
                name: "Lobby".to_string(),
                ip: Ipv4Addr::new(10, 0, 0, 5),
                message: "Unable to connect to Lobby (10.0.0.5). Please check the connection and try again."
                    .to_string(),
            }
        );
    }

    #[tokio::test]
    async fn cards_include_volume_for_capable_models() {
        let transport = RecordingTransport::new();
        transport.reply(ENDPOINT_CHANNEL, "7");
        transport.reply(ENDPOINT_MODEL, "3G+WP4 TX");
        let (_dir, service) = service(transport.clone());

        let cards = service.receiver_cards(&snapshot()).await;

        assert_eq!(
            cards[1],
            ReceiverCard::Ready {
                name: "Bar TV 1".to_string(),
                ip: Ipv4Addr::new(10, 0, 0, 6),
                current_channel: 7,
                volume: Some(VolumeControl {
                    current: 0,
                    min: 0,
                    max: 11,
                    step: 1,
                }),
                show_power: true,
            }
        );
    }

    #[test]
    fn form_classification() {
        let form = |pairs: &[(&str, &str)]| -> HashMap<String, String> {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };

        assert_eq!(
            CommandRequest::from_form(&form(&[("receiver_ip", "10.0.0.6"), ("channel", "2"), ("volume", "")])),
            Some(CommandRequest::Tune {
                receiver_ip: "10.0.0.6".to_string(),
                channel: "2".to_string(),
                volume: None,
            })
        );
        assert!(matches!(
            CommandRequest::from_form(&form(&[("receiver_ip", "10.0.0.6"), ("power_command", "cec_tv_on.sh")])),
            Some(CommandRequest::Power { .. })
        ));
        assert!(matches!(
            CommandRequest::from_form(&form(&[("device_url", "http://x"), ("action", "power")])),
            Some(CommandRequest::Remote { .. })
        ));
        assert_eq!(CommandRequest::from_form(&form(&[("receiver_ip", "10.0.0.6")])), None);
        assert_eq!(CommandRequest::from_form(&form(&[("device_url", "http://x")])), None);
    }
}
