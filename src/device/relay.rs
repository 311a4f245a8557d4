//! Command relay - maps control intents to device endpoints
//!
//! Queries come in two flavours: `query_*` returns the typed result, while
//! `current_*` and [`CommandRelay::supports_volume_control`] log the failure
//! and degrade so page rendering can continue past an unreachable device.
//! Every command must be acknowledged with exactly `"OK"`.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use super::client::{DeviceRequest, DeviceTransport};
use super::envelope;
use super::ir::IrPayloadTable;
use super::DeviceError;
use crate::store::ConfigSnapshot;

pub const ENDPOINT_CHANNEL: &str = "details/channel";
pub const ENDPOINT_VOLUME: &str = "details/audio/stereo/volume";
pub const ENDPOINT_MODEL: &str = "details/device/model";
pub const ENDPOINT_SET_CHANNEL: &str = "command/channel";
pub const ENDPOINT_SET_VOLUME: &str = "command/audio/stereo/volume";
pub const ENDPOINT_CLI: &str = "command/cli";

/// Script on the transmitter that replays an IR code
const IR_HANDLER: &str = "./fluxhandlerV2.sh";

/// CLI line that replays `code` on an IR transmitter.
///
/// The receiving device runs this string verbatim.
pub fn ir_command_line(code: &str) -> String {
    format!("echo \"{code}\" | {IR_HANDLER}")
}

/// Display power scripts a receiver may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerCommand {
    On,
    Off,
}

impl PowerCommand {
    pub fn script(self) -> &'static str {
        match self {
            PowerCommand::On => "cec_tv_on.sh",
            PowerCommand::Off => "cec_tv_off.sh",
        }
    }

    /// Only the known script names are accepted
    pub fn from_script(name: &str) -> Option<Self> {
        match name.trim() {
            "cec_tv_on.sh" => Some(PowerCommand::On),
            "cec_tv_off.sh" => Some(PowerCommand::Off),
            _ => None,
        }
    }
}

/// Reduce a transmitter URL (`http://10.0.0.9/`, `10.0.0.9:8080`) to `host[:port]`
pub fn device_host(device_url: &str) -> Option<String> {
    let trimmed = device_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    let url = if trimmed.contains("://") {
        Url::parse(trimmed).ok()?
    } else {
        Url::parse(&format!("http://{trimmed}")).ok()?
    };
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Issues control intents against receivers and IR transmitters
#[derive(Clone)]
pub struct CommandRelay {
    transport: Arc<dyn DeviceTransport>,
    timeout: Duration,
    volume_models: Vec<String>,
}

impl CommandRelay {
    pub fn new(transport: Arc<dyn DeviceTransport>, timeout: Duration, volume_models: Vec<String>) -> Self {
        Self {
            transport,
            timeout,
            volume_models,
        }
    }

    /// Relay configured with the snapshot's timeout and volume-capable models
    pub fn from_snapshot(transport: Arc<dyn DeviceTransport>, snapshot: &ConfigSnapshot) -> Self {
        Self::new(
            transport,
            Duration::from_secs(snapshot.global.api_timeout),
            snapshot.catalog.volume_control_models.clone(),
        )
    }

    async fn call(&self, request: DeviceRequest) -> Result<String, DeviceError> {
        self.transport.send(request.with_timeout(self.timeout)).await
    }

    async fn command(&self, host: String, endpoint: &str, body: String) -> Result<(), DeviceError> {
        let reply = self
            .call(DeviceRequest::post_text(host, endpoint, body))
            .await?;
        envelope::decode_ack(&reply)
    }

    pub async fn query_channel(&self, ip: Ipv4Addr) -> Result<i32, DeviceError> {
        let reply = self.call(DeviceRequest::get(ip.to_string(), ENDPOINT_CHANNEL)).await?;
        envelope::decode_int(&reply)
    }

    pub async fn query_volume(&self, ip: Ipv4Addr) -> Result<i32, DeviceError> {
        let reply = self.call(DeviceRequest::get(ip.to_string(), ENDPOINT_VOLUME)).await?;
        envelope::decode_int(&reply)
    }

    pub async fn query_model(&self, ip: Ipv4Addr) -> Result<String, DeviceError> {
        let reply = self.call(DeviceRequest::get(ip.to_string(), ENDPOINT_MODEL)).await?;
        envelope::decode_data(&reply)
    }

    pub async fn current_channel(&self, ip: Ipv4Addr) -> Option<i32> {
        self.query_channel(ip)
            .await
            .inspect_err(|e| error!(%ip, "Error getting current channel: {}", e))
            .ok()
    }

    pub async fn current_volume(&self, ip: Ipv4Addr) -> Option<i32> {
        self.query_volume(ip)
            .await
            .inspect_err(|e| error!(%ip, "Error getting current volume: {}", e))
            .ok()
    }

    pub async fn supports_volume_control(&self, ip: Ipv4Addr) -> bool {
        match self.query_model(ip).await {
            Ok(model) => {
                let supported = self.volume_models.iter().any(|m| *m == model);
                debug!(%ip, model = %model, supported, "Receiver model");
                supported
            }
            Err(e) => {
                error!(%ip, "Error checking volume control support: {}", e);
                false
            }
        }
    }

    pub async fn set_channel(&self, ip: Ipv4Addr, channel: u32) -> Result<(), DeviceError> {
        self.command(ip.to_string(), ENDPOINT_SET_CHANNEL, channel.to_string())
            .await
    }

    pub async fn set_volume(&self, ip: Ipv4Addr, volume: i32) -> Result<(), DeviceError> {
        self.command(ip.to_string(), ENDPOINT_SET_VOLUME, volume.to_string())
            .await
    }

    /// Run a power script on the receiver. Callers check `show_power` first.
    pub async fn send_power(&self, ip: Ipv4Addr, command: PowerCommand) -> Result<(), DeviceError> {
        self.command(ip.to_string(), ENDPOINT_CLI, command.script().to_string())
            .await
    }

    /// Replay the IR code for `action` on the transmitter at `device_url`
    pub async fn send_ir_action(
        &self,
        device_url: &str,
        action: &str,
        payloads: &IrPayloadTable,
    ) -> Result<(), DeviceError> {
        let code = payloads
            .get(action)
            .ok_or_else(|| DeviceError::UnknownAction {
                action: action.to_string(),
            })?;
        let host = device_host(device_url)
            .ok_or_else(|| DeviceError::transport(format!("Invalid device URL: {device_url}")))?;
        self.command(host, ENDPOINT_CLI, ir_command_line(code)).await
    }
}
