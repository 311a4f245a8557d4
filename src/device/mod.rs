//! Receiver and IR transmitter control over the device HTTP API
//!
//! - [`client`]: one request/response per call against `/cgi-bin/api/...`
//! - [`envelope`]: decoding of the `{"data": "..."}` reply
//! - [`relay`]: channel, volume, power and IR intents
//! - [`ir`]: IR payload table and remote target list

pub mod client;
pub mod envelope;
pub mod ir;
pub mod relay;

pub use client::{DeviceRequest, DeviceTransport, HttpTransport, Method};
pub use ir::{IrPayloadTable, RemoteTarget};
pub use relay::{CommandRelay, PowerCommand};

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// Connection failure or timeout
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("HTTP error: {status} - Response: {body}")]
    Http { status: u16, body: String },

    #[error("Malformed response: {message}")]
    Decode { message: String },

    /// The device answered but did not acknowledge with `OK`
    #[error("Unexpected response: {reply}")]
    Unacknowledged { reply: String },

    #[error("Invalid action: {action}")]
    UnknownAction { action: String },
}

impl DeviceError {
    pub fn transport(message: impl Into<String>) -> Self {
        DeviceError::Transport {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        DeviceError::Decode {
            message: message.into(),
        }
    }
}
