//! Decoding of the device reply envelope `{"data": "<string>"}`

use serde_json::Value;

use super::DeviceError;

/// Acknowledgement a device returns for an accepted command
pub const ACK: &str = "OK";

/// Extract the `data` string from a raw reply
pub fn decode_data(raw: &str) -> Result<String, DeviceError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| DeviceError::decode(format!("invalid JSON ({e})")))?;
    match value.get("data") {
        Some(Value::String(data)) => Ok(data.clone()),
        Some(other) => Err(DeviceError::decode(format!("data is not a string: {other}"))),
        None => Err(DeviceError::decode("missing data field")),
    }
}

/// Succeeds only when `data` is exactly `"OK"`
pub fn decode_ack(raw: &str) -> Result<(), DeviceError> {
    let data = decode_data(raw)?;
    if data == ACK {
        Ok(())
    } else {
        Err(DeviceError::Unacknowledged { reply: data })
    }
}

/// `data` holding a base-10 integer, surrounding whitespace allowed
pub fn decode_int(raw: &str) -> Result<i32, DeviceError> {
    let data = decode_data(raw)?;
    data.trim()
        .parse()
        .map_err(|_| DeviceError::decode(format!("expected an integer, got {data:?}")))
}
