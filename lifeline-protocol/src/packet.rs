//! Lifeline Push-Channel Packet
//!
//! This module implements the packet structure carried over the push channel.
//! Packets are JSON-formatted messages, one JSON object per WebSocket text
//! frame (a trailing newline is tolerated for line-delimited transports).
//!
//! ## Packet Structure
//!
//! Each packet contains:
//! - `id`: UNIX epoch timestamp in milliseconds
//! - `type`: Packet type in format `lifeline.<subsystem>[.<action>]`
//! - `body`: JSON dictionary of event-specific parameters
//!
//! ```json
//! {
//!     "id": 1704067200000,
//!     "type": "lifeline.chat.message",
//!     "body": {
//!         "roomId": "room-uuid",
//!         "userId": 7,
//!         "userName": "Ada",
//!         "message": "help is on the way"
//!     }
//! }
//! ```

use crate::{ProtocolError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Represents a Lifeline push-channel packet
///
/// # Examples
///
/// ```
/// use lifeline_protocol::Packet;
/// use serde_json::json;
///
/// let packet = Packet::new(
///     "lifeline.room.join",
///     json!({ "roomId": "room-1", "userId": 7 })
/// );
///
/// let bytes = packet.to_bytes().unwrap();
/// let parsed = Packet::from_bytes(&bytes).unwrap();
/// assert_eq!(parsed.packet_type, "lifeline.room.join");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Packet {
    /// UNIX timestamp in milliseconds
    /// Note: some peers send this as a string
    #[serde(deserialize_with = "deserialize_id", serialize_with = "serialize_id")]
    pub id: i64,

    /// Packet type in format: lifeline.<subsystem>[.<action>]
    ///
    /// Examples: "lifeline.alert", "lifeline.chat.message"
    #[serde(rename = "type")]
    pub packet_type: String,

    /// Event-specific parameters
    #[serde(default)]
    pub body: Value,
}

impl Packet {
    /// Creates a new packet with the specified type and body
    ///
    /// The packet ID is automatically set to the current timestamp in
    /// milliseconds.
    pub fn new(packet_type: impl Into<String>, body: Value) -> Self {
        Self {
            id: current_timestamp(),
            packet_type: packet_type.into(),
            body,
        }
    }

    /// Create a packet with an explicit timestamp
    ///
    /// Useful for testing or when you need specific timestamp control.
    pub fn with_id(id: i64, packet_type: impl Into<String>, body: Value) -> Self {
        Self {
            id,
            packet_type: packet_type.into(),
            body,
        }
    }

    /// Serialize packet to bytes with newline terminator
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let json = serde_json::to_string(self)?;
        let mut bytes = json.into_bytes();
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Deserialize a packet from bytes
    ///
    /// Accepts both newline-terminated and non-terminated JSON. Some
    /// transports may append `\r\n` (CRLF) or `\n` (LF) terminators.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidPacket` if the data is not valid JSON
    /// or doesn't conform to the packet structure.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let trimmed = data
            .strip_suffix(b"\r\n")
            .or_else(|| data.strip_suffix(b"\n"))
            .unwrap_or(data);

        serde_json::from_slice(trimmed).map_err(|e| {
            ProtocolError::InvalidPacket(format!("Failed to deserialize packet: {}", e))
        })
    }

    /// Check if packet is of a specific type
    pub fn is_type(&self, packet_type: &str) -> bool {
        self.packet_type == packet_type
    }

    /// Get a field from the body as a specific type
    pub fn get_body_field<T>(&self, key: &str) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.body
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Custom deserializer for the `id` field to handle both string and number formats
fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let value: Value = Deserialize::deserialize(deserializer)?;
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| Error::custom("Invalid number for id")),
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|_| Error::custom("Invalid string for id")),
        _ => Err(Error::custom("id must be a number or string")),
    }
}

/// Custom serializer for the `id` field - always serialize as a number
fn serialize_id<S>(id: &i64, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_i64(*id)
}

/// Generate current UNIX timestamp in milliseconds
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_packet() {
        let packet = Packet::new("lifeline.room.join", json!({}));
        assert_eq!(packet.packet_type, "lifeline.room.join");
        assert!(packet.body.is_object());
        assert!(packet.id > 0);
    }

    #[test]
    fn test_packet_serialization() {
        let packet = Packet::new(
            "lifeline.alert",
            json!({
                "roomId": "room-1",
                "alertType": "fire",
                "userId": 3
            }),
        );

        let bytes = packet.to_bytes().unwrap();
        let json_str = String::from_utf8_lossy(&bytes);

        assert!(json_str.ends_with('\n'));
        assert!(serde_json::from_str::<Value>(json_str.trim_end()).is_ok());
    }

    #[test]
    fn test_packet_deserialization() {
        let json_data = r#"{"id":1234567890,"type":"lifeline.room.closed","body":{"roomId":"r"}}"#;
        let packet = Packet::from_bytes(json_data.as_bytes()).unwrap();

        assert_eq!(packet.id, 1234567890);
        assert_eq!(packet.packet_type, "lifeline.room.closed");
        assert_eq!(packet.get_body_field::<String>("roomId"), Some("r".to_string()));
    }

    #[test]
    fn test_packet_deserialization_with_newline() {
        let json_data =
            r#"{"id":1234567890,"type":"lifeline.room.closed","body":{}}"#.to_string() + "\n";
        let packet = Packet::from_bytes(json_data.as_bytes()).unwrap();

        assert_eq!(packet.packet_type, "lifeline.room.closed");
    }

    #[test]
    fn test_id_as_string() {
        // Some peers send id as string
        let json_data = r#"{"id":"1234567890","type":"lifeline.alert","body":{}}"#;
        let packet = Packet::from_bytes(json_data.as_bytes()).unwrap();

        assert_eq!(packet.id, 1234567890);
    }

    #[test]
    fn test_missing_body_defaults_to_null() {
        let json_data = r#"{"id":1,"type":"lifeline.alert"}"#;
        let packet = Packet::from_bytes(json_data.as_bytes()).unwrap();

        assert!(packet.body.is_null());
    }

    #[test]
    fn test_is_type() {
        let packet = Packet::new("lifeline.chat.message", json!({}));
        assert!(packet.is_type("lifeline.chat.message"));
        assert!(!packet.is_type("lifeline.alert"));
    }

    #[test]
    fn test_invalid_packet() {
        let invalid_json = b"not json data";
        let result = Packet::from_bytes(invalid_json);
        assert!(result.is_err());
    }
}
