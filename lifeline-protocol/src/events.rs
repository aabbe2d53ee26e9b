//! Room Event Types
//!
//! Typed views of the push-channel packets that drive the emergency room
//! lifecycle. Inbound packets are decoded into [`RoomEvent`] values; outbound
//! actions are built back into [`Packet`]s.
//!
//! ## Protocol
//!
//! **Packet Types**:
//! - Incoming: `lifeline.alert`, `lifeline.chat.message`,
//!   `lifeline.room.closed`, `lifeline.service.response`
//! - Outgoing: `lifeline.chat.message`, `lifeline.room.join`
//!
//! ## Alert (`lifeline.alert`)
//!
//! ```json
//! {
//!     "id": 1704067200000,
//!     "type": "lifeline.alert",
//!     "body": {
//!         "roomId": "room-uuid",
//!         "alertType": "fire",
//!         "details": "Apartment block, second floor",
//!         "location": { "lat": 51.5, "lng": -0.09 },
//!         "userId": 3,
//!         "userName": "Ada",
//!         "notifiedCount": 12
//!     }
//! }
//! ```
//!
//! ## Chat Message (`lifeline.chat.message`)
//!
//! ```json
//! {
//!     "id": 1704067200000,
//!     "type": "lifeline.chat.message",
//!     "body": {
//!         "roomId": "room-uuid",
//!         "userId": 7,
//!         "userName": "Grace",
//!         "message": "I'm two streets away",
//!         "sentAt": 1704067205000
//!     }
//! }
//! ```
//!
//! System messages arrive with no `userId` and `"userName": "System"`.
//!
//! ## Room Closed (`lifeline.room.closed`)
//!
//! ```json
//! {
//!     "id": 1704067200000,
//!     "type": "lifeline.room.closed",
//!     "body": { "roomId": "room-uuid" }
//! }
//! ```
//!
//! ## Service Response (`lifeline.service.response`)
//!
//! ```json
//! {
//!     "id": 1704067200000,
//!     "type": "lifeline.service.response",
//!     "body": {
//!         "roomId": "room-uuid",
//!         "alertId": 41,
//!         "serviceName": "Central Fire Station",
//!         "serviceType": "fire",
//!         "phone": "+44 20 7946 0000"
//!     }
//! }
//! ```

use crate::{Packet, ProtocolError, Result};
use serde::{Deserialize, Serialize};

/// Inbound: a new emergency alert opened a room
pub const EVENT_ALERT: &str = "lifeline.alert";

/// Inbound and outbound: a chat message within a room
pub const EVENT_CHAT_MESSAGE: &str = "lifeline.chat.message";

/// Inbound: a room was closed by the backend
pub const EVENT_ROOM_CLOSED: &str = "lifeline.room.closed";

/// Inbound: an external service responded to an alert
pub const EVENT_SERVICE_RESPONSE: &str = "lifeline.service.response";

/// Outbound: join a room before chatting in it
pub const EVENT_ROOM_JOIN: &str = "lifeline.room.join";

/// Geographic coordinates carried by alerts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// Body of a `lifeline.alert` packet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    /// Room opened for this alert
    pub room_id: String,

    /// Emergency type ("fire", "medical", ...); multiple types arrive
    /// comma-joined
    pub alert_type: String,

    /// Free-text details entered by the reporter
    #[serde(default)]
    pub details: Option<String>,

    /// Reporter's position at alert time
    #[serde(default)]
    pub location: Option<Location>,

    /// Reporter (and, unless `victimId` says otherwise, victim)
    pub user_id: i64,

    /// Reporter display name
    #[serde(default)]
    pub user_name: Option<String>,

    /// Victim id when distinct from the reporter; falls back to `userId`
    #[serde(default)]
    pub victim_id: Option<i64>,

    /// How many responders were notified
    #[serde(default)]
    pub notified_count: u32,

    /// Millisecond timestamp of alert creation, when the backend provides it
    #[serde(default)]
    pub raised_at: Option<i64>,
}

/// Body of a `lifeline.chat.message` packet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub room_id: String,

    /// Absent for system messages
    #[serde(default)]
    pub user_id: Option<i64>,

    #[serde(default)]
    pub user_name: Option<String>,

    pub message: String,

    /// Millisecond timestamp; absent on live echoes, present in history
    #[serde(default)]
    pub sent_at: Option<i64>,
}

/// Body of a `lifeline.room.closed` packet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomClosedPayload {
    pub room_id: String,
}

/// Body of a `lifeline.service.response` packet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponsePayload {
    pub room_id: String,

    #[serde(default)]
    pub alert_id: Option<i64>,

    pub service_name: String,

    pub service_type: String,

    #[serde(default)]
    pub phone: Option<String>,
}

/// A decoded inbound push-channel event
///
/// Every variant carries its room identifier; rooms are independent, so
/// arrival order only matters within a single room.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    AlertCreated(AlertPayload),
    ChatMessage(ChatPayload),
    RoomClosed(RoomClosedPayload),
    ServiceResponded(ServiceResponsePayload),
}

impl RoomEvent {
    /// Room this event belongs to
    pub fn room_id(&self) -> &str {
        match self {
            RoomEvent::AlertCreated(p) => &p.room_id,
            RoomEvent::ChatMessage(p) => &p.room_id,
            RoomEvent::RoomClosed(p) => &p.room_id,
            RoomEvent::ServiceResponded(p) => &p.room_id,
        }
    }

    /// Event name as it appears on the wire
    pub fn event_name(&self) -> &'static str {
        match self {
            RoomEvent::AlertCreated(_) => EVENT_ALERT,
            RoomEvent::ChatMessage(_) => EVENT_CHAT_MESSAGE,
            RoomEvent::RoomClosed(_) => EVENT_ROOM_CLOSED,
            RoomEvent::ServiceResponded(_) => EVENT_SERVICE_RESPONSE,
        }
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(packet: &Packet) -> Result<T> {
    serde_json::from_value(packet.body.clone()).map_err(|e| {
        ProtocolError::InvalidPacket(format!("{} body: {}", packet.packet_type, e))
    })
}

impl RoomEvent {
    /// Decode a packet into a typed event
    ///
    /// Returns `Ok(None)` for packet types outside the room protocol;
    /// unknown events are ignored rather than treated as failures.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidPacket` when a known packet type
    /// carries a malformed body.
    pub fn from_packet(packet: &Packet) -> Result<Option<RoomEvent>> {
        let event = match packet.packet_type.as_str() {
            EVENT_ALERT => RoomEvent::AlertCreated(parse_body(packet)?),
            EVENT_CHAT_MESSAGE => RoomEvent::ChatMessage(parse_body(packet)?),
            EVENT_ROOM_CLOSED => RoomEvent::RoomClosed(parse_body(packet)?),
            EVENT_SERVICE_RESPONSE => RoomEvent::ServiceResponded(parse_body(packet)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// Build an outbound join-room packet
pub fn join_room_packet(room_id: &str, user_id: i64) -> Packet {
    Packet::new(
        EVENT_ROOM_JOIN,
        serde_json::json!({
            "roomId": room_id,
            "userId": user_id
        }),
    )
}

/// Build an outbound chat-message packet
pub fn chat_message_packet(room_id: &str, user_id: i64, user_name: &str, message: &str) -> Packet {
    Packet::new(
        EVENT_CHAT_MESSAGE,
        serde_json::json!({
            "roomId": room_id,
            "userId": user_id,
            "userName": user_name,
            "message": message
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_alert() {
        let packet = Packet::new(
            EVENT_ALERT,
            json!({
                "roomId": "room-1",
                "alertType": "fire",
                "details": "second floor",
                "location": { "lat": 51.5, "lng": -0.09 },
                "userId": 3,
                "userName": "Ada",
                "notifiedCount": 12
            }),
        );

        let event = RoomEvent::from_packet(&packet).unwrap().unwrap();
        match event {
            RoomEvent::AlertCreated(alert) => {
                assert_eq!(alert.room_id, "room-1");
                assert_eq!(alert.alert_type, "fire");
                assert_eq!(alert.user_id, 3);
                assert_eq!(alert.notified_count, 12);
                assert!(alert.victim_id.is_none());
                let loc = alert.location.unwrap();
                assert!((loc.lat - 51.5).abs() < f64::EPSILON);
            }
            other => panic!("expected alert, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_system_chat_message() {
        let packet = Packet::new(
            EVENT_CHAT_MESSAGE,
            json!({
                "roomId": "room-1",
                "userName": "System",
                "message": "This emergency chat has been closed."
            }),
        );

        let event = RoomEvent::from_packet(&packet).unwrap().unwrap();
        match event {
            RoomEvent::ChatMessage(msg) => {
                assert_eq!(msg.user_id, None);
                assert_eq!(msg.user_name.as_deref(), Some("System"));
                assert_eq!(msg.sent_at, None);
            }
            other => panic!("expected chat message, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_service_response() {
        let packet = Packet::new(
            EVENT_SERVICE_RESPONSE,
            json!({
                "roomId": "room-1",
                "alertId": 41,
                "serviceName": "Central Fire Station",
                "serviceType": "fire",
                "phone": "+44 20 7946 0000"
            }),
        );

        let event = RoomEvent::from_packet(&packet).unwrap().unwrap();
        assert_eq!(event.room_id(), "room-1");
        assert_eq!(event.event_name(), EVENT_SERVICE_RESPONSE);
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        let packet = Packet::new("lifeline.presence", json!({ "userId": 1 }));
        assert!(RoomEvent::from_packet(&packet).unwrap().is_none());
    }

    #[test]
    fn test_malformed_known_type_is_an_error() {
        // roomId missing from a known packet type
        let packet = Packet::new(EVENT_ROOM_CLOSED, json!({}));
        let err = RoomEvent::from_packet(&packet).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPacket(_)));
    }

    #[test]
    fn test_outbound_builders() {
        let join = join_room_packet("room-1", 7);
        assert!(join.is_type(EVENT_ROOM_JOIN));
        assert_eq!(join.get_body_field::<String>("roomId"), Some("room-1".into()));

        let msg = chat_message_packet("room-1", 7, "Grace", "on my way");
        assert!(msg.is_type(EVENT_CHAT_MESSAGE));
        assert_eq!(msg.get_body_field::<i64>("userId"), Some(7));
        assert_eq!(msg.get_body_field::<String>("message"), Some("on my way".into()));
    }
}
