//! Push-Channel Subscription Table
//!
//! Explicit mapping from wire event name to event kind. The push channel
//! consults this table to decide which inbound packets are part of the room
//! protocol; anything not in the table is ignored.
//!
//! The table is rebuilt from scratch on every reconnect. Rebuilding is
//! deterministic — `SubscriptionTable::standard()` always yields the same
//! mapping — and `subscribe` replaces rather than appends, so reconnecting
//! can never accumulate duplicate registrations.

use crate::events::{
    RoomEvent, EVENT_ALERT, EVENT_CHAT_MESSAGE, EVENT_ROOM_CLOSED, EVENT_SERVICE_RESPONSE,
};
use crate::{Packet, Result};
use std::collections::HashMap;
use tracing::debug;

/// Kinds of inbound room events the client understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AlertCreated,
    ChatMessage,
    RoomClosed,
    ServiceResponded,
}

/// Subscription table keyed by wire event name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionTable {
    entries: HashMap<String, EventKind>,
}

impl SubscriptionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard room-protocol subscriptions
    ///
    /// Called on every (re)connect; always returns the same mapping.
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.subscribe(EVENT_ALERT, EventKind::AlertCreated);
        table.subscribe(EVENT_CHAT_MESSAGE, EventKind::ChatMessage);
        table.subscribe(EVENT_ROOM_CLOSED, EventKind::RoomClosed);
        table.subscribe(EVENT_SERVICE_RESPONSE, EventKind::ServiceResponded);
        table
    }

    /// Register an event name; replaces any previous registration
    ///
    /// Returns `true` if the name was newly registered, `false` if an
    /// existing registration was replaced.
    pub fn subscribe(&mut self, event: &str, kind: EventKind) -> bool {
        let previous = self.entries.insert(event.to_string(), kind);
        if let Some(previous) = previous {
            debug!(event, ?previous, ?kind, "replacing subscription");
        }
        previous.is_none()
    }

    /// Remove an event name from the table
    pub fn unsubscribe(&mut self, event: &str) -> bool {
        self.entries.remove(event).is_some()
    }

    /// Kind registered for an event name, if any
    pub fn kind_of(&self, event: &str) -> Option<EventKind> {
        self.entries.get(event).copied()
    }

    /// Registered event names, sorted for stable display
    pub fn event_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Decode a packet through the table
    ///
    /// Returns `Ok(None)` for unsubscribed packet types. Known types with
    /// malformed bodies surface an `InvalidPacket` error for the caller to
    /// log and drop.
    pub fn decode(&self, packet: &Packet) -> Result<Option<RoomEvent>> {
        if self.kind_of(&packet.packet_type).is_none() {
            debug!(packet_type = %packet.packet_type, "ignoring unsubscribed packet");
            return Ok(None);
        }
        RoomEvent::from_packet(packet)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_table_contents() {
        let table = SubscriptionTable::standard();
        assert_eq!(table.len(), 4);
        assert_eq!(table.kind_of(EVENT_ALERT), Some(EventKind::AlertCreated));
        assert_eq!(
            table.kind_of(EVENT_SERVICE_RESPONSE),
            Some(EventKind::ServiceResponded)
        );
        assert_eq!(table.kind_of("lifeline.presence"), None);
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        // Reconnect path: a rebuilt table must be identical, never a
        // superset with duplicate registrations.
        let first = SubscriptionTable::standard();
        let second = SubscriptionTable::standard();
        assert_eq!(first, second);
        assert_eq!(first.event_names(), second.event_names());
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let mut table = SubscriptionTable::standard();
        let newly = table.subscribe(EVENT_CHAT_MESSAGE, EventKind::ChatMessage);
        assert!(!newly);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_decode_unsubscribed_returns_none() {
        let table = SubscriptionTable::standard();
        let packet = Packet::new("lifeline.presence", json!({ "userId": 1 }));
        assert!(table.decode(&packet).unwrap().is_none());
    }

    #[test]
    fn test_decode_after_unsubscribe() {
        let mut table = SubscriptionTable::standard();
        table.unsubscribe(EVENT_ALERT);

        let packet = Packet::new(
            EVENT_ALERT,
            json!({ "roomId": "r", "alertType": "fire", "userId": 1 }),
        );
        assert!(table.decode(&packet).unwrap().is_none());
    }

    #[test]
    fn test_decode_known_event() {
        let table = SubscriptionTable::standard();
        let packet = Packet::new(EVENT_ROOM_CLOSED, json!({ "roomId": "r9" }));

        let event = table.decode(&packet).unwrap().unwrap();
        assert_eq!(event.room_id(), "r9");
    }
}
