//! Room Registry
//!
//! In-memory state for active emergency rooms: alert metadata, the chat
//! message log, service responses, unread counters, and the closed flag.
//! The registry owns all mutation; it never renders and never performs I/O.
//!
//! Rooms are created lazily on first observation of an alert or a chat
//! message referencing an unknown room id, and are never deleted — a closed
//! flag models logical end-of-life for the rest of the client session.
//!
//! ## Message identity
//!
//! Two inbound messages with the same (sender id, text, sent-at) tuple are
//! the same message; the second delivery is discarded. Live echoes carry no
//! `sentAt`, so an optimistic local append and its broadcast echo collapse
//! into one record.

use crate::events::{AlertPayload, ChatPayload, Location, ServiceResponsePayload};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;

/// Whether a message was authored locally or arrived from the push channel
///
/// Closed rooms reject outbound messages only; inbound traffic (including
/// the backend's own system messages) is always accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// One chat message within a room
///
/// Immutable once created. `sender_id` is absent for system messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author id; `None` for backend system messages
    pub sender_id: Option<i64>,

    /// Author display name ("System" for system messages)
    pub sender_name: Option<String>,

    /// Message text
    pub text: String,

    /// Millisecond timestamp; absent on live echoes
    pub sent_at: Option<i64>,
}

impl ChatMessage {
    /// Create a message authored by a known user
    pub fn new(sender_id: i64, sender_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender_id: Some(sender_id),
            sender_name: Some(sender_name.into()),
            text: text.into(),
            sent_at: None,
        }
    }

    /// Create a synthetic system message
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            sender_id: None,
            sender_name: Some("System".to_string()),
            text: text.into(),
            sent_at: None,
        }
    }

    /// Dedupe identity: (sender id, text, sent-at)
    fn dedupe_key(&self) -> (Option<i64>, &str, Option<i64>) {
        (self.sender_id, self.text.as_str(), self.sent_at)
    }

    /// Whether two deliveries represent the same message
    pub fn is_duplicate_of(&self, other: &ChatMessage) -> bool {
        self.dedupe_key() == other.dedupe_key()
    }
}

impl From<ChatPayload> for ChatMessage {
    fn from(payload: ChatPayload) -> Self {
        Self {
            sender_id: payload.user_id,
            sender_name: payload.user_name,
            text: payload.message,
            sent_at: payload.sent_at,
        }
    }
}

/// Snapshot of the alert that opened a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertData {
    /// Emergency type ("fire", "medical", ...); multiple types comma-joined
    pub alert_type: String,

    /// Free-text details entered by the reporter
    pub details: Option<String>,

    /// Reporter's position at alert time
    pub location: Option<Location>,

    /// Reporter id
    pub reporter_id: i64,

    /// Reporter display name
    pub reporter_name: Option<String>,

    /// Victim id; the reporter unless the alert says otherwise
    pub victim_id: i64,

    /// How many responders were notified
    pub notified_count: u32,

    /// Millisecond timestamp of alert creation, when known
    pub raised_at: Option<i64>,
}

impl From<&AlertPayload> for AlertData {
    fn from(payload: &AlertPayload) -> Self {
        Self {
            alert_type: payload.alert_type.clone(),
            details: payload.details.clone(),
            location: payload.location,
            reporter_id: payload.user_id,
            reporter_name: payload.user_name.clone(),
            victim_id: payload.victim_id.unwrap_or(payload.user_id),
            notified_count: payload.notified_count,
            raised_at: payload.raised_at,
        }
    }
}

/// One responding service's record for a room
///
/// Kept separate from the chat log; ordering and dedupe are a policy
/// decision made by the reconciler, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub service_name: String,
    pub service_type: String,
    pub phone: Option<String>,

    /// Millisecond timestamp stamped on arrival
    pub received_at: i64,
}

impl ServiceResponse {
    /// Build a record from a payload, stamping the arrival time
    pub fn from_payload(payload: &ServiceResponsePayload, received_at: i64) -> Self {
        Self {
            service_name: payload.service_name.clone(),
            service_type: payload.service_type.clone(),
            phone: payload.phone.clone(),
            received_at,
        }
    }

    /// Identity used when collapsing duplicates (arrival time excluded)
    pub fn same_service(&self, other: &ServiceResponse) -> bool {
        self.service_name == other.service_name
            && self.service_type == other.service_type
            && self.phone == other.phone
    }
}

/// One active emergency session
#[derive(Debug, Clone)]
pub struct Room {
    /// Opaque room identifier, unique key
    pub room_id: String,

    /// Alert snapshot; absent when the room was lazily created from a chat
    /// message and the alert has not been observed yet
    pub alert: Option<AlertData>,

    messages: Vec<ChatMessage>,
    responses: Vec<ServiceResponse>,
    unread: u32,
    closed: bool,
}

impl Room {
    fn new(room_id: impl Into<String>, alert: Option<AlertData>) -> Self {
        Self {
            room_id: room_id.into(),
            alert,
            messages: Vec::new(),
            responses: Vec::new(),
            unread: 0,
            closed: false,
        }
    }

    /// Chat log in acceptance order
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Service responses in arrival order
    pub fn responses(&self) -> &[ServiceResponse] {
        &self.responses
    }

    /// Unread counter for list badges
    pub fn unread(&self) -> u32 {
        self.unread
    }

    /// Whether the room has been closed; monotonic
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Victim id for message classification, when the alert is known
    pub fn victim_id(&self) -> Option<i64> {
        self.alert.as_ref().map(|a| a.victim_id)
    }

    fn holds_duplicate(&self, message: &ChatMessage) -> bool {
        self.messages.iter().any(|m| m.is_duplicate_of(message))
    }
}

/// In-memory mapping of room id to room state
///
/// Owns all mutation triggered by push events or local actions. Iteration
/// follows insertion order so the room list renders stably as rooms are
/// added.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    order: Vec<String>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the existing room or create one with zero unread, an empty
    /// message list and `closed = false`
    ///
    /// An existing room's accumulated messages and unread count are never
    /// overwritten; a previously missing alert snapshot is filled in when
    /// one becomes known.
    pub fn ensure_room(&mut self, room_id: &str, alert: Option<AlertData>) -> &mut Room {
        match self.rooms.entry(room_id.to_string()) {
            Entry::Vacant(entry) => {
                debug!(room_id, "creating room");
                self.order.push(room_id.to_string());
                entry.insert(Room::new(room_id, alert))
            }
            Entry::Occupied(entry) => {
                let room = entry.into_mut();
                if room.alert.is_none() {
                    if let Some(alert) = alert {
                        room.alert = Some(alert);
                    }
                }
                room
            }
        }
    }

    /// Append a message to a room's log
    ///
    /// Returns `false` without mutating when an identical message (by dedupe
    /// key) is already held, or when the room is closed and the message is
    /// outbound. The room is created lazily if unknown.
    pub fn append_message(
        &mut self,
        room_id: &str,
        message: ChatMessage,
        direction: Direction,
    ) -> bool {
        let room = self.ensure_room(room_id, None);

        if room.closed && direction == Direction::Outbound {
            debug!(room_id, "rejecting outbound message for closed room");
            return false;
        }
        if room.holds_duplicate(&message) {
            debug!(room_id, "discarding duplicate message");
            return false;
        }

        room.messages.push(message);
        true
    }

    /// Mark a room closed; idempotent, never reverts
    pub fn set_closed(&mut self, room_id: &str) {
        let room = self.ensure_room(room_id, None);
        if !room.closed {
            debug!(room_id, "room closed");
            room.closed = true;
        }
    }

    /// Reset a room's unread counter to zero
    pub fn mark_read(&mut self, room_id: &str) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.unread = 0;
        }
    }

    /// Bump a room's unread counter
    pub fn increment_unread(&mut self, room_id: &str) {
        let room = self.ensure_room(room_id, None);
        room.unread = room.unread.saturating_add(1);
    }

    /// Replace a room's message log with an authoritative history
    ///
    /// Last-writer-wins: interleaved live messages are dropped unless the
    /// caller merged them beforehand.
    pub fn replace_messages(&mut self, room_id: &str, messages: Vec<ChatMessage>) {
        let room = self.ensure_room(room_id, None);
        room.messages = messages;
    }

    /// Append a service response record
    pub fn append_response(&mut self, room_id: &str, response: ServiceResponse) {
        let room = self.ensure_room(room_id, None);
        room.responses.push(response);
    }

    /// Look up a room
    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Whether the registry holds the room
    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Rooms in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.order.iter().filter_map(|id| self.rooms.get(id))
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(reporter: i64) -> AlertData {
        AlertData {
            alert_type: "fire".to_string(),
            details: Some("second floor".to_string()),
            location: Some(Location { lat: 51.5, lng: -0.09 }),
            reporter_id: reporter,
            reporter_name: Some("Ada".to_string()),
            victim_id: reporter,
            notified_count: 4,
            raised_at: None,
        }
    }

    #[test]
    fn test_ensure_room_creates_once() {
        let mut registry = RoomRegistry::new();
        registry.ensure_room("r1", Some(alert(3)));
        registry.increment_unread("r1");
        registry.append_message("r1", ChatMessage::new(3, "Ada", "help"), Direction::Inbound);

        // A second ensure must not reset accumulated state
        registry.ensure_room("r1", Some(alert(9)));
        let room = registry.get("r1").unwrap();
        assert_eq!(room.unread(), 1);
        assert_eq!(room.messages().len(), 1);
        assert_eq!(room.alert.as_ref().unwrap().reporter_id, 3);
    }

    #[test]
    fn test_ensure_room_fills_missing_alert() {
        let mut registry = RoomRegistry::new();
        registry.ensure_room("r1", None);
        assert!(registry.get("r1").unwrap().alert.is_none());

        registry.ensure_room("r1", Some(alert(3)));
        assert_eq!(registry.get("r1").unwrap().victim_id(), Some(3));
    }

    #[test]
    fn test_duplicate_message_discarded() {
        let mut registry = RoomRegistry::new();
        let msg = ChatMessage {
            sender_id: Some(7),
            sender_name: Some("Grace".to_string()),
            text: "help".to_string(),
            sent_at: Some(1_704_067_200_000),
        };

        assert!(registry.append_message("r2", msg.clone(), Direction::Inbound));
        assert!(!registry.append_message("r2", msg, Direction::Inbound));
        assert_eq!(registry.get("r2").unwrap().messages().len(), 1);
    }

    #[test]
    fn test_same_text_different_timestamp_is_not_duplicate() {
        let mut registry = RoomRegistry::new();
        let mut msg = ChatMessage::new(7, "Grace", "help");
        msg.sent_at = Some(1);
        let mut later = msg.clone();
        later.sent_at = Some(2);

        assert!(registry.append_message("r2", msg, Direction::Inbound));
        assert!(registry.append_message("r2", later, Direction::Inbound));
        assert_eq!(registry.get("r2").unwrap().messages().len(), 2);
    }

    #[test]
    fn test_closed_room_rejects_outbound_only() {
        let mut registry = RoomRegistry::new();
        registry.ensure_room("r4", None);
        registry.set_closed("r4");
        registry.set_closed("r4"); // idempotent

        let local = ChatMessage::new(1, "Me", "anyone there?");
        assert!(!registry.append_message("r4", local, Direction::Outbound));

        // Inbound system traffic still lands
        let system = ChatMessage::system("This emergency chat has been closed.");
        assert!(registry.append_message("r4", system, Direction::Inbound));
        assert!(registry.get("r4").unwrap().is_closed());
    }

    #[test]
    fn test_unread_counter() {
        let mut registry = RoomRegistry::new();
        registry.increment_unread("r1");
        registry.increment_unread("r1");
        assert_eq!(registry.get("r1").unwrap().unread(), 2);

        registry.mark_read("r1");
        assert_eq!(registry.get("r1").unwrap().unread(), 0);
    }

    #[test]
    fn test_replace_messages_is_last_writer_wins() {
        let mut registry = RoomRegistry::new();
        registry.append_message("r3", ChatMessage::new(7, "Grace", "live"), Direction::Inbound);

        let mut history = ChatMessage::new(3, "Ada", "earlier");
        history.sent_at = Some(5);
        registry.replace_messages("r3", vec![history]);

        let room = registry.get("r3").unwrap();
        assert_eq!(room.messages().len(), 1);
        assert_eq!(room.messages()[0].text, "earlier");
    }

    #[test]
    fn test_insertion_order_iteration() {
        let mut registry = RoomRegistry::new();
        registry.ensure_room("b", None);
        registry.ensure_room("a", None);
        registry.ensure_room("c", None);
        registry.ensure_room("a", None); // re-ensure must not reorder

        let ids: Vec<&str> = registry.iter().map(|r| r.room_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_message_order_preserved() {
        let mut registry = RoomRegistry::new();
        for (i, text) in ["one", "two", "three"].iter().enumerate() {
            let mut msg = ChatMessage::new(7, "Grace", *text);
            msg.sent_at = Some(i as i64);
            registry.append_message("r1", msg, Direction::Inbound);
        }

        let texts: Vec<&str> = registry
            .get("r1")
            .unwrap()
            .messages()
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }
}
