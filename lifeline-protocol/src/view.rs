//! View Projection
//!
//! Pure derivation of everything the UI shows from [`RoomRegistry`] state:
//! the room list, the open room's transcript, and unread totals. Nothing
//! here keeps state of its own; every function can be re-invoked any number
//! of times after any mutation.

use crate::reconciler::LocalUser;
use crate::rooms::{ChatMessage, Room, RoomRegistry};
use serde::{Deserialize, Serialize};

/// Visual class of a transcript line
///
/// Derived from the message and room metadata at render time; not a stored
/// property of the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageClass {
    /// Backend or locally synthesized system line
    System,

    /// Authored by the signed-in user
    Own,

    /// Authored by the alert's victim
    Victim,

    /// Any other participant
    Other,
}

/// One row of the room list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomListEntry {
    pub room_id: String,

    /// Emergency type; absent while only chat traffic has been seen
    pub alert_type: Option<String>,

    /// Reporter display name
    pub reporter_name: Option<String>,

    /// Latest-detail summary line
    pub summary: String,

    /// Unread badge value; zero means no badge
    pub unread: u32,

    /// Highlighted as the open room
    pub is_current: bool,

    pub closed: bool,

    /// Responder count shown in the header
    pub notified_count: u32,

    /// Millisecond timestamp of alert creation, when known
    pub raised_at: Option<i64>,
}

/// One line of the open room's transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub class: MessageClass,
    pub sender_name: Option<String>,
    pub text: String,
    pub sent_at: Option<i64>,
}

/// Transcript of the open room plus composition state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptView {
    pub room_id: String,
    pub entries: Vec<TranscriptEntry>,

    /// False once the room closed; the composer is disabled
    pub compose_enabled: bool,
}

/// Classify one message relative to the local user and the room's victim
pub fn classify(message: &ChatMessage, victim_id: Option<i64>, local_id: i64) -> MessageClass {
    match message.sender_id {
        None => MessageClass::System,
        Some(id) if id == local_id => MessageClass::Own,
        Some(id) if Some(id) == victim_id => MessageClass::Victim,
        Some(_) => MessageClass::Other,
    }
}

fn summarize(room: &Room) -> String {
    room.alert
        .as_ref()
        .and_then(|a| a.details.clone())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "No additional details".to_string())
}

/// Project the room list in registry insertion order
pub fn room_list(registry: &RoomRegistry, current: Option<&str>) -> Vec<RoomListEntry> {
    registry
        .iter()
        .map(|room| RoomListEntry {
            room_id: room.room_id.clone(),
            alert_type: room.alert.as_ref().map(|a| a.alert_type.clone()),
            reporter_name: room.alert.as_ref().and_then(|a| a.reporter_name.clone()),
            summary: summarize(room),
            unread: room.unread(),
            is_current: current == Some(room.room_id.as_str()),
            closed: room.is_closed(),
            notified_count: room.alert.as_ref().map(|a| a.notified_count).unwrap_or(0),
            raised_at: room.alert.as_ref().and_then(|a| a.raised_at),
        })
        .collect()
}

/// Project the transcript of one room
///
/// Returns `None` for an unknown room id.
pub fn transcript(
    registry: &RoomRegistry,
    room_id: &str,
    local: &LocalUser,
) -> Option<TranscriptView> {
    let room = registry.get(room_id)?;
    let victim_id = room.victim_id();

    let entries = room
        .messages()
        .iter()
        .map(|message| TranscriptEntry {
            class: classify(message, victim_id, local.id),
            sender_name: message.sender_name.clone(),
            text: message.text.clone(),
            sent_at: message.sent_at,
        })
        .collect();

    Some(TranscriptView {
        room_id: room.room_id.clone(),
        entries,
        compose_enabled: !room.is_closed(),
    })
}

/// Sum of all rooms' unread counters, for the global badge
pub fn unread_total(registry: &RoomRegistry) -> u64 {
    registry.iter().map(|room| u64::from(room.unread())).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Location;
    use crate::rooms::{AlertData, Direction};

    fn local() -> LocalUser {
        LocalUser {
            id: 1,
            name: "Me".to_string(),
        }
    }

    fn alert(reporter: i64, victim: i64) -> AlertData {
        AlertData {
            alert_type: "medical".to_string(),
            details: Some("collapsed outside the station".to_string()),
            location: Some(Location { lat: 51.5, lng: -0.09 }),
            reporter_id: reporter,
            reporter_name: Some("Ada".to_string()),
            victim_id: victim,
            notified_count: 7,
            raised_at: Some(1_704_067_200_000),
        }
    }

    fn registry_with_traffic() -> RoomRegistry {
        let mut registry = RoomRegistry::new();
        registry.ensure_room("r1", Some(alert(3, 3)));
        registry.append_message("r1", ChatMessage::system("Room opened"), Direction::Inbound);
        registry.append_message("r1", ChatMessage::new(1, "Me", "on my way"), Direction::Outbound);
        registry.append_message("r1", ChatMessage::new(3, "Ada", "hurry"), Direction::Inbound);
        registry.append_message("r1", ChatMessage::new(9, "Grace", "me too"), Direction::Inbound);
        registry
    }

    #[test]
    fn test_classification() {
        let registry = registry_with_traffic();
        let view = transcript(&registry, "r1", &local()).unwrap();

        let classes: Vec<MessageClass> = view.entries.iter().map(|e| e.class).collect();
        assert_eq!(
            classes,
            vec![
                MessageClass::System,
                MessageClass::Own,
                MessageClass::Victim,
                MessageClass::Other
            ]
        );
        assert!(view.compose_enabled);
    }

    #[test]
    fn test_classification_without_alert_metadata() {
        // Lazily created room: no victim known, senders fall back to Other
        let mut registry = RoomRegistry::new();
        registry.append_message("r2", ChatMessage::new(5, "Eve", "hello"), Direction::Inbound);

        let view = transcript(&registry, "r2", &local()).unwrap();
        assert_eq!(view.entries[0].class, MessageClass::Other);
    }

    #[test]
    fn test_transcript_order_matches_acceptance_order() {
        let registry = registry_with_traffic();
        let view = transcript(&registry, "r1", &local()).unwrap();

        let texts: Vec<&str> = view.entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["Room opened", "on my way", "hurry", "me too"]);
    }

    #[test]
    fn test_transcript_for_unknown_room() {
        let registry = RoomRegistry::new();
        assert!(transcript(&registry, "nowhere", &local()).is_none());
    }

    #[test]
    fn test_closed_room_disables_composition() {
        let mut registry = registry_with_traffic();
        registry.set_closed("r1");

        let view = transcript(&registry, "r1", &local()).unwrap();
        assert!(!view.compose_enabled);
    }

    #[test]
    fn test_room_list_projection() {
        let mut registry = registry_with_traffic();
        registry.ensure_room("r2", None);
        registry.increment_unread("r2");
        registry.increment_unread("r2");

        let list = room_list(&registry, Some("r1"));
        assert_eq!(list.len(), 2);

        assert_eq!(list[0].room_id, "r1");
        assert!(list[0].is_current);
        assert_eq!(list[0].alert_type.as_deref(), Some("medical"));
        assert_eq!(list[0].reporter_name.as_deref(), Some("Ada"));
        assert_eq!(list[0].notified_count, 7);

        assert_eq!(list[1].room_id, "r2");
        assert!(!list[1].is_current);
        assert_eq!(list[1].unread, 2);
        assert_eq!(list[1].summary, "No additional details");
    }

    #[test]
    fn test_unread_total() {
        let mut registry = RoomRegistry::new();
        registry.increment_unread("a");
        registry.increment_unread("a");
        registry.increment_unread("b");

        assert_eq!(unread_total(&registry), 3);
    }

    #[test]
    fn test_projection_is_stateless() {
        let registry = registry_with_traffic();
        let first = transcript(&registry, "r1", &local()).unwrap();
        let second = transcript(&registry, "r1", &local()).unwrap();
        assert_eq!(first, second);

        let list_a = room_list(&registry, None);
        let list_b = room_list(&registry, None);
        assert_eq!(list_a, list_b);
    }
}
