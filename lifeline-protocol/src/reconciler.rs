//! Event Reconciler
//!
//! Applies inbound push events to the [`RoomRegistry`] and decides when a
//! notification is warranted. One instance owns the registry and the
//! current-room pointer; all entry points run to completion without
//! suspension, so events for a room are applied strictly in arrival order.
//!
//! ## Event handling
//!
//! | Event | Action |
//! |---|---|
//! | alert | create the room; if raised by someone else, bump unread and surface a notification |
//! | chat message | lazy-create the room, append with dedupe; bump unread unless the room is open |
//! | room closed | set the closed flag; append a local system line when the room is open |
//! | service response | append to the response list and surface a service notification |
//!
//! ## Opening a room
//!
//! [`Reconciler::open_room`] marks the room current, zeroes its unread
//! counter, and hands back a join packet plus a [`HistoryTicket`]. The
//! caller fetches authoritative history from the backend and presents the
//! result together with the ticket; a response that arrives after the user
//! moved on (or reopened the room) fails ticket validation and is dropped.
//! A hung request simply never resolves — the room keeps rendering from the
//! in-memory log.

use crate::events::RoomEvent;
use crate::notify::{Notification, NotificationKind, Notifier};
use crate::packet::current_timestamp;
use crate::rooms::{AlertData, ChatMessage, Direction, RoomRegistry, ServiceResponse};
use crate::{events, Packet, ProtocolError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// System line appended locally when the open room closes under the user
const ROOM_CLOSED_NOTICE: &str = "This emergency chat has been closed.";

/// The signed-in user this client acts for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalUser {
    pub id: i64,
    pub name: String,
}

/// How an authoritative history response reconciles with live messages
///
/// `replace` is the observed backend-wins behavior: live messages that
/// arrived during the fetch window are dropped. `merge` re-appends, under
/// the message dedupe key, any in-memory message the history does not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    #[default]
    Replace,
    Merge,
}

/// Whether repeated identical service responses collapse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceResponsePolicy {
    #[default]
    KeepAll,
    CollapseDuplicates,
}

/// Reconciliation policies
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default)]
    pub history: HistoryPolicy,

    #[serde(default)]
    pub service_responses: ServiceResponsePolicy,
}

/// Which projection needs re-deriving after an event application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// Nothing visible changed
    None,

    /// The room list (and badge totals) changed
    RoomList,

    /// The open room's transcript changed
    Transcript,
}

/// Staleness guard for an in-flight history fetch
///
/// Captures the room identity and the open-generation at request time.
/// Opening any room (or leaving the chat pane) bumps the generation, so a
/// superseded response can never overwrite newer state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTicket {
    room_id: String,
    generation: u64,
}

impl HistoryTicket {
    /// Room this ticket was issued for
    pub fn room_id(&self) -> &str {
        &self.room_id
    }
}

/// Result of opening a room: what to send, and the history guard
#[derive(Debug)]
pub struct OpenedRoom {
    /// Join packet to emit on the push channel
    pub join: Packet,

    /// Ticket to present with the history response
    pub ticket: HistoryTicket,
}

/// Owns the room registry and applies events to it
///
/// Single-threaded by design: the push channel, user actions, and history
/// completions are funneled through one dispatch point, so no locking is
/// needed here.
pub struct Reconciler {
    registry: RoomRegistry,
    current: Option<String>,
    generation: u64,
    local: LocalUser,
    config: ReconcilerConfig,
    notifier: Box<dyn Notifier>,
}

impl Reconciler {
    pub fn new(local: LocalUser, config: ReconcilerConfig, notifier: Box<dyn Notifier>) -> Self {
        Self {
            registry: RoomRegistry::new(),
            current: None,
            generation: 0,
            local,
            config,
            notifier,
        }
    }

    /// Registry view for the projector
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Room currently open in the chat pane, if any
    pub fn current_room(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn local_user(&self) -> &LocalUser {
        &self.local
    }

    /// Apply one inbound event; returns which projection to re-derive
    pub fn apply(&mut self, event: RoomEvent) -> Refresh {
        let refresh = match event {
            RoomEvent::AlertCreated(payload) => self.on_alert(payload),
            RoomEvent::ChatMessage(payload) => self.on_chat_message(payload),
            RoomEvent::RoomClosed(payload) => self.on_room_closed(payload),
            RoomEvent::ServiceResponded(payload) => self.on_service_response(payload),
        };
        self.debug_check_unread_invariant();
        refresh
    }

    fn on_alert(&mut self, payload: events::AlertPayload) -> Refresh {
        let known = self.registry.contains(&payload.room_id);
        let had_alert = self
            .registry
            .get(&payload.room_id)
            .is_some_and(|room| room.alert.is_some());
        let alert = AlertData::from(&payload);
        let room_id = payload.room_id.clone();
        self.registry.ensure_room(&room_id, Some(alert));

        if known {
            // Redelivered alert: the room already accumulated state, don't
            // double-count or re-notify. A room lazily created from chat
            // traffic just gained its alert metadata, so the list changes.
            debug!(%room_id, "alert for known room");
            return if had_alert {
                Refresh::None
            } else {
                Refresh::RoomList
            };
        }

        info!(%room_id, alert_type = %payload.alert_type, "alert opened room");

        if payload.user_id != self.local.id && self.current.as_deref() != Some(room_id.as_str()) {
            self.registry.increment_unread(&room_id);
            self.notifier.notify(Notification {
                kind: NotificationKind::Alert,
                room_id,
                text: format!(
                    "{}: {}",
                    payload.user_name.as_deref().unwrap_or("Someone"),
                    payload.alert_type
                ),
                detail: Some(
                    payload
                        .details
                        .clone()
                        .filter(|d| !d.is_empty())
                        .unwrap_or_else(|| "No additional details provided".to_string()),
                ),
                location: payload.location,
            });
        }

        Refresh::RoomList
    }

    fn on_chat_message(&mut self, payload: events::ChatPayload) -> Refresh {
        let room_id = payload.room_id.clone();
        let message = ChatMessage::from(payload);

        if !self
            .registry
            .append_message(&room_id, message, Direction::Inbound)
        {
            return Refresh::None;
        }

        if self.current.as_deref() == Some(room_id.as_str()) {
            Refresh::Transcript
        } else {
            self.registry.increment_unread(&room_id);
            Refresh::RoomList
        }
    }

    fn on_room_closed(&mut self, payload: events::RoomClosedPayload) -> Refresh {
        let room_id = payload.room_id;
        self.registry.set_closed(&room_id);

        if self.current.as_deref() == Some(room_id.as_str()) {
            // The pane stays open on a closed room; show why composition
            // just went away. A server-sent duplicate collapses via dedupe.
            self.registry.append_message(
                &room_id,
                ChatMessage::system(ROOM_CLOSED_NOTICE),
                Direction::Inbound,
            );
            Refresh::Transcript
        } else {
            Refresh::RoomList
        }
    }

    fn on_service_response(&mut self, payload: events::ServiceResponsePayload) -> Refresh {
        let response = ServiceResponse::from_payload(&payload, current_timestamp());

        if self.config.service_responses == ServiceResponsePolicy::CollapseDuplicates {
            if let Some(room) = self.registry.get(&payload.room_id) {
                if room.responses().iter().any(|r| r.same_service(&response)) {
                    debug!(room_id = %payload.room_id, service = %payload.service_name,
                        "collapsing duplicate service response");
                    return Refresh::None;
                }
            }
        }

        info!(room_id = %payload.room_id, service = %payload.service_name, "service responded");
        self.registry.append_response(&payload.room_id, response);

        // Service notifications carry no location: no address resolution
        self.notifier.notify(Notification {
            kind: NotificationKind::ServiceResponse,
            room_id: payload.room_id,
            text: format!(
                "{}: Service Response - A {} service is responding to your alert!",
                payload.service_name, payload.service_type
            ),
            detail: payload.phone.map(|p| format!("Phone: {}", p)),
            location: None,
        });

        Refresh::None
    }

    /// Open a room in the chat pane
    ///
    /// Marks the room current and zeroes its unread counter. Returns the
    /// join packet to emit and the [`HistoryTicket`] guarding the history
    /// fetch, or `None` when the room is unknown.
    pub fn open_room(&mut self, room_id: &str) -> Option<OpenedRoom> {
        if !self.registry.contains(room_id) {
            warn!(room_id, "cannot open unknown room");
            return None;
        }

        self.generation += 1;
        self.current = Some(room_id.to_string());
        self.registry.mark_read(room_id);
        debug!(room_id, generation = self.generation, "room opened");

        Some(OpenedRoom {
            join: events::join_room_packet(room_id, self.local.id),
            ticket: HistoryTicket {
                room_id: room_id.to_string(),
                generation: self.generation,
            },
        })
    }

    /// Leave the chat pane; no room is current afterwards
    ///
    /// Also invalidates any outstanding history ticket.
    pub fn clear_current(&mut self) {
        self.generation += 1;
        self.current = None;
    }

    /// Apply an authoritative history response
    ///
    /// Returns `false` without mutating when the ticket is stale: the user
    /// opened another room, reopened this one, or left the pane since the
    /// request was issued.
    pub fn apply_history(&mut self, ticket: &HistoryTicket, messages: Vec<ChatMessage>) -> bool {
        if ticket.generation != self.generation
            || self.current.as_deref() != Some(ticket.room_id.as_str())
        {
            debug!(room_id = %ticket.room_id, "dropping stale history response");
            return false;
        }

        let log = match self.config.history {
            HistoryPolicy::Replace => messages,
            HistoryPolicy::Merge => {
                let mut log = messages;
                if let Some(room) = self.registry.get(&ticket.room_id) {
                    for live in room.messages() {
                        if !log.iter().any(|m| m.is_duplicate_of(live)) {
                            log.push(live.clone());
                        }
                    }
                }
                log
            }
        };

        self.registry.replace_messages(&ticket.room_id, log);
        true
    }

    /// Send a chat message into the current room
    ///
    /// Appends optimistically (the broadcast echo collapses via dedupe) and
    /// returns the packet to emit.
    ///
    /// # Errors
    ///
    /// - `NoCurrentRoom` when the chat pane is empty
    /// - `RoomClosed` when the open room no longer accepts messages
    pub fn send_message(&mut self, text: &str) -> Result<Packet> {
        let room_id = self
            .current
            .clone()
            .ok_or(ProtocolError::NoCurrentRoom)?;

        let room = self
            .registry
            .get(&room_id)
            .ok_or_else(|| ProtocolError::RoomNotFound(room_id.clone()))?;
        if room.is_closed() {
            return Err(ProtocolError::RoomClosed(room_id));
        }

        self.registry.append_message(
            &room_id,
            ChatMessage::new(self.local.id, self.local.name.clone(), text),
            Direction::Outbound,
        );

        Ok(events::chat_message_packet(
            &room_id,
            self.local.id,
            &self.local.name,
            text,
        ))
    }

    /// Unread must be zero for the current room after every application
    fn debug_check_unread_invariant(&self) {
        if let Some(current) = self.current.as_deref() {
            if let Some(room) = self.registry.get(current) {
                debug_assert_eq!(room.unread(), 0, "current room must have zero unread");
            }
        }
    }
}
