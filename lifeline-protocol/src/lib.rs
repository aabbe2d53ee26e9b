//! Lifeline Protocol Implementation
//!
//! Client-side core for the Lifeline emergency-response platform: the
//! push-channel packet model, typed room events, the in-memory room
//! registry, the event reconciler, and pure view projection. Transport and
//! presentation live in the client binary; this crate is the state machine
//! between them.

pub mod events;
pub mod notify;
pub mod packet;
pub mod reconciler;
pub mod rooms;
pub mod router;
pub mod view;

mod error;

pub use error::{ProtocolError, Result};
pub use events::{
    chat_message_packet, join_room_packet, AlertPayload, ChatPayload, Location, RoomClosedPayload,
    RoomEvent, ServiceResponsePayload, EVENT_ALERT, EVENT_CHAT_MESSAGE, EVENT_ROOM_CLOSED,
    EVENT_ROOM_JOIN, EVENT_SERVICE_RESPONSE,
};
pub use notify::{Notification, NotificationKind, Notifier, NullNotifier};
pub use packet::{current_timestamp, Packet};
pub use reconciler::{
    HistoryPolicy, HistoryTicket, LocalUser, OpenedRoom, Reconciler, ReconcilerConfig, Refresh,
    ServiceResponsePolicy,
};
pub use rooms::{AlertData, ChatMessage, Direction, Room, RoomRegistry, ServiceResponse};
pub use router::{EventKind, SubscriptionTable};
pub use view::{
    classify, room_list, transcript, unread_total, MessageClass, RoomListEntry, TranscriptEntry,
    TranscriptView,
};

/// Protocol version we implement
pub const PROTOCOL_VERSION: u32 = 1;
