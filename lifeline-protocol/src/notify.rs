//! Notification Surfacing Contract
//!
//! The core decides *when* a notification is warranted and *what* it
//! contains; presentation belongs to an external collaborator. Click and
//! hover behavior travel as data — the room to open on click, the detail
//! text to show on hover — rather than as callbacks.

use crate::events::Location;
use serde::{Deserialize, Serialize};

/// What kind of notification is being surfaced
///
/// Service responses are deliberately distinct from alert notifications:
/// they carry no location and need no address resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A new emergency alert was raised by someone else
    Alert,

    /// An external service is responding to the local user's alert
    ServiceResponse,
}

/// A notification the presentation layer should surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,

    /// Room to open when the notification is activated
    pub room_id: String,

    /// Primary line, e.g. `"Ada: fire"` or
    /// `"Central Fire Station: Service Response - ..."`
    pub text: String,

    /// Secondary detail shown on hover
    pub detail: Option<String>,

    /// Alert position for presentation layers that resolve an address;
    /// always `None` for service responses
    pub location: Option<Location>,
}

/// Presentation collaborator that surfaces notifications
///
/// Implementations must tolerate being called from the event-dispatch path:
/// do any slow work (address resolution, rendering) off that path.
pub trait Notifier: Send {
    fn notify(&self, notification: Notification);
}

/// Notifier that drops everything; useful in tests and headless runs
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: Notification) {}
}
