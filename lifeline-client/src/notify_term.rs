//! Terminal Notification Surface
//!
//! Console implementation of the protocol's [`Notifier`] contract. Alert
//! notifications resolve the alert location to an address off the event
//! path; service responses print immediately, no address needed.

use crate::geocode::{coordinates_label, Geocoder};
use lifeline_protocol::{Notification, NotificationKind, Notifier};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Notifier that prints to the console and keeps a running badge count
pub struct TermNotifier {
    geocoder: Arc<Geocoder>,
    badge: Arc<AtomicU64>,
}

impl TermNotifier {
    pub fn new(geocoder: Geocoder) -> Self {
        Self {
            geocoder: Arc::new(geocoder),
            badge: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Notifier for TermNotifier {
    fn notify(&self, notification: Notification) {
        let count = self.badge.fetch_add(1, Ordering::Relaxed) + 1;
        let geocoder = self.geocoder.clone();

        // Address resolution must not block event dispatch
        tokio::spawn(async move {
            let place = match (notification.kind, notification.location) {
                (NotificationKind::Alert, Some(location)) => {
                    let address = geocoder
                        .reverse(location)
                        .await
                        .unwrap_or_else(|| coordinates_label(location));
                    Some(address)
                }
                _ => None,
            };

            let mut line = format!("[{}] {}", count, notification.text);
            if let Some(place) = place {
                line.push_str(&format!(" at {}", place));
            }
            println!("{}", line);
            if let Some(detail) = &notification.detail {
                println!("    {}", detail);
            }
            println!("    (open room {} to respond)", notification.room_id);
        });
    }
}
