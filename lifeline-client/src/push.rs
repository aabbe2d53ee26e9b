//! Push Channel
//!
//! WebSocket connection to the backend's real-time event stream. Inbound
//! frames are decoded through the [`SubscriptionTable`] and forwarded as
//! [`PushUpdate`]s; outbound packets (join-room, chat messages) are written
//! from an mpsc queue.
//!
//! The connection loop reconnects with exponential backoff. On every
//! (re)connect the subscription table is rebuilt from scratch —
//! deterministic and idempotent, so a flapping link can never accumulate
//! duplicate registrations.

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use lifeline_protocol::{Packet, RoomEvent, SubscriptionTable};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Updates delivered to the event loop
#[derive(Debug)]
pub enum PushUpdate {
    /// Connection (re)established; subscriptions are in place
    Connected,

    /// A decoded room event
    Event(RoomEvent),

    /// Connection lost; a reconnect attempt follows
    Disconnected,
}

/// Push channel configuration
#[derive(Debug, Clone)]
pub struct PushChannel {
    url: String,
    user_id: i64,
    reconnect_initial: Duration,
    reconnect_max: Duration,
}

impl PushChannel {
    pub fn new(
        url: impl Into<String>,
        user_id: i64,
        reconnect_initial: Duration,
        reconnect_max: Duration,
    ) -> Self {
        Self {
            url: url.into(),
            user_id,
            reconnect_initial,
            reconnect_max,
        }
    }

    fn connect_url(&self) -> String {
        format!("{}?userId={}", self.url, self.user_id)
    }

    /// Run the channel until the update receiver goes away
    ///
    /// Never returns an error for transport failures; those trigger
    /// reconnection. Returns once the event loop has shut down.
    pub async fn run(
        self,
        updates: mpsc::Sender<PushUpdate>,
        mut outbound: mpsc::Receiver<Packet>,
    ) -> Result<()> {
        let mut backoff = self.reconnect_initial;

        loop {
            match self.connection_cycle(&updates, &mut outbound).await {
                Ok(ChannelExit::Shutdown) => return Ok(()),
                Ok(ChannelExit::ConnectionLost) => {
                    // A connection was up; start the backoff over
                    backoff = self.reconnect_initial;
                    if updates.send(PushUpdate::Disconnected).await.is_err() {
                        return Ok(());
                    }
                }
                Err(e) => {
                    warn!("Push channel connect failed: {}", e);
                }
            }

            debug!("Reconnecting in {:?}", backoff);
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(self.reconnect_max);
        }
    }

    async fn connection_cycle(
        &self,
        updates: &mpsc::Sender<PushUpdate>,
        outbound: &mut mpsc::Receiver<Packet>,
    ) -> Result<ChannelExit> {
        let url = self.connect_url();
        let (stream, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;
        let (mut write, mut read) = stream.split();

        // Rebuilt on every connect; always the same mapping
        let table = SubscriptionTable::standard();
        info!(events = ?table.event_names(), "push channel connected");

        if updates.send(PushUpdate::Connected).await.is_err() {
            return Ok(ChannelExit::Shutdown);
        }

        loop {
            tokio::select! {
                frame = read.next() => {
                    let frame = match frame {
                        Some(Ok(frame)) => frame,
                        Some(Err(e)) => {
                            warn!("Push channel read error: {}", e);
                            return Ok(ChannelExit::ConnectionLost);
                        }
                        None => return Ok(ChannelExit::ConnectionLost),
                    };

                    match frame {
                        Message::Text(text) => {
                            if let Some(event) = decode_frame(&table, text.as_bytes()) {
                                if updates.send(PushUpdate::Event(event)).await.is_err() {
                                    return Ok(ChannelExit::Shutdown);
                                }
                            }
                        }
                        Message::Ping(payload) => {
                            if write.send(Message::Pong(payload)).await.is_err() {
                                return Ok(ChannelExit::ConnectionLost);
                            }
                        }
                        Message::Close(_) => return Ok(ChannelExit::ConnectionLost),
                        _ => {}
                    }
                }

                packet = outbound.recv() => {
                    let Some(packet) = packet else {
                        return Ok(ChannelExit::Shutdown);
                    };
                    let json = serde_json::to_string(&packet)
                        .context("Failed to serialize outbound packet")?;
                    if let Err(e) = write.send(Message::text(json)).await {
                        warn!("Push channel write error: {}", e);
                        return Ok(ChannelExit::ConnectionLost);
                    }
                }
            }
        }
    }
}

enum ChannelExit {
    /// Event loop is gone; stop for good
    Shutdown,

    /// Transport dropped; reconnect
    ConnectionLost,
}

fn decode_frame(table: &SubscriptionTable, data: &[u8]) -> Option<RoomEvent> {
    let packet = match Packet::from_bytes(data) {
        Ok(packet) => packet,
        Err(e) => {
            warn!("Dropping undecodable frame: {}", e);
            return None;
        }
    };

    match table.decode(&packet) {
        Ok(Some(event)) => Some(event),
        Ok(None) => None,
        Err(e) => {
            warn!("Dropping malformed {} packet: {}", packet.packet_type, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connect_url_carries_identity() {
        let channel = PushChannel::new(
            "ws://127.0.0.1:5000/push",
            7,
            Duration::from_secs(1),
            Duration::from_secs(30),
        );
        assert_eq!(channel.connect_url(), "ws://127.0.0.1:5000/push?userId=7");
    }

    #[test]
    fn test_decode_frame_known_event() {
        let table = SubscriptionTable::standard();
        let packet = Packet::new(
            lifeline_protocol::EVENT_ROOM_CLOSED,
            json!({ "roomId": "r1" }),
        );
        let bytes = packet.to_bytes().unwrap();

        let event = decode_frame(&table, &bytes).unwrap();
        assert_eq!(event.room_id(), "r1");
    }

    #[test]
    fn test_decode_frame_drops_unknown_and_garbage() {
        let table = SubscriptionTable::standard();

        let unknown = Packet::new("lifeline.presence", json!({}));
        assert!(decode_frame(&table, &unknown.to_bytes().unwrap()).is_none());

        assert!(decode_frame(&table, b"not json").is_none());
    }
}
