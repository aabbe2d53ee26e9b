//! REST Backend Client
//!
//! Thin wrapper over the backend's HTTP surface: authoritative message
//! history for a room, raising a seek-help alert, and marking the local
//! user safe.
//!
//! A failed history fetch is recoverable by design — the caller keeps
//! rendering the in-memory log and logs a diagnostic.

use anyhow::{Context, Result};
use lifeline_protocol::{ChatMessage, Location};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// One record of the history endpoint's response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    #[serde(default)]
    pub user_id: Option<i64>,

    #[serde(default)]
    pub user_name: Option<String>,

    pub message: String,

    #[serde(default)]
    pub sent_at: Option<i64>,
}

impl From<HistoryRecord> for ChatMessage {
    fn from(record: HistoryRecord) -> Self {
        ChatMessage {
            sender_id: record.user_id,
            sender_name: record.user_name,
            text: record.message,
            sent_at: record.sent_at,
        }
    }
}

/// Request body for raising an alert
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaiseAlertRequest {
    /// Emergency type; multiple types comma-joined
    #[serde(rename = "type")]
    pub alert_type: String,

    pub details: String,

    pub location: Location,

    pub user_id: i64,
}

/// Backend acknowledgment for alert / mark-safe requests
#[derive(Debug, Clone, Deserialize)]
pub struct Ack {
    pub status: String,

    #[serde(default)]
    pub message: Option<String>,
}

/// HTTP client for the Lifeline backend
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the authoritative message history for a room, oldest first
    pub async fn message_history(&self, room_id: &str) -> Result<Vec<ChatMessage>> {
        let url = format!("{}/api/emergency-chat/messages", self.base_url);
        let records: Vec<HistoryRecord> = self
            .http
            .get(&url)
            .query(&[("roomId", room_id)])
            .send()
            .await
            .context("History request failed")?
            .error_for_status()
            .context("History request rejected")?
            .json()
            .await
            .context("History response was not valid JSON")?;

        Ok(records.into_iter().map(ChatMessage::from).collect())
    }

    /// Raise a seek-help alert
    pub async fn raise_alert(&self, request: &RaiseAlertRequest) -> Result<Ack> {
        let url = format!("{}/emergency", self.base_url);
        let ack: Ack = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .context("Alert request failed")?
            .error_for_status()
            .context("Alert request rejected")?
            .json()
            .await
            .context("Alert response was not valid JSON")?;

        info!(status = %ack.status, "alert raised");
        Ok(ack)
    }

    /// Report the local user safe; the backend closes their room
    pub async fn mark_safe(&self, user_id: i64) -> Result<Ack> {
        let url = format!("{}/mark-safe", self.base_url);
        let ack: Ack = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "userId": user_id }))
            .send()
            .await
            .context("Mark-safe request failed")?
            .error_for_status()
            .context("Mark-safe request rejected")?
            .json()
            .await
            .context("Mark-safe response was not valid JSON")?;

        info!(status = %ack.status, "marked safe");
        Ok(ack)
    }
}
