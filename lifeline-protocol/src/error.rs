//! Error handling for the Lifeline protocol
//!
//! This module provides a single error type for all protocol operations.
//! Errors are automatically converted from underlying library errors using
//! `thiserror`.
//!
//! ## Error Handling Patterns
//!
//! ### Basic Usage
//!
//! ```rust
//! use lifeline_protocol::Result;
//!
//! fn process_data(data: &[u8]) -> Result<String> {
//!     // Errors are automatically converted using From trait
//!     let value: serde_json::Value = serde_json::from_slice(data)?;
//!     Ok(value.to_string())
//! }
//! ```
//!
//! ### Error Matching
//!
//! ```rust
//! use lifeline_protocol::{ProtocolError, Result};
//!
//! fn report(result: Result<()>) {
//!     match result {
//!         Ok(()) => {}
//!         Err(ProtocolError::RoomClosed(id)) => {
//!             eprintln!("Room {} no longer accepts messages", id);
//!         }
//!         Err(e) => eprintln!("{}", e),
//!     }
//! }
//! ```

use thiserror::Error;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur during protocol operations
///
/// Most failures in this subsystem are recoverable by design: a failed
/// history fetch degrades to the in-memory log, a malformed packet is
/// dropped, an unknown event type is ignored. The variants here cover the
/// cases that callers may want to distinguish.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// I/O error (network, file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or malformed packet
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    /// Room exists but is closed to outbound messages
    #[error("Room closed: {0}")]
    RoomClosed(String),

    /// Operation referenced a room the registry does not hold
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// No room is currently open in the chat pane
    #[error("No room is currently open")]
    NoCurrentRoom,

    /// Network connection error
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProtocolError {
    /// Create an invalid packet error
    pub fn invalid_packet(msg: impl Into<String>) -> Self {
        ProtocolError::InvalidPacket(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        ProtocolError::Configuration(msg.into())
    }

    /// Check if this error is recoverable (transient, can be retried)
    ///
    /// Returns `true` if the error might succeed on retry, `false` if it is
    /// permanent. Closed rooms never reopen, so `RoomClosed` is permanent.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(_) | ProtocolError::Network(_)
        )
    }

    /// Get a user-friendly message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            ProtocolError::RoomClosed(_) => {
                "This emergency chat has been closed. You cannot send messages.".to_string()
            }
            ProtocolError::RoomNotFound(id) => {
                format!("Emergency room '{}' is not known to this session.", id)
            }
            ProtocolError::NoCurrentRoom => {
                "Open an emergency room before sending a message.".to_string()
            }
            ProtocolError::Network(msg) => {
                format!("Network error: {}. Connection may be unstable.", msg)
            }
            ProtocolError::Configuration(msg) => {
                format!("Configuration error: {}. Check your settings.", msg)
            }
            ProtocolError::InvalidPacket(msg) => {
                format!("Invalid data received: {}.", msg)
            }
            ProtocolError::Io(e) => format!("I/O error: {}.", e),
            ProtocolError::Json(e) => format!("Data format error: {}.", e),
        }
    }
}
