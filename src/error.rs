//! # Error Types
//!
//! Error handling for wire reconstruction and replay dispatch.
//!
//! ## Error Categories
//! - **Reassembly**: truncated header or payload. These only mean "feed more bytes"
//!   and never escape the reassembly layer.
//! - **Protocol**: unexpected origin, unknown commands, malformed packets, and
//!   connections closed with a query still in flight. All of these are recoverable:
//!   capture data is lossy, so the parser records them and resynchronizes.
//! - **Ambient**: I/O, serialization, configuration, and replay channel failures.
//!
//! ## Example Usage
//! ```rust
//! use wire_playback::core::packet::PacketHeader;
//! use wire_playback::error::ProtocolError;
//!
//! match PacketHeader::decode(&[0x05, 0x00]) {
//!     Err(ProtocolError::TruncatedHeader { available }) => assert_eq!(available, 2),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Registry errors
    pub const ERR_REGISTRY_WRITE_LOCK: &str = "Failed to acquire write lock on connection registry";
    pub const ERR_REGISTRY_READ_LOCK: &str = "Failed to acquire read lock on connection registry";
    pub const ERR_LOCK_POISONED: &str = "Synchronization primitive poisoned";

    /// Classification errors
    pub const ERR_EMPTY_CLIENT_PAYLOAD: &str = "Client packet has no command byte";
    pub const ERR_EMPTY_SERVER_PAYLOAD: &str = "Server packet has an empty payload";
    pub const ERR_SHORT_OK: &str = "OK packet shorter than its fixed fields";
    pub const ERR_SHORT_ERR: &str = "ERR packet missing its error code";
    pub const ERR_BAD_COLUMN_COUNT: &str = "Result set header carries no readable column count";

    /// Reassembly guard
    pub const ERR_STALLED_BUFFER: &str = "Reassembly buffer exceeded its configured limit";
}

// ProtocolError is the primary error type for all parsing and dispatch operations
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    #[serde(skip_serializing, skip_deserializing)]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    #[serde(skip_serializing, skip_deserializing)]
    Serialization(#[from] bincode::Error),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Deserialize error: {0}")]
    DeserializeError(String),

    #[error("Truncated header: {available} bytes buffered")]
    TruncatedHeader { available: usize },

    #[error("Truncated payload: expected {expected} bytes, {available} buffered")]
    TruncatedPayload { expected: usize, available: usize },

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Packet from unexpected origin on connection {key:#x}")]
    UnexpectedOrigin { key: u64 },

    #[error("Unknown command byte: {0:#04x}")]
    UnknownCommand(u8),

    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    #[error("Connection {key:#x} closed with a query still in flight")]
    ConnectionAbandonedIncomplete { key: u64 },

    #[error("Replay queue closed")]
    ReplayClosed,

    #[error("Replay failed: {0}")]
    ReplayFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// True for the "not enough bytes yet" conditions that further feeding resolves
    pub fn is_truncation(&self) -> bool {
        matches!(
            self,
            ProtocolError::TruncatedHeader { .. } | ProtocolError::TruncatedPayload { .. }
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
