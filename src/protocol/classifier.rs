//! # Packet Classifier
//!
//! Turns one complete packet into a logical event, given who sent it and a
//! read-only view of the connection's state. Classification is pure; the
//! connection state machine applies the result.
//!
//! ## Rules
//! - Until the client has answered the server greeting, server packets are
//!   handshake data. The first client packet is the login response.
//! - Client commands always start a new sequence (id 0). A client packet with
//!   a non-zero sequence id continues an earlier exchange and is never a command.
//! - `COM_QUERY` is the only replayable command; everything else is observed
//!   but not forwarded.
//! - Server packets only matter while a query is in flight. The first packet
//!   of a response is OK, ERR, a LOCAL INFILE request, or a result set header.
//! - Inside a result set, short `0xFE` packets are end-of-result markers. The
//!   result is complete once `eof_markers_per_result` markers were seen. With a
//!   single marker the terminator is OK-shaped and any non-full `0xFE` packet
//!   ends the result.

use serde::{Deserialize, Serialize};

use crate::core::packet::Packet;
use crate::error::constants;
use crate::protocol::command::{
    eof_warnings, is_result_terminator, parse_error_code, read_lenenc_int, Command, OkSummary,
    ERR_MARKER, OK_MARKER,
};
use crate::protocol::identity::Origin;

/// Leading byte of a LOCAL INFILE request from the server
pub const LOCAL_INFILE_MARKER: u8 = 0xFB;

/// Coarse packet kind reported to callers and statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketKind {
    Query,
    Result,
    Ok,
    Unknown,
    Error,
}

/// Where a response currently stands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ResultPhase {
    /// Waiting for the first packet of a response
    #[default]
    Header,
    /// Column definitions follow the result set header
    Columns,
    /// Data rows
    Rows,
}

/// The slice of connection state the classifier consults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierView {
    pub handshake_from_client: bool,
    pub was_query: bool,
    pub result_phase: ResultPhase,
    pub eof_count: usize,
    pub column_count: u64,
    pub columns_seen: u64,
    pub eof_markers_per_result: u8,
}

impl Default for ClassifierView {
    fn default() -> Self {
        Self {
            handshake_from_client: false,
            was_query: false,
            result_phase: ResultPhase::Header,
            eof_count: 0,
            column_count: 0,
            columns_seen: 0,
            eof_markers_per_result: crate::config::DEFAULT_EOF_MARKERS_PER_RESULT,
        }
    }
}

/// Fine-grained classification of one packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Login exchange; `from_client` marks the client's login response
    Handshake { from_client: bool },
    /// Text query, ready for replay
    Query(String),
    /// Non-query client command
    Command(Command),
    /// Client packet continuing an earlier exchange (sequence id above zero)
    Continuation,
    /// Server packet with no query in flight
    Unsolicited,
    /// Result set header announcing its column count
    ResultHeader { column_count: u64 },
    /// Column metadata; `last` moves a single-marker result straight to rows
    ColumnDefinition { last: bool },
    Row,
    /// End-of-result marker; `completes` when it is the final one
    EndOfResult { warnings: u16, completes: bool },
    /// Server asks the client to stream a local file
    LocalInfileRequest,
    Ok(OkSummary),
    Error { code: u16 },
    /// Payload too short for its type
    Malformed(&'static str),
}

impl Classification {
    pub fn kind(&self) -> PacketKind {
        match self {
            Classification::Query(_) => PacketKind::Query,
            Classification::ResultHeader { .. }
            | Classification::ColumnDefinition { .. }
            | Classification::Row
            | Classification::EndOfResult { .. }
            | Classification::LocalInfileRequest => PacketKind::Result,
            Classification::Ok(_) => PacketKind::Ok,
            Classification::Error { .. } => PacketKind::Error,
            Classification::Handshake { .. }
            | Classification::Command(_)
            | Classification::Continuation
            | Classification::Unsolicited
            | Classification::Malformed(_) => PacketKind::Unknown,
        }
    }
}

/// Classify a complete packet sent by `origin`
pub fn classify(packet: &Packet, origin: Origin, view: &ClassifierView) -> Classification {
    match origin {
        Origin::Client => classify_client(packet, view),
        Origin::Server => classify_server(packet, view),
        Origin::Undefined => Classification::Unsolicited,
    }
}

fn classify_client(packet: &Packet, view: &ClassifierView) -> Classification {
    if packet.sequence_id() != 0 {
        if view.handshake_from_client {
            return Classification::Continuation;
        }
        return Classification::Handshake { from_client: true };
    }

    // Sequence id 0 before any login was seen: capture joined an established session
    let Some((&byte, rest)) = packet.payload.split_first() else {
        return Classification::Malformed(constants::ERR_EMPTY_CLIENT_PAYLOAD);
    };

    match Command::from_byte(byte) {
        Command::Query => Classification::Query(String::from_utf8_lossy(rest).into_owned()),
        other => Classification::Command(other),
    }
}

fn classify_server(packet: &Packet, view: &ClassifierView) -> Classification {
    if !view.handshake_from_client {
        return Classification::Handshake { from_client: false };
    }
    if !view.was_query {
        return Classification::Unsolicited;
    }

    let payload = &packet.payload[..];
    let Some(&marker) = payload.first() else {
        return Classification::Malformed(constants::ERR_EMPTY_SERVER_PAYLOAD);
    };

    if marker == ERR_MARKER {
        return match parse_error_code(payload) {
            Some(code) => Classification::Error { code },
            None => Classification::Malformed(constants::ERR_SHORT_ERR),
        };
    }

    match view.result_phase {
        ResultPhase::Header => match marker {
            OK_MARKER => match OkSummary::parse(payload) {
                Some(ok) => Classification::Ok(ok),
                None => Classification::Malformed(constants::ERR_SHORT_OK),
            },
            LOCAL_INFILE_MARKER => Classification::LocalInfileRequest,
            _ => match read_lenenc_int(payload) {
                Some((column_count, _)) if column_count > 0 => {
                    Classification::ResultHeader { column_count }
                }
                _ => Classification::Malformed(constants::ERR_BAD_COLUMN_COUNT),
            },
        },
        ResultPhase::Columns if is_result_terminator(payload, view.eof_markers_per_result) => {
            end_of_result(payload, view)
        }
        ResultPhase::Columns => Classification::ColumnDefinition {
            last: view.eof_markers_per_result < 2 && view.columns_seen + 1 >= view.column_count,
        },
        ResultPhase::Rows if is_result_terminator(payload, view.eof_markers_per_result) => {
            end_of_result(payload, view)
        }
        ResultPhase::Rows => Classification::Row,
    }
}

fn end_of_result(payload: &[u8], view: &ClassifierView) -> Classification {
    // Single-marker dialect terminates with an OK-shaped packet
    let warnings = if view.eof_markers_per_result < 2 {
        OkSummary::parse(payload).map(|ok| ok.warnings).unwrap_or(0)
    } else {
        eof_warnings(payload)
    };

    Classification::EndOfResult {
        warnings,
        completes: view.eof_count + 1 >= usize::from(view.eof_markers_per_result),
    }
}
