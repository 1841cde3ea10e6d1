//! MySQL wire constants and the small decoders the classifier needs.
//!
//! Only the fields that feed the captured result summary are decoded; anything
//! else in a payload is skipped.

use std::fmt;

use crate::core::packet::MAX_PAYLOAD_LENGTH;

/// Leading byte of an OK response
pub const OK_MARKER: u8 = 0x00;
/// Leading byte of an end-of-result (EOF) marker
pub const EOF_MARKER: u8 = 0xFE;
/// Leading byte of an ERR response
pub const ERR_MARKER: u8 = 0xFF;

/// EOF markers are shorter than this; a longer 0xFE packet is a row whose first
/// value starts with an 8-byte length prefix
pub const EOF_MAX_PAYLOAD: usize = 9;
/// Marker, two single-byte length-encoded ints, status flags, warnings
pub const OK_MIN_PAYLOAD: usize = 7;
/// Marker plus the 2-byte error code
pub const ERR_MIN_PAYLOAD: usize = 3;

/// Client command byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Sleep,
    Quit,
    InitDb,
    Query,
    FieldList,
    CreateDb,
    DropDb,
    Refresh,
    Statistics,
    ProcessInfo,
    ProcessKill,
    Ping,
    ChangeUser,
    BinlogDump,
    StmtPrepare,
    StmtExecute,
    StmtSendLongData,
    StmtClose,
    StmtReset,
    SetOption,
    StmtFetch,
    ResetConnection,
    Other(u8),
}

impl Command {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Command::Sleep,
            0x01 => Command::Quit,
            0x02 => Command::InitDb,
            0x03 => Command::Query,
            0x04 => Command::FieldList,
            0x05 => Command::CreateDb,
            0x06 => Command::DropDb,
            0x07 => Command::Refresh,
            0x09 => Command::Statistics,
            0x0A => Command::ProcessInfo,
            0x0C => Command::ProcessKill,
            0x0E => Command::Ping,
            0x11 => Command::ChangeUser,
            0x12 => Command::BinlogDump,
            0x16 => Command::StmtPrepare,
            0x17 => Command::StmtExecute,
            0x18 => Command::StmtSendLongData,
            0x19 => Command::StmtClose,
            0x1A => Command::StmtReset,
            0x1B => Command::SetOption,
            0x1C => Command::StmtFetch,
            0x1F => Command::ResetConnection,
            other => Command::Other(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Command::Sleep => 0x00,
            Command::Quit => 0x01,
            Command::InitDb => 0x02,
            Command::Query => 0x03,
            Command::FieldList => 0x04,
            Command::CreateDb => 0x05,
            Command::DropDb => 0x06,
            Command::Refresh => 0x07,
            Command::Statistics => 0x09,
            Command::ProcessInfo => 0x0A,
            Command::ProcessKill => 0x0C,
            Command::Ping => 0x0E,
            Command::ChangeUser => 0x11,
            Command::BinlogDump => 0x12,
            Command::StmtPrepare => 0x16,
            Command::StmtExecute => 0x17,
            Command::StmtSendLongData => 0x18,
            Command::StmtClose => 0x19,
            Command::StmtReset => 0x1A,
            Command::SetOption => 0x1B,
            Command::StmtFetch => 0x1C,
            Command::ResetConnection => 0x1F,
            Command::Other(byte) => byte,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Sleep => "COM_SLEEP",
            Command::Quit => "COM_QUIT",
            Command::InitDb => "COM_INIT_DB",
            Command::Query => "COM_QUERY",
            Command::FieldList => "COM_FIELD_LIST",
            Command::CreateDb => "COM_CREATE_DB",
            Command::DropDb => "COM_DROP_DB",
            Command::Refresh => "COM_REFRESH",
            Command::Statistics => "COM_STATISTICS",
            Command::ProcessInfo => "COM_PROCESS_INFO",
            Command::ProcessKill => "COM_PROCESS_KILL",
            Command::Ping => "COM_PING",
            Command::ChangeUser => "COM_CHANGE_USER",
            Command::BinlogDump => "COM_BINLOG_DUMP",
            Command::StmtPrepare => "COM_STMT_PREPARE",
            Command::StmtExecute => "COM_STMT_EXECUTE",
            Command::StmtSendLongData => "COM_STMT_SEND_LONG_DATA",
            Command::StmtClose => "COM_STMT_CLOSE",
            Command::StmtReset => "COM_STMT_RESET",
            Command::SetOption => "COM_SET_OPTION",
            Command::StmtFetch => "COM_STMT_FETCH",
            Command::ResetConnection => "COM_RESET_CONNECTION",
            Command::Other(_) => "COM_UNKNOWN",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Other(byte) => write!(f, "{}({byte:#04x})", self.name()),
            _ => f.write_str(self.name()),
        }
    }
}

/// Read a length-encoded integer from the front of `buf`.
///
/// Returns the value and the number of bytes consumed. `0xFB` (NULL) and
/// `0xFF` are not integers and yield `None`, as does a truncated encoding.
pub fn read_lenenc_int(buf: &[u8]) -> Option<(u64, usize)> {
    let (&first, rest) = buf.split_first()?;
    let width = match first {
        0x00..=0xFA => return Some((u64::from(first), 1)),
        0xFC => 2,
        0xFD => 3,
        0xFE => 8,
        _ => return None,
    };

    let bytes = rest.get(..width)?;
    let value = bytes
        .iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
    Some((value, width + 1))
}

fn read_u16_le(buf: &[u8], at: usize) -> Option<u16> {
    let bytes = buf.get(at..at + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Fields of an OK response that end up in the result summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OkSummary {
    pub affected_rows: u64,
    pub insert_id: u64,
    pub status_flags: u16,
    pub warnings: u16,
}

impl OkSummary {
    /// Parse an OK payload, marker byte included
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < OK_MIN_PAYLOAD {
            return None;
        }

        let mut at = 1;
        let (affected_rows, used) = read_lenenc_int(&payload[at..])?;
        at += used;
        let (insert_id, used) = read_lenenc_int(&payload[at..])?;
        at += used;

        Some(Self {
            affected_rows,
            insert_id,
            status_flags: read_u16_le(payload, at)?,
            warnings: read_u16_le(payload, at + 2)?,
        })
    }
}

/// Error code of an ERR response
pub fn parse_error_code(payload: &[u8]) -> Option<u16> {
    if payload.len() < ERR_MIN_PAYLOAD || payload[0] != ERR_MARKER {
        return None;
    }
    read_u16_le(payload, 1)
}

/// True for a short 0xFE packet, which ends a result-set phase
#[inline]
pub fn is_eof_marker(payload: &[u8]) -> bool {
    payload.first() == Some(&EOF_MARKER) && payload.len() < EOF_MAX_PAYLOAD
}

/// True for the packet that ends a result-set phase.
///
/// With a single marker per result the terminator is an OK packet behind a
/// 0xFE header and may carry info or session-state data, so only a full-size
/// packet can be a row there. The classic dialect keeps the short-marker rule.
#[inline]
pub fn is_result_terminator(payload: &[u8], eof_markers_per_result: u8) -> bool {
    if eof_markers_per_result < 2 {
        payload.first() == Some(&EOF_MARKER) && payload.len() < MAX_PAYLOAD_LENGTH
    } else {
        is_eof_marker(payload)
    }
}

/// Warning count carried by an EOF marker, when present
pub fn eof_warnings(payload: &[u8]) -> u16 {
    read_u16_le(payload, 1).unwrap_or(0)
}
