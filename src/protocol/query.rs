//! Captured query records.
//!
//! `LastExecutedQueryInfo` is what the comparison consumer diffs against the
//! outcome of replaying the same query against a live target.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::core::serialization::MultiFormat;
use crate::replay::ReplayHandle;

/// Summary of a result as observed on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Columns announced by the result set header (0 for OK/ERR responses)
    pub column_count: u64,
    /// Data rows sent by the server
    pub rows_sent: u64,
    /// Rows affected, from an OK response
    pub rows_affected: u64,
    /// Last insert id, from an OK response
    pub insert_id: u64,
    pub warning_count: u16,
    /// Server error code, when the response was an ERR packet
    pub error_code: Option<u16>,
}

impl QueryResult {
    pub fn is_error(&self) -> bool {
        self.error_code.is_some()
    }
}

impl MultiFormat for QueryResult {}

/// Resolution state of a dispatched query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryStatus {
    /// Nothing dispatched yet, or dispatched and awaiting its result
    #[default]
    Pending,
    /// The captured result was fully observed
    Completed,
    /// Superseded, malformed, or cut off by connection close before its result completed
    Incomplete,
}

/// The query most recently dispatched on a connection, with its captured outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastExecutedQueryInfo {
    pub query: String,
    pub result: QueryResult,
    /// Capture timestamp of the packet carrying the query
    pub begin_capture_ts: Duration,
    /// Capture timestamp of the packet that completed the result
    pub end_capture_ts: Duration,
    /// Wall clock when the parser finalized the result
    pub end_wall_ts: Option<SystemTime>,
    pub status: QueryStatus,
    /// Receipt from the replay subsystem, absent if submission failed
    pub replay_handle: Option<ReplayHandle>,
}

impl LastExecutedQueryInfo {
    /// Begin a record for a freshly dispatched query
    pub fn started(query: String, begin_capture_ts: Duration) -> Self {
        Self {
            query,
            begin_capture_ts,
            ..Self::default()
        }
    }

    /// Captured server-side duration, if the result completed
    pub fn captured_duration(&self) -> Option<Duration> {
        match self.status {
            QueryStatus::Completed => self.end_capture_ts.checked_sub(self.begin_capture_ts),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == QueryStatus::Pending && !self.query.is_empty()
    }
}

impl MultiFormat for LastExecutedQueryInfo {}
