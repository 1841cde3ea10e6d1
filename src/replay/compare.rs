//! Captured-versus-replayed comparison.
//!
//! The insert id is deliberately not compared: it depends on the target's
//! auto-increment state, not on the query.

use std::time::Duration;

use crate::protocol::query::{LastExecutedQueryInfo, QueryResult, QueryStatus};
use crate::replay::ReplayOutcome;

/// One field that differs between the captured and replayed result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    ColumnCount { captured: u64, replayed: u64 },
    RowsSent { captured: u64, replayed: u64 },
    RowsAffected { captured: u64, replayed: u64 },
    WarningCount { captured: u16, replayed: u16 },
    ErrorCode { captured: Option<u16>, replayed: Option<u16> },
}

/// Every field of `replayed` that disagrees with `captured`
pub fn compare_results(captured: &QueryResult, replayed: &QueryResult) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();

    if captured.error_code != replayed.error_code {
        mismatches.push(Mismatch::ErrorCode {
            captured: captured.error_code,
            replayed: replayed.error_code,
        });
    }
    if captured.column_count != replayed.column_count {
        mismatches.push(Mismatch::ColumnCount {
            captured: captured.column_count,
            replayed: replayed.column_count,
        });
    }
    if captured.rows_sent != replayed.rows_sent {
        mismatches.push(Mismatch::RowsSent {
            captured: captured.rows_sent,
            replayed: replayed.rows_sent,
        });
    }
    if captured.rows_affected != replayed.rows_affected {
        mismatches.push(Mismatch::RowsAffected {
            captured: captured.rows_affected,
            replayed: replayed.rows_affected,
        });
    }
    if captured.warning_count != replayed.warning_count {
        mismatches.push(Mismatch::WarningCount {
            captured: captured.warning_count,
            replayed: replayed.warning_count,
        });
    }

    mismatches
}

/// Outcome and timing comparison for one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeComparison {
    pub query: String,
    pub mismatches: Vec<Mismatch>,
    /// Server time observed in the capture, when the captured result completed
    pub captured_duration: Option<Duration>,
    pub replay_duration: Duration,
    /// Set when replay itself failed (connection, timeout), not when the query errored
    pub replay_failure: Option<String>,
    /// The capture never showed a complete result, so there is nothing to diff
    pub captured_incomplete: bool,
}

impl OutcomeComparison {
    /// Replay reproduced the captured outcome
    pub fn matches(&self) -> bool {
        self.mismatches.is_empty() && self.replay_failure.is_none() && !self.captured_incomplete
    }

    /// Replay time divided by captured time
    pub fn slowdown(&self) -> Option<f64> {
        let captured = self.captured_duration?;
        if captured.is_zero() {
            return None;
        }
        Some(self.replay_duration.as_secs_f64() / captured.as_secs_f64())
    }
}

/// Compare a captured record with the outcome of replaying it
pub fn compare_outcome(info: &LastExecutedQueryInfo, outcome: &ReplayOutcome) -> OutcomeComparison {
    let captured_incomplete = info.status != QueryStatus::Completed;

    let (mismatches, replay_failure) = match &outcome.result {
        Ok(replayed) if !captured_incomplete => (compare_results(&info.result, replayed), None),
        Ok(_) => (Vec::new(), None),
        Err(reason) => (Vec::new(), Some(reason.clone())),
    };

    OutcomeComparison {
        query: info.query.clone(),
        mismatches,
        captured_duration: info.captured_duration(),
        replay_duration: outcome.duration,
        replay_failure,
        captured_incomplete,
    }
}
