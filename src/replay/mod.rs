//! # Replay Boundary
//!
//! The parser never owns a connection to the replay target. It hands each
//! reconstructed query to a [`ReplaySubmitter`], which must accept it without
//! blocking, and moves on. Execution happens elsewhere, in session order.
//!
//! ## Components
//! - **ReplaySubmitter**: the submission interface the dispatcher calls
//! - **Queue**: tokio-backed submitter plus a per-session ordered runner
//! - **Compare**: diffing captured outcomes against replayed ones

pub mod compare;
pub mod queue;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::identity::ConnectionIdentity;

pub use compare::{compare_outcome, compare_results, Mismatch, OutcomeComparison};
pub use queue::{run_replay, QueryExecutor, QueueReplayer, ReplayCommand, ReplayOutcome};

/// Receipt for a submitted query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplayHandle {
    /// Correlation key of the originating session
    pub key: u64,
    /// Submission order across all sessions
    pub sequence: u64,
}

/// One query queued for replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayJob {
    pub handle: ReplayHandle,
    pub identity: ConnectionIdentity,
    pub query: String,
    pub begin_capture_ts: Duration,
}

/// Submission interface into the replay subsystem.
///
/// Implementations must return promptly: parsing throughput must not depend on
/// replay latency.
pub trait ReplaySubmitter: Send + Sync {
    fn submit_query(
        &self,
        identity: ConnectionIdentity,
        query: &str,
        begin_capture_ts: Duration,
    ) -> Result<ReplayHandle>;

    /// The captured session ended; no further queries will be submitted for it
    fn session_closed(&self, _identity: ConnectionIdentity) -> Result<()> {
        Ok(())
    }
}
