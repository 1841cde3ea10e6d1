use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ProtocolError;
use crate::protocol::connection::{ConnectionPhase, ConnectionState};
use crate::protocol::identity::ConnectionIdentity;
use crate::replay::ReplaySubmitter;
use crate::utils::metrics::{global_stats, EventKind, EventTimestamps, StatsRecorder};
use crate::utils::time::elapsed_between;

/// Boundary between the parser and its collaborators.
/// Hands queries to replay and finished outcomes to statistics; never blocks.
#[derive(Clone)]
pub struct Dispatcher {
    replay: Arc<dyn ReplaySubmitter>,
    stats: Arc<dyn StatsRecorder>,
}

impl Dispatcher {
    pub fn new(replay: Arc<dyn ReplaySubmitter>, stats: Arc<dyn StatsRecorder>) -> Self {
        Self { replay, stats }
    }

    /// Dispatcher reporting into the process-wide [`global_stats`] counters
    pub fn with_global_stats(replay: Arc<dyn ReplaySubmitter>) -> Self {
        Self::new(replay, Arc::new(global_stats()))
    }

    /// Start a query: the previous one, if still unresolved, is marked incomplete
    pub fn dispatch_query(&self, ts: Duration, query: String, state: &mut ConnectionState) {
        let identity = state.identity();

        if state.phase() == ConnectionPhase::AwaitingResult {
            let err = ProtocolError::UnexpectedOrigin {
                key: identity.correlation_key(),
            };
            warn!(
                previous = %state.last_executed_query_info().query,
                "{err}: query arrived before the previous result completed"
            );
            self.abandon_in_flight(ts, state, EventKind::UnexpectedOrigin);
        }

        state.begin_query(query, ts);

        let submitted =
            self.replay
                .submit_query(identity, &state.last_executed_query_info().query, ts);
        match submitted {
            Ok(handle) => state.attach_replay_handle(handle),
            Err(e) => warn!(
                key = identity.correlation_key(),
                error = %e,
                "Replay submission failed; query tracked without replay"
            ),
        }

        debug!(
            key = identity.correlation_key(),
            query = %state.last_executed_query_info().query,
            "Dispatched query"
        );
        self.stats.record_event(
            EventKind::QueryDispatched,
            identity,
            &EventTimestamps::for_query(ts, ts),
        );
    }

    /// Close the in-flight query as completed and report its outcome
    pub fn dispatch_result(&self, ts: Duration, state: &mut ConnectionState) {
        let identity = state.identity();
        let info = state.finish_query(ts);

        debug!(
            key = identity.correlation_key(),
            rows = info.result.rows_sent,
            error_code = ?info.result.error_code,
            captured_us = elapsed_between(info.begin_capture_ts, ts).as_micros() as u64,
            "Dispatched result"
        );
        self.stats.record_query_info(identity, info);
        self.stats.record_event(
            EventKind::ResultDispatched,
            identity,
            &EventTimestamps::for_query(ts, info.begin_capture_ts),
        );
    }

    /// Mark the in-flight query incomplete and report it along with why.
    /// The record is handed over before anything can replace it.
    pub fn abandon_in_flight(&self, ts: Duration, state: &mut ConnectionState, reason: EventKind) {
        let identity = state.identity();
        let info = state.abandon_query(ts);

        debug!(
            key = identity.correlation_key(),
            query = %info.query,
            ?reason,
            "Abandoned in-flight query"
        );
        self.stats.record_query_info(identity, info);
        self.stats.record_event(
            reason,
            identity,
            &EventTimestamps::for_query(ts, info.begin_capture_ts),
        );
    }

    /// Tell replay that a session ended
    pub fn session_closed(&self, identity: ConnectionIdentity) {
        if let Err(e) = self.replay.session_closed(identity) {
            warn!(key = identity.correlation_key(), error = %e, "Failed to close replay session");
        }
    }

    #[inline]
    pub fn record(&self, kind: EventKind, identity: ConnectionIdentity, ts: Duration) {
        self.stats.record_event(kind, identity, &EventTimestamps::at(ts));
    }
}
