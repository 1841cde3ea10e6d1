//! # Connection State Machine
//!
//! One `ConnectionState` per captured session. It owns a reassembly buffer for
//! each direction, runs every complete packet through the classifier, and
//! applies the result:
//!
//! ```text
//! AwaitingHandshake -> AwaitingQuery <-> AwaitingResult
//! ```
//!
//! There is no terminal state while the connection is open. Close is handled
//! by the registry, which abandons any query still awaiting its result.

use std::time::{Duration, SystemTime};

use tracing::{debug, trace, warn};

use crate::config::ParserConfig;
use crate::core::packet::Packet;
use crate::core::reassembly::ReassemblyBuffer;
use crate::error::{constants, ProtocolError};
use crate::protocol::classifier::{classify, Classification, ClassifierView, ResultPhase};
use crate::protocol::command::Command;
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::identity::{ConnectionIdentity, Direction, Origin};
use crate::protocol::query::{LastExecutedQueryInfo, QueryResult, QueryStatus};
use crate::replay::ReplayHandle;
use crate::utils::metrics::EventKind;

/// Where a connection stands in the request/response cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionPhase {
    /// Nothing seen from the client yet
    #[default]
    AwaitingHandshake,
    /// Resting state between queries
    AwaitingQuery,
    /// A query was dispatched and its result is still arriving
    AwaitingResult,
}

/// Per-connection parser state
#[derive(Debug)]
pub struct ConnectionState {
    identity: ConnectionIdentity,
    current_origin: Origin,
    phase: ConnectionPhase,
    result_phase: ResultPhase,
    client_buffer: ReassemblyBuffer,
    server_buffer: ReassemblyBuffer,
    handshake_from_client: bool,
    was_query: bool,
    eof_count: usize,
    sent_rows_count: u64,
    column_count: u64,
    columns_seen: u64,
    pending_result: QueryResult,
    last_executed_query_info: LastExecutedQueryInfo,
    eof_markers_per_result: u8,
    buffer_limit: Option<usize>,
    last_capture_ts: Duration,
    closed: bool,
}

impl ConnectionState {
    pub fn new(identity: ConnectionIdentity, config: &ParserConfig) -> Self {
        Self {
            identity,
            current_origin: Origin::Undefined,
            phase: ConnectionPhase::AwaitingHandshake,
            result_phase: ResultPhase::Header,
            client_buffer: ReassemblyBuffer::new(),
            server_buffer: ReassemblyBuffer::new(),
            handshake_from_client: false,
            was_query: false,
            eof_count: 0,
            sent_rows_count: 0,
            column_count: 0,
            columns_seen: 0,
            pending_result: QueryResult::default(),
            last_executed_query_info: LastExecutedQueryInfo::default(),
            eof_markers_per_result: config.markers_per_result(),
            buffer_limit: config.buffer_limit(),
            last_capture_ts: Duration::ZERO,
            closed: false,
        }
    }

    /// Feed captured bytes travelling in `direction` and act on every packet
    /// they complete.
    ///
    /// Bytes for one direction must arrive in capture order.
    pub fn process_bytes(
        &mut self,
        direction: Direction,
        ts: Duration,
        bytes: &[u8],
        dispatcher: &Dispatcher,
    ) {
        self.last_capture_ts = ts;
        let origin = direction.origin();
        self.buffer_mut(direction).extend(bytes);

        while let Some(packet) = self.buffer_mut(direction).next_packet() {
            dispatcher.record(EventKind::PacketParsed, self.identity, ts);
            let classification = classify(&packet, origin, &self.view());
            trace!(
                key = self.identity.correlation_key(),
                seq = packet.sequence_id(),
                len = packet.len(),
                kind = ?classification.kind(),
                "Classified packet"
            );
            self.apply(classification, &packet, origin, ts, dispatcher);
        }

        self.enforce_buffer_limit(direction, ts, dispatcher);
    }

    fn apply(
        &mut self,
        classification: Classification,
        packet: &Packet,
        origin: Origin,
        ts: Duration,
        dispatcher: &Dispatcher,
    ) {
        match classification {
            Classification::Handshake { from_client } => {
                if from_client {
                    self.client_spoke();
                }
                dispatcher.record(EventKind::UnknownPacket, self.identity, ts);
            }
            Classification::Query(query) => {
                self.client_spoke();
                dispatcher.dispatch_query(ts, query, self);
            }
            Classification::Command(command) => {
                self.client_spoke();
                if self.phase == ConnectionPhase::AwaitingResult {
                    warn!(
                        key = self.identity.correlation_key(),
                        %command,
                        "Command arrived before the previous result completed"
                    );
                    dispatcher.abandon_in_flight(ts, self, EventKind::UnexpectedOrigin);
                }
                if let Command::Other(byte) = command {
                    debug!(
                        key = self.identity.correlation_key(),
                        "{}",
                        ProtocolError::UnknownCommand(byte)
                    );
                } else {
                    debug!(key = self.identity.correlation_key(), %command, "Ignoring non-query command");
                }
                self.was_query = false;
                self.current_origin = Origin::Server;
                dispatcher.record(EventKind::UnknownPacket, self.identity, ts);
            }
            Classification::Continuation | Classification::Unsolicited => {
                dispatcher.record(EventKind::UnknownPacket, self.identity, ts);
            }
            Classification::ResultHeader { column_count } => {
                self.column_count = column_count;
                self.columns_seen = 0;
                self.pending_result.column_count = column_count;
                self.result_phase = ResultPhase::Columns;
            }
            Classification::ColumnDefinition { last } => {
                self.columns_seen += 1;
                if last {
                    self.result_phase = ResultPhase::Rows;
                }
            }
            Classification::Row => {
                self.sent_rows_count += 1;
            }
            Classification::EndOfResult { warnings, completes } => {
                self.eof_count += 1;
                if completes {
                    self.pending_result.rows_sent = self.sent_rows_count;
                    self.pending_result.warning_count = warnings;
                    dispatcher.dispatch_result(ts, self);
                } else {
                    self.result_phase = ResultPhase::Rows;
                }
            }
            Classification::LocalInfileRequest => {
                debug!(key = self.identity.correlation_key(), "Server requested LOCAL INFILE");
            }
            Classification::Ok(ok) => {
                self.pending_result.rows_affected = ok.affected_rows;
                self.pending_result.insert_id = ok.insert_id;
                self.pending_result.warning_count = ok.warnings;
                dispatcher.dispatch_result(ts, self);
            }
            Classification::Error { code } => {
                self.pending_result.error_code = Some(code);
                self.pending_result.rows_sent = self.sent_rows_count;
                dispatcher.dispatch_result(ts, self);
            }
            Classification::Malformed(reason) => {
                let err = ProtocolError::MalformedPacket(reason.to_string());
                warn!(
                    key = self.identity.correlation_key(),
                    seq = packet.sequence_id(),
                    len = packet.len(),
                    ?origin,
                    "{err}"
                );
                if origin == Origin::Server && self.phase == ConnectionPhase::AwaitingResult {
                    dispatcher.abandon_in_flight(ts, self, EventKind::MalformedPacket);
                } else {
                    dispatcher.record(EventKind::MalformedPacket, self.identity, ts);
                }
            }
        }
    }

    /// Any client packet proves the login exchange is behind us
    fn client_spoke(&mut self) {
        self.handshake_from_client = true;
        if self.phase == ConnectionPhase::AwaitingHandshake {
            self.phase = ConnectionPhase::AwaitingQuery;
            self.current_origin = Origin::Client;
        }
    }

    fn enforce_buffer_limit(&mut self, direction: Direction, ts: Duration, dispatcher: &Dispatcher) {
        let Some(limit) = self.buffer_limit else {
            return;
        };
        let buffered = self.buffer_mut(direction).buffered_len();
        if buffered <= limit {
            return;
        }

        warn!(
            key = self.identity.correlation_key(),
            ?direction,
            buffered,
            limit,
            "{}",
            constants::ERR_STALLED_BUFFER
        );
        self.buffer_mut(direction).clear();
        dispatcher.record(EventKind::MalformedPacket, self.identity, ts);
    }

    fn buffer_mut(&mut self, direction: Direction) -> &mut ReassemblyBuffer {
        match direction {
            Direction::ClientToServer => &mut self.client_buffer,
            Direction::ServerToClient => &mut self.server_buffer,
        }
    }

    /// Read-only state the classifier consults
    pub fn view(&self) -> ClassifierView {
        ClassifierView {
            handshake_from_client: self.handshake_from_client,
            was_query: self.was_query,
            result_phase: self.result_phase,
            eof_count: self.eof_count,
            column_count: self.column_count,
            columns_seen: self.columns_seen,
            eof_markers_per_result: self.eof_markers_per_result,
        }
    }

    /// Start tracking a freshly dispatched query
    pub(crate) fn begin_query(&mut self, query: String, ts: Duration) {
        self.last_executed_query_info = LastExecutedQueryInfo::started(query, ts);
        self.pending_result = QueryResult::default();
        self.eof_count = 0;
        self.sent_rows_count = 0;
        self.column_count = 0;
        self.columns_seen = 0;
        self.result_phase = ResultPhase::Header;
        self.was_query = true;
        self.phase = ConnectionPhase::AwaitingResult;
        self.current_origin = Origin::Server;
    }

    pub(crate) fn attach_replay_handle(&mut self, handle: ReplayHandle) {
        self.last_executed_query_info.replay_handle = Some(handle);
    }

    /// Close the in-flight query with the result accumulated so far
    pub(crate) fn finish_query(&mut self, ts: Duration) -> &LastExecutedQueryInfo {
        self.settle(ts, QueryStatus::Completed);
        &self.last_executed_query_info
    }

    /// Give up on the in-flight query; it is never retried
    pub(crate) fn abandon_query(&mut self, ts: Duration) -> &LastExecutedQueryInfo {
        self.pending_result.rows_sent = self.sent_rows_count;
        self.settle(ts, QueryStatus::Incomplete);
        &self.last_executed_query_info
    }

    fn settle(&mut self, ts: Duration, status: QueryStatus) {
        let info = &mut self.last_executed_query_info;
        info.result = std::mem::take(&mut self.pending_result);
        info.end_capture_ts = ts;
        info.end_wall_ts = Some(SystemTime::now());
        info.status = status;

        self.was_query = false;
        self.result_phase = ResultPhase::Header;
        self.phase = ConnectionPhase::AwaitingQuery;
        self.current_origin = Origin::Client;
    }

    /// Set by the registry once teardown has run; a closed state takes no more bytes
    pub(crate) fn mark_closed(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn identity(&self) -> ConnectionIdentity {
        self.identity
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn result_phase(&self) -> ResultPhase {
        self.result_phase
    }

    pub fn current_origin(&self) -> Origin {
        self.current_origin
    }

    pub fn handshake_from_client(&self) -> bool {
        self.handshake_from_client
    }

    pub fn was_query(&self) -> bool {
        self.was_query
    }

    pub fn eof_count(&self) -> usize {
        self.eof_count
    }

    pub fn sent_rows_count(&self) -> u64 {
        self.sent_rows_count
    }

    /// A partial packet is pending in either direction
    pub fn fragmented(&self) -> bool {
        self.client_buffer.fragmented() || self.server_buffer.fragmented()
    }

    pub fn last_executed_query_info(&self) -> &LastExecutedQueryInfo {
        &self.last_executed_query_info
    }

    /// Capture timestamp of the most recent delivery
    pub fn last_capture_ts(&self) -> Duration {
        self.last_capture_ts
    }

    /// Bytes held back waiting for the rest of a packet
    pub fn buffered_len(&self, direction: Direction) -> usize {
        match direction {
            Direction::ClientToServer => self.client_buffer.buffered_len(),
            Direction::ServerToClient => self.server_buffer.buffered_len(),
        }
    }
}
