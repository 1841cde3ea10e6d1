//! Parser statistics
//!
//! The parser reports every noteworthy event across the `StatsRecorder`
//! boundary. `ParserStats` is the built-in recorder: lock-free atomic counters
//! that can be snapshotted and logged at any time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info};

use crate::protocol::identity::ConnectionIdentity;
use crate::protocol::query::LastExecutedQueryInfo;

/// Kinds of events reported by the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// First traffic seen for a connection
    ConnectionOpened,
    /// Capture layer reported the connection closed
    ConnectionClosed,
    /// A complete logical packet was reassembled
    PacketParsed,
    QueryDispatched,
    ResultDispatched,
    /// Handshake data, administrative commands, and server packets with no query in flight
    UnknownPacket,
    /// Payload too short for its type, or a stalled reassembly buffer
    MalformedPacket,
    /// A new query arrived while the previous one was still unresolved
    UnexpectedOrigin,
    /// Connection closed with a query still in flight
    ConnectionAbandonedIncomplete,
}

/// Timing context attached to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTimestamps {
    /// Capture timestamp of the packet that triggered the event
    pub capture: Duration,
    /// Capture timestamp of the query the event belongs to, if any
    pub query_begin: Option<Duration>,
    /// Wall clock when the event was recorded
    pub wall: SystemTime,
}

impl EventTimestamps {
    pub fn at(capture: Duration) -> Self {
        Self {
            capture,
            query_begin: None,
            wall: SystemTime::now(),
        }
    }

    pub fn for_query(capture: Duration, query_begin: Duration) -> Self {
        Self {
            query_begin: Some(query_begin),
            ..Self::at(capture)
        }
    }
}

/// Receiver of parser events. Implementations must not block.
pub trait StatsRecorder: Send + Sync {
    fn record_event(&self, kind: EventKind, identity: ConnectionIdentity, timestamps: &EventTimestamps);

    /// A query's captured outcome was finalized
    fn record_query_info(&self, _identity: ConnectionIdentity, _info: &LastExecutedQueryInfo) {}
}

impl<T: StatsRecorder + ?Sized> StatsRecorder for &T {
    fn record_event(&self, kind: EventKind, identity: ConnectionIdentity, timestamps: &EventTimestamps) {
        (**self).record_event(kind, identity, timestamps)
    }

    fn record_query_info(&self, identity: ConnectionIdentity, info: &LastExecutedQueryInfo) {
        (**self).record_query_info(identity, info)
    }
}

/// Atomic counters for parser activity
#[derive(Debug)]
pub struct ParserStats {
    pub connections_opened: AtomicU64,
    pub connections_closed: AtomicU64,
    pub packets_parsed: AtomicU64,
    pub queries_dispatched: AtomicU64,
    pub results_dispatched: AtomicU64,
    pub unknown_packets: AtomicU64,
    pub malformed_packets: AtomicU64,
    pub unexpected_origin: AtomicU64,
    pub abandoned_incomplete: AtomicU64,
    /// Results that were server errors
    pub result_errors: AtomicU64,
    /// Data rows observed across all completed results
    pub rows_captured: AtomicU64,
    /// Sum of captured query durations, in microseconds
    pub captured_micros: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl ParserStats {
    pub fn new() -> Self {
        Self {
            connections_opened: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            packets_parsed: AtomicU64::new(0),
            queries_dispatched: AtomicU64::new(0),
            results_dispatched: AtomicU64::new(0),
            unknown_packets: AtomicU64::new(0),
            malformed_packets: AtomicU64::new(0),
            unexpected_origin: AtomicU64::new(0),
            abandoned_incomplete: AtomicU64::new(0),
            result_errors: AtomicU64::new(0),
            rows_captured: AtomicU64::new(0),
            captured_micros: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    fn counter(&self, kind: EventKind) -> &AtomicU64 {
        match kind {
            EventKind::ConnectionOpened => &self.connections_opened,
            EventKind::ConnectionClosed => &self.connections_closed,
            EventKind::PacketParsed => &self.packets_parsed,
            EventKind::QueryDispatched => &self.queries_dispatched,
            EventKind::ResultDispatched => &self.results_dispatched,
            EventKind::UnknownPacket => &self.unknown_packets,
            EventKind::MalformedPacket => &self.malformed_packets,
            EventKind::UnexpectedOrigin => &self.unexpected_origin,
            EventKind::ConnectionAbandonedIncomplete => &self.abandoned_incomplete,
        }
    }

    /// Current value of the counter backing `kind`
    pub fn count(&self, kind: EventKind) -> u64 {
        self.counter(kind).load(Ordering::Relaxed)
    }

    /// Get current stats snapshot
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            packets_parsed: self.packets_parsed.load(Ordering::Relaxed),
            queries_dispatched: self.queries_dispatched.load(Ordering::Relaxed),
            results_dispatched: self.results_dispatched.load(Ordering::Relaxed),
            unknown_packets: self.unknown_packets.load(Ordering::Relaxed),
            malformed_packets: self.malformed_packets.load(Ordering::Relaxed),
            unexpected_origin: self.unexpected_origin.load(Ordering::Relaxed),
            abandoned_incomplete: self.abandoned_incomplete.load(Ordering::Relaxed),
            result_errors: self.result_errors.load(Ordering::Relaxed),
            rows_captured: self.rows_captured.load(Ordering::Relaxed),
            captured_micros: self.captured_micros.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current stats
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_opened = snapshot.connections_opened,
            connections_closed = snapshot.connections_closed,
            packets_parsed = snapshot.packets_parsed,
            queries_dispatched = snapshot.queries_dispatched,
            results_dispatched = snapshot.results_dispatched,
            unknown_packets = snapshot.unknown_packets,
            malformed_packets = snapshot.malformed_packets,
            unexpected_origin = snapshot.unexpected_origin,
            abandoned_incomplete = snapshot.abandoned_incomplete,
            result_errors = snapshot.result_errors,
            rows_captured = snapshot.rows_captured,
            captured_micros = snapshot.captured_micros,
            uptime_seconds = snapshot.uptime_seconds,
            "Parser stats snapshot"
        );
    }
}

impl Default for ParserStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsRecorder for ParserStats {
    fn record_event(
        &self,
        kind: EventKind,
        _identity: ConnectionIdentity,
        _timestamps: &EventTimestamps,
    ) {
        self.counter(kind).fetch_add(1, Ordering::Relaxed);
    }

    fn record_query_info(&self, _identity: ConnectionIdentity, info: &LastExecutedQueryInfo) {
        self.rows_captured
            .fetch_add(info.result.rows_sent, Ordering::Relaxed);
        if info.result.is_error() {
            self.result_errors.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(elapsed) = info.captured_duration() {
            self.captured_micros
                .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        }
    }
}

/// Snapshot of parser stats at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub packets_parsed: u64,
    pub queries_dispatched: u64,
    pub results_dispatched: u64,
    pub unknown_packets: u64,
    pub malformed_packets: u64,
    pub unexpected_origin: u64,
    pub abandoned_incomplete: u64,
    pub result_errors: u64,
    pub rows_captured: u64,
    pub captured_micros: u64,
    pub uptime_seconds: u64,
}

/// Global stats instance
static STATS: once_cell::sync::Lazy<ParserStats> = once_cell::sync::Lazy::new(ParserStats::new);

/// Get the global stats instance
pub fn global_stats() -> &'static ParserStats {
    &STATS
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}
