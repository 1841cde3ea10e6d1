//! Shared builders and recording collaborators for integration tests

#![allow(dead_code, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use wire_playback::config::ParserConfig;
use wire_playback::error::Result;
use wire_playback::protocol::{ConnectionIdentity, ConnectionRegistry, Dispatcher, LastExecutedQueryInfo};
use wire_playback::replay::{ReplayHandle, ReplaySubmitter};
use wire_playback::utils::{EventKind, EventTimestamps, StatsRecorder};

pub const OK_EMPTY: [u8; 7] = [0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00];
pub const EOF: [u8; 5] = [0xFE, 0x00, 0x00, 0x02, 0x00];

/// Wrap a payload in a wire header
pub fn frame(seq: u8, payload: &[u8]) -> Vec<u8> {
    let len = payload.len() as u32;
    let mut out = vec![len as u8, (len >> 8) as u8, (len >> 16) as u8, seq];
    out.extend_from_slice(payload);
    out
}

/// COM_QUERY packet
pub fn query(text: &str) -> Vec<u8> {
    let mut payload = vec![0x03];
    payload.extend_from_slice(text.as_bytes());
    frame(0, &payload)
}

/// Classic two-marker result set with one column and `rows` single-value rows
pub fn result_set(rows: usize) -> Vec<u8> {
    let mut out = frame(1, &[0x01]);
    out.extend(frame(2, b"\x03def\x00\x00\x00\x01a\x00\x0c"));
    out.extend(frame(3, &EOF));
    let mut seq = 4u8;
    for i in 0..rows {
        let value = i.to_string();
        let mut row = vec![value.len() as u8];
        row.extend_from_slice(value.as_bytes());
        out.extend(frame(seq, &row));
        seq = seq.wrapping_add(1);
    }
    out.extend(frame(seq, &EOF));
    out
}

pub fn ts(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

pub fn client(port: u16) -> ConnectionIdentity {
    ConnectionIdentity::new(0x0A00_0064, port)
}

#[derive(Default)]
pub struct RecordingReplay {
    pub submitted: Mutex<Vec<(u64, String)>>,
    pub closed: Mutex<Vec<u64>>,
}

impl RecordingReplay {
    pub fn queries_for(&self, identity: ConnectionIdentity) -> Vec<String> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| *key == identity.correlation_key())
            .map(|(_, q)| q.clone())
            .collect()
    }
}

impl ReplaySubmitter for RecordingReplay {
    fn submit_query(
        &self,
        identity: ConnectionIdentity,
        query: &str,
        _begin_capture_ts: Duration,
    ) -> Result<ReplayHandle> {
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push((identity.correlation_key(), query.to_string()));
        Ok(ReplayHandle {
            key: identity.correlation_key(),
            sequence: submitted.len() as u64 - 1,
        })
    }

    fn session_closed(&self, identity: ConnectionIdentity) -> Result<()> {
        self.closed.lock().unwrap().push(identity.correlation_key());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingStats {
    pub events: Mutex<Vec<(EventKind, u64)>>,
    pub infos: Mutex<Vec<LastExecutedQueryInfo>>,
}

impl RecordingStats {
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().unwrap().iter().filter(|(k, _)| *k == kind).count()
    }
}

impl StatsRecorder for RecordingStats {
    fn record_event(&self, kind: EventKind, identity: ConnectionIdentity, _ts: &EventTimestamps) {
        self.events
            .lock()
            .unwrap()
            .push((kind, identity.correlation_key()));
    }

    fn record_query_info(&self, _identity: ConnectionIdentity, info: &LastExecutedQueryInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }
}

pub fn registry_with(
    config: ParserConfig,
) -> (ConnectionRegistry, Arc<RecordingReplay>, Arc<RecordingStats>) {
    let replay = Arc::new(RecordingReplay::default());
    let stats = Arc::new(RecordingStats::default());
    let registry = ConnectionRegistry::new(config, Dispatcher::new(replay.clone(), stats.clone()));
    (registry, replay, stats)
}

pub fn registry() -> (ConnectionRegistry, Arc<RecordingReplay>, Arc<RecordingStats>) {
    registry_with(ParserConfig::default())
}
