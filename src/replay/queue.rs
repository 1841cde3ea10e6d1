//! Tokio-backed replay queue.
//!
//! `QueueReplayer` enqueues onto an unbounded channel, so submission never
//! waits. `run_replay` drains that channel and fans jobs out to one worker task
//! per captured session: queries of one session replay strictly in capture
//! order, sessions replay concurrently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, instrument, warn};

use crate::config::ReplayConfig;
use crate::error::{ProtocolError, Result};
use crate::protocol::identity::ConnectionIdentity;
use crate::protocol::query::QueryResult;
use crate::replay::{ReplayHandle, ReplayJob, ReplaySubmitter};

/// Messages carried from the parser to the replay runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayCommand {
    Execute(ReplayJob),
    /// Session ended; its worker exits once its backlog is replayed
    Close(ConnectionIdentity),
}

/// Non-blocking submitter feeding `run_replay`
#[derive(Debug)]
pub struct QueueReplayer {
    tx: mpsc::UnboundedSender<ReplayCommand>,
    next_sequence: AtomicU64,
}

impl QueueReplayer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReplayCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                next_sequence: AtomicU64::new(0),
            },
            rx,
        )
    }
}

impl ReplaySubmitter for QueueReplayer {
    fn submit_query(
        &self,
        identity: ConnectionIdentity,
        query: &str,
        begin_capture_ts: Duration,
    ) -> Result<ReplayHandle> {
        let handle = ReplayHandle {
            key: identity.correlation_key(),
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
        };

        self.tx
            .send(ReplayCommand::Execute(ReplayJob {
                handle,
                identity,
                query: query.to_owned(),
                begin_capture_ts,
            }))
            .map_err(|_| ProtocolError::ReplayClosed)?;

        Ok(handle)
    }

    fn session_closed(&self, identity: ConnectionIdentity) -> Result<()> {
        self.tx
            .send(ReplayCommand::Close(identity))
            .map_err(|_| ProtocolError::ReplayClosed)
    }
}

/// Executes one query against the replay target
pub trait QueryExecutor: Send + Sync + 'static {
    fn execute<'a>(&'a self, job: &'a ReplayJob) -> BoxFuture<'a, Result<QueryResult>>;
}

/// Result of replaying one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub handle: ReplayHandle,
    pub identity: ConnectionIdentity,
    pub query: String,
    /// Replayed result, or the reason replay failed
    pub result: std::result::Result<QueryResult, String>,
    /// Wall time spent executing against the target
    pub duration: Duration,
}

struct SessionQueue {
    tx: mpsc::UnboundedSender<ReplayJob>,
    pending: Arc<AtomicUsize>,
}

/// Drive replay until every `QueueReplayer` feeding `rx` is dropped.
///
/// Outcomes are sent to `outcomes` as they complete. Returns after all session
/// workers have drained their backlog.
#[instrument(skip_all)]
pub async fn run_replay<E: QueryExecutor>(
    rx: mpsc::UnboundedReceiver<ReplayCommand>,
    executor: Arc<E>,
    config: ReplayConfig,
    outcomes: mpsc::UnboundedSender<ReplayOutcome>,
) {
    let mut commands = UnboundedReceiverStream::new(rx);
    let mut sessions: HashMap<u64, SessionQueue> = HashMap::new();
    let mut workers = JoinSet::new();

    while let Some(command) = commands.next().await {
        match command {
            ReplayCommand::Execute(job) => {
                let key = job.handle.key;
                let session = sessions.entry(key).or_insert_with(|| {
                    let (tx, rx) = mpsc::unbounded_channel();
                    let pending = Arc::new(AtomicUsize::new(0));
                    workers.spawn(session_worker(
                        rx,
                        executor.clone(),
                        config.query_timeout,
                        pending.clone(),
                        outcomes.clone(),
                    ));
                    debug!(key, "Started replay session worker");
                    SessionQueue { tx, pending }
                });

                let depth = session.pending.fetch_add(1, Ordering::Relaxed) + 1;
                if depth > config.queue_warn_depth {
                    warn!(key, depth, "Replay session falling behind capture");
                }

                if session.tx.send(job).is_err() {
                    session.pending.fetch_sub(1, Ordering::Relaxed);
                    error!(key, "Replay session worker exited early; dropping query");
                }
            }
            ReplayCommand::Close(identity) => {
                // Dropping the sender lets the worker finish its backlog and exit
                if sessions.remove(&identity.correlation_key()).is_some() {
                    debug!(key = identity.correlation_key(), "Replay session closed");
                }
            }
        }
    }

    sessions.clear();
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Replay session worker failed");
        }
    }
}

async fn session_worker<E: QueryExecutor>(
    mut rx: mpsc::UnboundedReceiver<ReplayJob>,
    executor: Arc<E>,
    query_timeout: Duration,
    pending: Arc<AtomicUsize>,
    outcomes: mpsc::UnboundedSender<ReplayOutcome>,
) {
    while let Some(job) = rx.recv().await {
        let started = Instant::now();
        let result = match tokio::time::timeout(query_timeout, executor.execute(&job)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("Replay timed out after {query_timeout:?}")),
        };
        pending.fetch_sub(1, Ordering::Relaxed);

        let outcome = ReplayOutcome {
            handle: job.handle,
            identity: job.identity,
            query: job.query,
            result,
            duration: started.elapsed(),
        };

        if outcomes.send(outcome).is_err() {
            debug!("Outcome receiver dropped; replaying without reporting");
        }
    }
}
