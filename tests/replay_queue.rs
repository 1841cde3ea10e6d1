//! End-to-end replay: capture bytes in, replay outcomes and comparisons out

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{client, frame, query, result_set, ts, OK_EMPTY};
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use wire_playback::config::{ParserConfig, ReplayConfig};
use wire_playback::error::{ProtocolError, Result};
use wire_playback::protocol::{ConnectionRegistry, Direction, Dispatcher, QueryResult};
use wire_playback::replay::{
    compare_outcome, run_replay, Mismatch, QueryExecutor, QueueReplayer, ReplayJob, ReplayOutcome,
};
use wire_playback::utils::ParserStats;

/// Answers from a fixed table and remembers execution order per session
#[derive(Default)]
struct ScriptedExecutor {
    answers: HashMap<String, QueryResult>,
    delay: Duration,
    executed: Mutex<Vec<(u64, String)>>,
}

impl QueryExecutor for ScriptedExecutor {
    fn execute<'a>(&'a self, job: &'a ReplayJob) -> BoxFuture<'a, Result<QueryResult>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.executed
                .lock()
                .unwrap()
                .push((job.handle.key, job.query.clone()));
            self.answers
                .get(&job.query)
                .cloned()
                .ok_or_else(|| ProtocolError::ReplayFailed(format!("no answer for {}", job.query)))
        })
    }
}

async fn collect(mut rx: mpsc::UnboundedReceiver<ReplayOutcome>) -> Vec<ReplayOutcome> {
    let mut out = Vec::new();
    while let Some(outcome) = rx.recv().await {
        out.push(outcome);
    }
    out
}

#[tokio::test]
async fn replay_preserves_per_session_order() {
    let (replayer, commands) = QueueReplayer::new();
    let registry = ConnectionRegistry::new(
        ParserConfig::default(),
        Dispatcher::new(Arc::new(replayer), Arc::new(ParserStats::new())),
    );

    let mut answers = HashMap::new();
    for i in 0..5 {
        answers.insert(format!("SELECT {i}"), QueryResult::default());
    }
    let executor = Arc::new(ScriptedExecutor {
        answers,
        delay: Duration::from_millis(2),
        ..ScriptedExecutor::default()
    });

    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    let runner = tokio::spawn(run_replay(
        commands,
        executor.clone(),
        ReplayConfig::default(),
        outcome_tx,
    ));

    let sessions = [client(50000), client(50001)];
    for i in 0..5 {
        for id in sessions {
            registry
                .deliver_bytes(id, Direction::ClientToServer, ts(i * 10), &query(&format!("SELECT {i}")))
                .unwrap();
            registry
                .deliver_bytes(id, Direction::ServerToClient, ts(i * 10 + 1), &frame(1, &OK_EMPTY))
                .unwrap();
        }
    }
    registry.close_all().unwrap();
    drop(registry);

    runner.await.unwrap();
    let outcomes = collect(outcome_rx).await;
    assert_eq!(outcomes.len(), 10);
    assert!(outcomes.iter().all(|o| o.result.is_ok()));

    let executed = executor.executed.lock().unwrap();
    for id in sessions {
        let order: Vec<&str> = executed
            .iter()
            .filter(|(key, _)| *key == id.correlation_key())
            .map(|(_, q)| q.as_str())
            .collect();
        assert_eq!(order, ["SELECT 0", "SELECT 1", "SELECT 2", "SELECT 3", "SELECT 4"]);
    }
}

#[tokio::test]
async fn replay_timeout_reports_failure() {
    let (replayer, commands) = QueueReplayer::new();
    let executor = Arc::new(ScriptedExecutor {
        delay: Duration::from_millis(200),
        ..ScriptedExecutor::default()
    });
    let config = ReplayConfig {
        query_timeout: Duration::from_millis(20),
        ..ReplayConfig::default()
    };

    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    let runner = tokio::spawn(run_replay(commands, executor, config, outcome_tx));

    use wire_playback::replay::ReplaySubmitter;
    replayer
        .submit_query(client(50010), "SELECT SLEEP(1)", ts(0))
        .unwrap();
    drop(replayer);

    runner.await.unwrap();
    let outcomes = collect(outcome_rx).await;
    assert_eq!(outcomes.len(), 1);
    let failure = outcomes[0].result.as_ref().expect_err("timed out");
    assert!(failure.contains("timed out"));
}

#[tokio::test]
async fn captured_and_replayed_outcomes_compare() {
    let (replayer, commands) = QueueReplayer::new();
    let stats = Arc::new(ParserStats::new());
    let registry = ConnectionRegistry::new(
        ParserConfig::default(),
        Dispatcher::new(Arc::new(replayer), stats.clone()),
    );

    let mut answers = HashMap::new();
    answers.insert(
        "SELECT a FROM t".to_string(),
        QueryResult {
            column_count: 1,
            rows_sent: 2,
            ..QueryResult::default()
        },
    );
    let executor = Arc::new(ScriptedExecutor {
        answers,
        ..ScriptedExecutor::default()
    });

    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    let runner = tokio::spawn(run_replay(
        commands,
        executor,
        ReplayConfig::default(),
        outcome_tx,
    ));

    let id = client(50020);
    registry
        .deliver_bytes(id, Direction::ClientToServer, ts(100), &query("SELECT a FROM t"))
        .unwrap();
    registry
        .deliver_bytes(id, Direction::ServerToClient, ts(104), &result_set(3))
        .unwrap();
    let captured = registry.notify_connection_closed(id).unwrap().unwrap();
    drop(registry);

    runner.await.unwrap();
    let outcomes = collect(outcome_rx).await;
    assert_eq!(Some(outcomes[0].handle), captured.replay_handle);

    let comparison = compare_outcome(&captured, &outcomes[0]);
    assert_eq!(comparison.captured_duration, Some(Duration::from_millis(4)));
    assert_eq!(
        comparison.mismatches,
        vec![Mismatch::RowsSent {
            captured: 3,
            replayed: 2
        }]
    );
    assert!(!comparison.matches());
    assert_eq!(stats.snapshot().rows_captured, 3);
}
