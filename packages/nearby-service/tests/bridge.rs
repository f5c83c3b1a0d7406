use std::{sync::Arc, time::Duration};

use serde_json::Value;
use tokio::{sync::mpsc, time};

use nearby_domain::{Candidate, Point, ScoredResult, WeightSet};
use nearby_service::{
	BridgeState, BridgeSummary, Error, LineStream, ResultRecord, StreamEvent, StreamingQuery,
	StreamingQueryBridge, WorkerOutcome, pump_lines, spawn_line_pump,
};
use nearby_storage::engine::{RangeQuery, SpatialEngine};
use nearby_testkit::ScriptedEngine;

fn cafes(count: u64) -> Vec<Candidate> {
	(1..=count).map(|id| Candidate::new(id, Point::new(121.5, 25.0))).collect()
}

fn any_query() -> RangeQuery {
	RangeQuery {
		center: Point::new(121.5, 25.0),
		radius: 1_000.0,
		min_score: 0.0,
		weights: Arc::new(WeightSet::default()),
	}
}

fn admit_all(candidate: Candidate) -> Option<ScoredResult> {
	Some(ScoredResult { candidate, score: 1.0, distance: 0.0 })
}

fn reject_all(_: Candidate) -> Option<ScoredResult> {
	None
}

fn start(engine: &Arc<ScriptedEngine>, capacity: usize, poll: Duration) -> StreamingQuery {
	start_with(engine, capacity, poll, admit_all)
}

fn start_with<F>(
	engine: &Arc<ScriptedEngine>,
	capacity: usize,
	poll: Duration,
	admit: F,
) -> StreamingQuery
where
	F: FnMut(Candidate) -> Option<ScoredResult> + Send + 'static,
{
	let engine: Arc<dyn SpatialEngine> = engine.clone();

	StreamingQueryBridge::new(capacity, poll).start(engine, any_query(), admit)
}

async fn wait_for(mut done: impl FnMut() -> bool) {
	for _ in 0..300 {
		if done() {
			return;
		}

		time::sleep(Duration::from_millis(10)).await;
	}

	panic!("Condition not reached in time.");
}

async fn collect_lines(query: StreamingQuery) -> (Vec<Value>, BridgeSummary) {
	let (tx, mut rx) = mpsc::channel(1);
	let pump = tokio::spawn(pump_lines(query, tx));
	let mut lines = Vec::new();

	while let Some(line) = rx.recv().await {
		assert!(line.ends_with('\n'), "Line must be newline terminated: {line:?}");
		assert_eq!(line.matches('\n').count(), 1, "Line must hold one record: {line:?}");

		lines.push(serde_json::from_str(line.trim_end()).expect("Line must be valid JSON."));
	}

	let summary = pump.await.expect("Pump task must not panic.");

	(lines, summary)
}

fn ids(lines: &[Value]) -> Vec<u64> {
	lines.iter().map(|line| line["id"].as_u64().expect("Record must carry an id.")).collect()
}

#[tokio::test]
async fn streams_every_record_in_discovery_order() {
	let engine = Arc::new(ScriptedEngine::new(cafes(7)));
	let (lines, summary) = collect_lines(start(&engine, 2, Duration::from_millis(50))).await;

	assert_eq!(ids(&lines), vec![1, 2, 3, 4, 5, 6, 7]);
	assert_eq!(summary.delivered, 7);
	assert_eq!(summary.outcome, WorkerOutcome::Completed);
	assert_eq!(engine.runs_finished(), 1);

	let record: ResultRecord =
		serde_json::from_value(lines[0].clone()).expect("Line must match the record shape.");

	assert_eq!(record.name, "Cafe 1");
	assert_eq!(record.score, 1.0);
}

#[tokio::test]
async fn empty_search_ends_cleanly() {
	let engine = Arc::new(ScriptedEngine::new(Vec::new()));
	let (lines, summary) = collect_lines(start(&engine, 2, Duration::from_millis(50))).await;

	assert!(lines.is_empty());
	assert_eq!(summary.delivered, 0);
	assert_eq!(summary.outcome, WorkerOutcome::Completed);
	assert_eq!(engine.runs_finished(), 1);
}

#[tokio::test]
async fn engine_failure_ends_with_one_error_line() {
	let engine = Arc::new(ScriptedEngine::new(cafes(5)).failing_after(3, "node split exploded"));
	let (lines, summary) = collect_lines(start(&engine, 1, Duration::from_millis(50))).await;

	assert_eq!(lines.len(), 4);
	assert_eq!(ids(&lines[..3]), vec![1, 2, 3]);
	assert!(
		lines[3]["error"].as_str().is_some_and(|error| error.contains("node split exploded")),
		"Unexpected error line: {}",
		lines[3]
	);
	assert_eq!(summary.outcome, WorkerOutcome::Failed);
	// The pump only returns after joining the worker.
	assert_eq!(engine.runs_finished(), 1);
}

#[tokio::test]
async fn lost_worker_is_reported_as_failure() {
	let engine = Arc::new(ScriptedEngine::new(cafes(3)).panicking_after(1));
	let (lines, summary) = collect_lines(start(&engine, 4, Duration::from_millis(50))).await;

	assert_eq!(lines.len(), 2);
	assert_eq!(lines[0]["id"], 1);
	assert!(lines[1]["error"].is_string());
	assert_eq!(summary.outcome, WorkerOutcome::Panicked);
	assert_eq!(engine.runs_finished(), 1);
}

#[tokio::test]
async fn disconnected_consumer_cancels_the_worker() {
	let engine = Arc::new(ScriptedEngine::new(cafes(500)));
	let query = start(&engine, 1, Duration::from_millis(50));
	let (tx, mut rx) = mpsc::channel(1);
	let pump = tokio::spawn(pump_lines(query, tx));
	let first = rx.recv().await.expect("Expected a first line.");

	assert!(first.contains("\"id\":1"));

	drop(rx);

	let summary = pump.await.expect("Pump task must not panic.");

	assert_eq!(summary.outcome, WorkerOutcome::Cancelled);
	assert!(engine.stopped_early());
	assert!(engine.emitted() < 500, "Worker kept producing: {}", engine.emitted());
	assert_eq!(engine.runs_finished(), 1);
}

#[tokio::test]
async fn slow_worker_outlasts_the_poll_interval() {
	let engine =
		Arc::new(ScriptedEngine::new(cafes(3)).with_delay(Duration::from_millis(40)));
	let (lines, summary) = collect_lines(start(&engine, 2, Duration::from_millis(5))).await;

	assert_eq!(ids(&lines), vec![1, 2, 3]);
	assert_eq!(summary.outcome, WorkerOutcome::Completed);
}

#[tokio::test]
async fn full_channel_blocks_the_worker() {
	let engine = Arc::new(ScriptedEngine::new(cafes(50)));
	let mut query = start(&engine, 1, Duration::from_millis(50));
	let first = query.next_event().await;

	assert!(matches!(first, Some(StreamEvent::Result(ref result)) if result.candidate.id == 1));

	time::sleep(Duration::from_millis(100)).await;

	// One record consumed, one buffered, one held by the blocked sender.
	assert!(engine.emitted() <= 3, "Worker ran ahead: {}", engine.emitted());

	let mut received = vec![1];

	while let Some(event) = query.next_event().await {
		match event {
			StreamEvent::Result(result) => received.push(result.candidate.id),
			StreamEvent::Failed(message) => panic!("Unexpected failure: {message}"),
		}
	}

	assert_eq!(received, (1..=50).collect::<Vec<_>>());
	assert_eq!(query.state(), BridgeState::Draining);

	let summary = query.close().await;

	assert_eq!(summary.delivered, 50);
	assert_eq!(summary.outcome, WorkerOutcome::Completed);
}

#[tokio::test]
async fn failure_before_any_record_is_surfaced_by_await_first() {
	let engine = Arc::new(ScriptedEngine::new(cafes(2)).failing_after(0, "index offline"));
	let mut query = start(&engine, 2, Duration::from_millis(50));
	let err = query.await_first().await.expect_err("Expected an early failure.");

	assert!(matches!(err, Error::Engine { .. }), "Unexpected error: {err:?}");
	assert!(err.message().contains("index offline"), "Unexpected message: {err}");
	assert_eq!(query.state(), BridgeState::Failed);
	assert!(query.next_event().await.is_none());

	let summary = query.close().await;

	assert_eq!(summary.outcome, WorkerOutcome::Failed);
	assert_eq!(summary.delivered, 0);
}

#[tokio::test]
async fn await_first_keeps_the_first_record() {
	let engine = Arc::new(ScriptedEngine::new(cafes(2)));
	let mut query = start(&engine, 2, Duration::from_millis(50));

	query.await_first().await.expect("Expected a record first.");
	query.await_first().await.expect("Waiting twice must be harmless.");

	let (lines, summary) = collect_lines(query).await;

	assert_eq!(ids(&lines), vec![1, 2]);
	assert_eq!(summary.delivered, 2);
}

#[tokio::test]
async fn disconnect_while_records_are_rejected_cancels_the_worker() {
	let engine =
		Arc::new(ScriptedEngine::new(cafes(200)).with_delay(Duration::from_millis(2)));
	let query = start_with(&engine, 1, Duration::from_millis(50), |candidate| {
		(candidate.id == 1).then(|| ScoredResult { candidate, score: 1.0, distance: 0.0 })
	});
	let (tx, mut rx) = mpsc::channel(1);
	let pump = tokio::spawn(pump_lines(query, tx));
	let first = rx.recv().await.expect("Expected a first line.");

	assert!(first.contains("\"id\":1"));

	drop(rx);

	let summary = time::timeout(Duration::from_secs(2), pump)
		.await
		.expect("Pump must notice the closed sink.")
		.expect("Pump task must not panic.");

	assert_eq!(summary.outcome, WorkerOutcome::Cancelled);
	assert_eq!(engine.runs_finished(), 1);
	assert!(engine.stopped_early());
	assert!(engine.emitted() < 200, "Worker kept searching: {}", engine.emitted());
}

#[tokio::test]
async fn leaving_before_the_first_record_cancels_the_worker() {
	let engine = Arc::new(ScriptedEngine::new(cafes(5)).with_delay(Duration::from_millis(40)));
	let query = start_with(&engine, 1, Duration::from_millis(50), reject_all);
	let LineStream { first, lines, pump } = spawn_line_pump(query, 1);

	time::sleep(Duration::from_millis(60)).await;
	drop(first);
	drop(lines);

	let summary = time::timeout(Duration::from_secs(2), pump)
		.await
		.expect("Pump must notice the departed consumer.")
		.expect("Pump task must not panic.");

	assert_eq!(summary.outcome, WorkerOutcome::Cancelled);
	assert_eq!(summary.delivered, 0);
	assert_eq!(engine.runs_finished(), 1);
	assert!(engine.stopped_early());
	assert!(engine.emitted() < 5, "Worker kept searching: {}", engine.emitted());
}

#[tokio::test]
async fn line_pump_reports_early_failure_after_joining() {
	let engine = Arc::new(ScriptedEngine::new(cafes(2)).failing_after(0, "index offline"));
	let LineStream { first, mut lines, pump } =
		spawn_line_pump(start(&engine, 2, Duration::from_millis(50)), 2);
	let err = first
		.await
		.expect("Pump must report the first event.")
		.expect_err("Expected an early failure.");

	assert!(matches!(err, Error::Engine { .. }), "Unexpected error: {err:?}");
	assert_eq!(engine.runs_finished(), 1);
	assert!(lines.recv().await.is_none());
	assert_eq!(pump.await.expect("Pump task must not panic.").outcome, WorkerOutcome::Failed);
}

#[tokio::test]
async fn line_pump_streams_after_a_successful_first_event() {
	let engine = Arc::new(ScriptedEngine::new(cafes(3)));
	let LineStream { first, mut lines, pump } =
		spawn_line_pump(start(&engine, 1, Duration::from_millis(50)), 1);

	first.await.expect("Pump must report the first event.").expect("Expected a record first.");

	let mut received = Vec::new();

	while let Some(line) = lines.recv().await {
		received.push(line);
	}

	assert_eq!(received.len(), 3);
	assert_eq!(pump.await.expect("Pump task must not panic.").delivered, 3);
}

#[tokio::test]
async fn dropped_query_is_reaped() {
	let engine = Arc::new(ScriptedEngine::new(cafes(5)).with_delay(Duration::from_millis(40)));
	let query = start_with(&engine, 1, Duration::from_millis(50), reject_all);

	drop(query);

	wait_for(|| engine.runs_finished() == 1).await;

	assert!(engine.stopped_early());
	assert!(engine.emitted() < 5, "Worker kept searching: {}", engine.emitted());
}
