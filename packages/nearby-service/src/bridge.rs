//! Bridge between a blocking, callback-driven range search and an async response writer.
//!
//! A query runs on a dedicated blocking worker. Every accepted record crosses a bounded channel to
//! the consumer, so a fast engine waits on a slow client instead of buffering without limit. The
//! worker ends its run with exactly one sentinel, `Done` or `Failed`, sent on the same channel
//! after its last record. The consumer never observes completion out of order with the data.
//!
//! ```text
//! start() ──► Running ──Done──► Draining ──close()──► Closed
//!                │
//!                └──Failed / worker lost──► Failed ──close()──► Closed
//! ```
//!
//! [`StreamingQuery::close`] joins the worker on every path. Dropping the receiver makes the
//! worker stop at its next discovered record, admitted or not, which is how an abandoned response
//! cancels its search. A query dropped without `close` hands its worker to a reaper task.

use std::{
	ops::ControlFlow,
	sync::Arc,
	time::{Duration, Instant},
};

use serde::Serialize;
use tokio::{
	runtime::Handle,
	sync::{mpsc, oneshot},
	task::{self, JoinHandle},
	time,
};
use uuid::Uuid;

use nearby_domain::{Candidate, ScoredResult};
use nearby_storage::engine::{RangeQuery, SpatialEngine};

use crate::{Error, Result, search::ResultRecord};

const WORKER_LOST_MESSAGE: &str = "Search worker stopped without reporting completion.";

enum Handoff {
	Hit(ScoredResult),
	Done,
	Failed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
	Result(ScoredResult),
	/// Terminal. No event follows it.
	Failed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeState {
	Running,
	/// The worker reported normal completion and every buffered record has been handed out.
	Draining,
	Failed,
	Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerOutcome {
	Completed,
	Failed,
	/// The consumer went away and the worker stopped the engine early.
	Cancelled,
	Panicked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BridgeSummary {
	pub query_id: Uuid,
	pub delivered: u64,
	pub outcome: WorkerOutcome,
}

#[derive(Clone, Copy, Debug)]
pub struct StreamingQueryBridge {
	capacity: usize,
	poll_interval: Duration,
}
impl StreamingQueryBridge {
	pub fn new(capacity: usize, poll_interval: Duration) -> Self {
		Self { capacity: capacity.max(1), poll_interval: poll_interval.max(Duration::from_millis(1)) }
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Starts `query` on a blocking worker. `admit` runs on the worker for every discovered record
	/// and decides whether, and as what, it is handed to the consumer.
	///
	/// Must be called from within a Tokio runtime.
	pub fn start<F>(
		&self,
		engine: Arc<dyn SpatialEngine>,
		query: RangeQuery,
		admit: F,
	) -> StreamingQuery
	where
		F: FnMut(Candidate) -> Option<ScoredResult> + Send + 'static,
	{
		let query_id = Uuid::new_v4();
		let (tx, rx) = mpsc::channel(self.capacity);
		let worker = task::spawn_blocking(move || run_worker(engine.as_ref(), &query, admit, tx));

		tracing::debug!(%query_id, capacity = self.capacity, "Streaming query started.");

		StreamingQuery {
			query_id,
			rx: Some(rx),
			worker: Some(worker),
			pending: None,
			poll_interval: self.poll_interval,
			state: BridgeState::Running,
			delivered: 0,
			started_at: Instant::now(),
		}
	}
}

/// Consumer side of one running query.
pub struct StreamingQuery {
	query_id: Uuid,
	rx: Option<mpsc::Receiver<Handoff>>,
	worker: Option<JoinHandle<WorkerOutcome>>,
	pending: Option<StreamEvent>,
	poll_interval: Duration,
	state: BridgeState,
	delivered: u64,
	started_at: Instant,
}
impl StreamingQuery {
	pub fn query_id(&self) -> Uuid {
		self.query_id
	}

	pub fn state(&self) -> BridgeState {
		self.state
	}

	pub fn delivered(&self) -> u64 {
		self.delivered
	}

	/// Waits for the first event and keeps it for [`StreamingQuery::next_event`]. A failure
	/// before any record is returned as [`Error::Engine`] and consumed, so the caller can still
	/// answer with a plain error response.
	pub async fn await_first(&mut self) -> Result<()> {
		if self.pending.is_some() {
			return Ok(());
		}

		match self.recv().await {
			Some(StreamEvent::Failed(message)) => Err(Error::Engine { message }),
			event => {
				self.pending = event;

				Ok(())
			},
		}
	}

	/// Next record in discovery order, a single terminal failure, or `None` once the run is over.
	pub async fn next_event(&mut self) -> Option<StreamEvent> {
		if let Some(event) = self.pending.take() {
			return Some(event);
		}

		self.recv().await
	}

	/// Stops receiving and joins the worker.
	pub async fn close(mut self) -> BridgeSummary {
		self.rx.take();
		self.pending.take();

		let outcome = match self.worker.take() {
			Some(worker) => match worker.await {
				Ok(outcome) => outcome,
				Err(err) => {
					tracing::error!(query_id = %self.query_id, error = %err, "Search worker panicked.");

					WorkerOutcome::Panicked
				},
			},
			None => WorkerOutcome::Completed,
		};

		self.state = BridgeState::Closed;

		BridgeSummary { query_id: self.query_id, delivered: self.delivered, outcome }
	}

	async fn recv(&mut self) -> Option<StreamEvent> {
		if self.state != BridgeState::Running {
			return None;
		}

		let rx = self.rx.as_mut()?;

		loop {
			match time::timeout(self.poll_interval, rx.recv()).await {
				Ok(Some(Handoff::Hit(result))) => {
					self.delivered += 1;

					if self.delivered == 1 {
						tracing::info!(
							query_id = %self.query_id,
							elapsed_ms = self.started_at.elapsed().as_millis() as u64,
							"First streamed result ready."
						);
					}

					return Some(StreamEvent::Result(result));
				},
				Ok(Some(Handoff::Done)) => {
					self.state = BridgeState::Draining;

					return None;
				},
				Ok(Some(Handoff::Failed(message))) => {
					self.state = BridgeState::Failed;

					return Some(StreamEvent::Failed(message));
				},
				Ok(None) => {
					self.state = BridgeState::Failed;

					return Some(StreamEvent::Failed(WORKER_LOST_MESSAGE.to_string()));
				},
				Err(_) => {
					let worker_finished =
						self.worker.as_ref().map(JoinHandle::is_finished).unwrap_or(true);

					tracing::debug!(
						query_id = %self.query_id,
						waited_ms = self.started_at.elapsed().as_millis() as u64,
						delivered = self.delivered,
						worker_finished,
						"Still waiting on search worker."
					);
				},
			}
		}
	}
}
impl Drop for StreamingQuery {
	fn drop(&mut self) {
		let Some(worker) = self.worker.take() else {
			return;
		};
		let query_id = self.query_id;

		self.rx.take();

		match Handle::try_current() {
			Ok(runtime) => {
				tracing::debug!(%query_id, "Streaming query dropped without close; reaping worker.");

				runtime.spawn(async move {
					match worker.await {
						Ok(outcome) => tracing::debug!(%query_id, ?outcome, "Reaped search worker."),
						Err(err) => {
							tracing::error!(%query_id, error = %err, "Search worker panicked.")
						},
					}
				});
			},
			Err(_) => tracing::warn!(
				%query_id,
				"Streaming query dropped outside a runtime; its worker is detached."
			),
		}
	}
}

/// Handles to a query whose lines are produced by a background pump task.
pub struct LineStream {
	/// Resolves once the first event is known: `Ok` when lines will follow, the engine error
	/// when the search failed before any record. The worker is already joined on `Err`.
	pub first: oneshot::Receiver<Result<()>>,
	pub lines: mpsc::Receiver<String>,
	pub pump: JoinHandle<BridgeSummary>,
}

/// Moves `query` into a pump task that owns it for the rest of its life. Dropping any part of
/// the returned [`LineStream`] cancels the search and the task still joins the worker.
pub fn spawn_line_pump(query: StreamingQuery, capacity: usize) -> LineStream {
	let (first_tx, first) = oneshot::channel();
	let (sink, lines) = mpsc::channel(capacity.max(1));
	let pump = tokio::spawn(pump_after_first(query, first_tx, sink));

	LineStream { first, lines, pump }
}

async fn pump_after_first(
	mut query: StreamingQuery,
	mut first_tx: oneshot::Sender<Result<()>>,
	sink: mpsc::Sender<String>,
) -> BridgeSummary {
	let query_id = query.query_id();
	let first = tokio::select! {
		first = query.await_first() => first,
		() = first_tx.closed() => {
			tracing::info!(%query_id, "Client left before the first result; cancelling search.");

			return query.close().await;
		},
	};

	match first {
		Ok(()) => {
			if first_tx.send(Ok(())).is_err() {
				return query.close().await;
			}

			pump_lines(query, sink).await
		},
		Err(err) => {
			let summary = query.close().await;

			tracing::warn!(%query_id, error = %err, "Streaming search failed before the first result.");

			let _ = first_tx.send(Err(err));

			summary
		},
	}
}

/// Writes every event of `query` to `sink` as one JSON line: records as [`ResultRecord`], a
/// failure as `{"error": ...}`. Stops early when the sink is closed. Always joins the worker
/// before returning, so a sink that reaches end of stream implies the worker is gone.
pub async fn pump_lines(mut query: StreamingQuery, sink: mpsc::Sender<String>) -> BridgeSummary {
	let query_id = query.query_id();

	loop {
		let event = tokio::select! {
			event = query.next_event() => event,
			() = sink.closed() => {
				tracing::info!(%query_id, "Client disconnected; cancelling search.");

				break;
			},
		};
		let Some(event) = event else {
			break;
		};
		let (line, terminal) = match event {
			StreamEvent::Result(result) => (encode_line(&ResultRecord::from(&result)), false),
			StreamEvent::Failed(message) => {
				tracing::warn!(%query_id, error = %message, "Streaming search failed.");

				(encode_line(&ErrorLine { error: &message }), true)
			},
		};

		if sink.send(line).await.is_err() {
			tracing::info!(%query_id, "Client disconnected; cancelling search.");

			break;
		}
		if terminal {
			break;
		}
	}

	let summary = query.close().await;

	tracing::info!(
		%query_id,
		delivered = summary.delivered,
		outcome = ?summary.outcome,
		"Streaming query closed."
	);

	summary
}

#[derive(Serialize)]
struct ErrorLine<'a> {
	error: &'a str,
}

fn encode_line<T>(value: &T) -> String
where
	T: Serialize,
{
	match serde_json::to_string(value) {
		Ok(mut line) => {
			line.push('\n');

			line
		},
		Err(err) => {
			let fallback = serde_json::json!({ "error": format!("Failed to encode result: {err}") });

			format!("{fallback}\n")
		},
	}
}

fn run_worker<F>(
	engine: &dyn SpatialEngine,
	query: &RangeQuery,
	mut admit: F,
	tx: mpsc::Sender<Handoff>,
) -> WorkerOutcome
where
	F: FnMut(Candidate) -> Option<ScoredResult>,
{
	let mut consumer_gone = false;
	let result = engine.stream_search(query, &mut |candidate| {
		if tx.is_closed() {
			consumer_gone = true;

			return ControlFlow::Break(());
		}

		let Some(result) = admit(candidate) else {
			return ControlFlow::Continue(());
		};

		if tx.blocking_send(Handoff::Hit(result)).is_err() {
			consumer_gone = true;

			return ControlFlow::Break(());
		}

		ControlFlow::Continue(())
	});

	if consumer_gone {
		return WorkerOutcome::Cancelled;
	}

	match result {
		Ok(()) => {
			let _ = tx.blocking_send(Handoff::Done);

			WorkerOutcome::Completed
		},
		Err(err) => {
			let _ = tx.blocking_send(Handoff::Failed(err.to_string()));

			WorkerOutcome::Failed
		},
	}
}
