use std::{
	f64::consts::PI,
	sync::{
		Mutex,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	thread,
	time::Duration,
};

use nearby_domain::{
	Candidate, Point,
	geo::EARTH_RADIUS_M,
	scoring::{CURRENT_CROWD, PRICE_LEVEL, RATING},
};
use nearby_storage::{
	Error, Result,
	engine::{RangeQuery, RecordCallback, SpatialEngine},
};

/// Builds a cafe `meters` due north of `center`, so its haversine distance from the center is
/// `meters`.
pub fn candidate_north_of(id: u64, center: Point, meters: f64) -> Candidate {
	let lat = center.lat + meters / (EARTH_RADIUS_M * PI / 180.0);

	Candidate::new(id, Point::new(center.lon, lat))
		.with_attribute(RATING, 4.0)
		.with_attribute(PRICE_LEVEL, 2.0)
		.with_attribute(CURRENT_CROWD, 30.0)
}

enum Ending {
	Complete,
	Fail { after: usize, message: String },
	Panic { after: usize },
}

/// Engine double that replays a fixed list of records, ignoring the query, and records how each
/// run ended.
pub struct ScriptedEngine {
	records: Vec<Candidate>,
	ending: Ending,
	delay: Duration,
	runs_started: AtomicUsize,
	runs_finished: AtomicUsize,
	emitted: AtomicUsize,
	stopped_early: AtomicBool,
	inserted: Mutex<Vec<Candidate>>,
}
impl ScriptedEngine {
	pub fn new(records: Vec<Candidate>) -> Self {
		Self {
			records,
			ending: Ending::Complete,
			delay: Duration::ZERO,
			runs_started: AtomicUsize::new(0),
			runs_finished: AtomicUsize::new(0),
			emitted: AtomicUsize::new(0),
			stopped_early: AtomicBool::new(false),
			inserted: Mutex::new(Vec::new()),
		}
	}

	/// Emits the first `after` records, then fails the search.
	pub fn failing_after(mut self, after: usize, message: impl Into<String>) -> Self {
		self.ending = Ending::Fail { after, message: message.into() };

		self
	}

	/// Emits the first `after` records, then panics inside the search.
	pub fn panicking_after(mut self, after: usize) -> Self {
		self.ending = Ending::Panic { after };

		self
	}

	/// Sleeps before each record to imitate a slow traversal.
	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = delay;

		self
	}

	pub fn runs_started(&self) -> usize {
		self.runs_started.load(Ordering::SeqCst)
	}

	/// Runs that returned, whether they succeeded, failed, or were stopped by the callback.
	pub fn runs_finished(&self) -> usize {
		self.runs_finished.load(Ordering::SeqCst)
	}

	pub fn emitted(&self) -> usize {
		self.emitted.load(Ordering::SeqCst)
	}

	pub fn stopped_early(&self) -> bool {
		self.stopped_early.load(Ordering::SeqCst)
	}

	pub fn inserted(&self) -> Vec<Candidate> {
		self.inserted.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	fn limit(&self) -> usize {
		match &self.ending {
			Ending::Complete => self.records.len(),
			Ending::Fail { after, .. } | Ending::Panic { after } => (*after).min(self.records.len()),
		}
	}

	fn replay(&self, on_record: &mut RecordCallback<'_>) -> Result<()> {
		for candidate in self.records.iter().take(self.limit()) {
			if !self.delay.is_zero() {
				thread::sleep(self.delay);
			}

			self.emitted.fetch_add(1, Ordering::SeqCst);

			if on_record(candidate.clone()).is_break() {
				self.stopped_early.store(true, Ordering::SeqCst);

				return Ok(());
			}
		}

		match &self.ending {
			Ending::Complete => Ok(()),
			Ending::Fail { message, .. } => Err(Error::Engine(message.clone())),
			Ending::Panic { .. } => panic!("Scripted engine panic."),
		}
	}
}
impl SpatialEngine for ScriptedEngine {
	fn stream_search(&self, _query: &RangeQuery, on_record: &mut RecordCallback<'_>) -> Result<()> {
		self.runs_started.fetch_add(1, Ordering::SeqCst);

		let finished = FinishGuard(&self.runs_finished);
		let result = self.replay(on_record);

		drop(finished);

		result
	}

	fn insert(&self, batch: Vec<Candidate>) -> Result<()> {
		self.inserted.lock().unwrap_or_else(|err| err.into_inner()).extend(batch);

		Ok(())
	}
}

// Counts a run as finished even when the replay unwinds.
struct FinishGuard<'a>(&'a AtomicUsize);
impl Drop for FinishGuard<'_> {
	fn drop(&mut self) {
		self.0.fetch_add(1, Ordering::SeqCst);
	}
}
