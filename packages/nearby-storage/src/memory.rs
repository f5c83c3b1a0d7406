use std::{
	collections::HashMap,
	sync::{Arc, RwLock},
};

use nearby_domain::{Candidate, geo::BoundingBox};

use crate::{
	Error, Result,
	engine::{RangeQuery, RecordCallback, SpatialEngine},
};

/// In-process engine that answers range queries with a bounding-box prefilter followed by an
/// exact great-circle check.
///
/// Searches iterate over a shared snapshot, so a slow consumer never holds a lock. Inserts copy
/// the record list on write and publish the new snapshot atomically.
#[derive(Default)]
pub struct MemoryEngine {
	records: RwLock<Arc<Snapshot>>,
}

#[derive(Clone, Default)]
struct Snapshot {
	candidates: Vec<Candidate>,
	positions: HashMap<u64, usize>,
}

impl MemoryEngine {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.snapshot().candidates.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn snapshot(&self) -> Arc<Snapshot> {
		self.records.read().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl SpatialEngine for MemoryEngine {
	fn stream_search(&self, query: &RangeQuery, on_record: &mut RecordCallback<'_>) -> Result<()> {
		if !query.center.is_valid() {
			return Err(Error::InvalidArgument(format!(
				"Query center ({}, {}) is outside the valid coordinate range.",
				query.center.lon, query.center.lat
			)));
		}
		if !query.radius.is_finite() || query.radius < 0.0 {
			return Err(Error::InvalidArgument(format!(
				"Query radius {} must be a finite non-negative number.",
				query.radius
			)));
		}

		let snapshot = self.snapshot();
		let bbox = BoundingBox::around(query.center, query.radius);

		for candidate in &snapshot.candidates {
			if !bbox.contains(&candidate.location) {
				continue;
			}
			if query.center.distance_to(&candidate.location) > query.radius {
				continue;
			}
			if on_record(candidate.clone()).is_break() {
				break;
			}
		}

		Ok(())
	}

	fn insert(&self, batch: Vec<Candidate>) -> Result<()> {
		if let Some(invalid) = batch.iter().find(|candidate| !candidate.location.is_valid()) {
			return Err(Error::InvalidArgument(format!(
				"Record {} has an invalid location ({}, {}).",
				invalid.id, invalid.location.lon, invalid.location.lat
			)));
		}

		let inserted = batch.len();
		let mut guard = self.records.write().unwrap_or_else(|err| err.into_inner());
		let snapshot = Arc::make_mut(&mut *guard);

		for candidate in batch {
			match snapshot.positions.get(&candidate.id) {
				Some(&position) => snapshot.candidates[position] = candidate,
				None => {
					snapshot.positions.insert(candidate.id, snapshot.candidates.len());
					snapshot.candidates.push(candidate);
				},
			}
		}

		tracing::debug!(inserted, total = snapshot.candidates.len(), "Inserted records.");

		Ok(())
	}
}
