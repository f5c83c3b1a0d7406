use std::sync::Arc;

use arc_swap::ArcSwap;

use nearby_domain::{WeightSet, scoring::RECOGNIZED_KEYS};

use crate::NearbyService;

/// Process-wide scoring weights. Readers take a snapshot with [`WeightStore::get`] and keep it for
/// the whole query; [`WeightStore::set`] publishes a complete replacement in one atomic swap.
pub struct WeightStore {
	current: ArcSwap<WeightSet>,
}
impl WeightStore {
	pub fn new(initial: WeightSet) -> Self {
		Self { current: ArcSwap::from_pointee(initial) }
	}

	pub fn get(&self) -> Arc<WeightSet> {
		self.current.load_full()
	}

	pub fn set(&self, weights: WeightSet) {
		self.current.store(Arc::new(weights));
	}
}

impl NearbyService {
	/// Keys are not validated; unrecognized ones are stored and never read.
	pub fn update_weights(&self, weights: WeightSet) {
		let unrecognized =
			weights.iter().filter(|(key, _)| !RECOGNIZED_KEYS.contains(key)).count();

		if unrecognized > 0 {
			tracing::debug!(unrecognized, "Weight update contains keys the scorer ignores.");
		}

		tracing::info!(weights = ?weights.as_map(), "Scoring weights updated.");

		self.weights.set(weights);
	}

	pub fn current_weights(&self) -> Arc<WeightSet> {
		self.weights.get()
	}
}
