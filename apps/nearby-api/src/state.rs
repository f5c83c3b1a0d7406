use std::sync::Arc;

use nearby_service::NearbyService;
use nearby_storage::{engine::SpatialEngine, memory::MemoryEngine};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<NearbyService>,
}
impl AppState {
	/// Starts with an empty in-memory index; cafes arrive through the CSV import endpoint.
	pub fn new(config: nearby_config::Config) -> Self {
		Self::with_engine(config, Arc::new(MemoryEngine::new()))
	}

	pub fn with_engine(config: nearby_config::Config, engine: Arc<dyn SpatialEngine>) -> Self {
		Self { service: Arc::new(NearbyService::new(config, engine)) }
	}
}
