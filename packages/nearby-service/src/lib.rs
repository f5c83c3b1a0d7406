pub mod bridge;
pub mod frames;
pub mod ingest;
pub mod search;
pub mod weights;

mod error;

pub use bridge::{
	BridgeState, BridgeSummary, LineStream, StreamEvent, StreamingQuery, StreamingQueryBridge,
	WorkerOutcome, pump_lines, spawn_line_pump,
};
pub use error::{Error, Result};
pub use ingest::InsertReport;
pub use search::{QueryRequest, ResultRecord};
pub use weights::WeightStore;

use std::{sync::Arc, time::Duration};

use nearby_config::Config;
use nearby_domain::WeightSet;
use nearby_storage::{engine::SpatialEngine, frames::FrameStore};

/// Query gateway over one spatial engine. Cheap to share behind an `Arc`; the weight store is
/// the only state mutated after construction.
pub struct NearbyService {
	pub cfg: Config,
	pub engine: Arc<dyn SpatialEngine>,
	pub frames: FrameStore,
	pub weights: WeightStore,
	pub bridge: StreamingQueryBridge,
}
impl NearbyService {
	pub fn new(cfg: Config, engine: Arc<dyn SpatialEngine>) -> Self {
		let frames = FrameStore::from_config(&cfg.frames);
		let weights = WeightStore::new(WeightSet::new(cfg.scoring.default_weights.clone()));
		let bridge = StreamingQueryBridge::new(
			cfg.streaming.channel_capacity,
			Duration::from_millis(cfg.streaming.poll_interval_ms),
		);

		Self { cfg, engine, frames, weights, bridge }
	}
}
