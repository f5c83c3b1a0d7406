use std::{ops::ControlFlow, sync::Arc};

use nearby_domain::{Candidate, Point, WeightSet};

use crate::Result;

/// Per-record callback handed to [`SpatialEngine::stream_search`]. Returning
/// [`ControlFlow::Break`] asks the engine to stop searching.
pub type RecordCallback<'a> = dyn FnMut(Candidate) -> ControlFlow<()> + 'a;

/// Parameters of one range search. `min_score` and `weights` are hints an engine may use to prune
/// its traversal; callers still score and filter every record they receive.
#[derive(Clone, Debug)]
pub struct RangeQuery {
	pub center: Point,
	pub radius: f64,
	pub min_score: f64,
	pub weights: Arc<WeightSet>,
}

/// Capability interface of the spatial index. Calls block the current thread, so async callers
/// must run them on a blocking worker.
///
/// Implementations must be safe for concurrent searches. Inserts racing with a search are
/// serialized by the engine itself.
pub trait SpatialEngine
where
	Self: Send + Sync,
{
	/// Invokes `on_record` once per matching record, in discovery order, and returns only after
	/// the last invocation.
	fn stream_search(&self, query: &RangeQuery, on_record: &mut RecordCallback<'_>) -> Result<()>;

	fn insert(&self, batch: Vec<Candidate>) -> Result<()>;

	fn search(&self, query: &RangeQuery) -> Result<Vec<Candidate>> {
		let mut found = Vec::new();

		self.stream_search(query, &mut |candidate| {
			found.push(candidate);

			ControlFlow::Continue(())
		})?;

		Ok(found)
	}
}
