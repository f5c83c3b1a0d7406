use serde_json::Value;

use nearby_storage::frames::{FrameEntry, FrameSequence};

use crate::{NearbyService, Result};

impl NearbyService {
	pub async fn insert_frame(&self, id: u64) -> Result<Value> {
		self.frame(FrameSequence::Insert, id).await
	}

	pub async fn search_frame(&self, id: u64) -> Result<Value> {
		self.frame(FrameSequence::Search, id).await
	}

	pub async fn list_frames(&self, sequence: FrameSequence) -> Result<Vec<FrameEntry>> {
		self.frames.list(sequence).await.map_err(|err| {
			tracing::error!(%sequence, error = %err, "Failed to list frames.");

			err.into()
		})
	}

	pub async fn frame_count(&self, sequence: FrameSequence) -> Result<usize> {
		Ok(self.list_frames(sequence).await?.len())
	}

	async fn frame(&self, sequence: FrameSequence, id: u64) -> Result<Value> {
		match self.frames.get(sequence, id).await {
			Ok(frame) => Ok(frame.data),
			Err(nearby_storage::Error::NotFound(message)) => {
				tracing::trace!(%sequence, id, "Frame lookup missed.");

				Err(crate::Error::NotFound { message })
			},
			Err(err) => {
				tracing::error!(%sequence, id, error = %err, "Failed to load frame.");

				Err(err.into())
			},
		}
	}
}
