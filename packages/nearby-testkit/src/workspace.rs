use std::{
	env, fs,
	path::{Path, PathBuf},
};

use uuid::Uuid;

use nearby_config::{Config, Frames, Ingest, Scoring, Security, Service, Streaming};
use nearby_storage::{
	cafes,
	frames::{FrameSequence, FrameStore},
};

/// Scratch directory tree holding frame sequences and CSV exports for one test. Removed on drop.
pub struct TestWorkspace {
	root: PathBuf,
	frames: FrameStore,
	csv_dir: PathBuf,
}
impl TestWorkspace {
	pub fn new() -> crate::Result<Self> {
		let root = env::temp_dir().join(format!("nearby_test_{}", Uuid::new_v4().simple()));
		let frames = FrameStore::new(root.join("frames/insert"), root.join("frames/search"));
		let csv_dir = root.join("csvs");

		for dir in
			[frames.dir(FrameSequence::Insert), frames.dir(FrameSequence::Search), csv_dir.as_path()]
		{
			fs::create_dir_all(dir)?;
		}

		Ok(Self { root, frames, csv_dir })
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn frames(&self) -> &FrameStore {
		&self.frames
	}

	pub fn csv_dir(&self) -> &Path {
		&self.csv_dir
	}

	pub fn write_frame(
		&self,
		sequence: FrameSequence,
		id: u64,
		payload: &str,
	) -> crate::Result<PathBuf> {
		let path = self.frames.frame_path(sequence, id);

		fs::write(&path, payload)?;

		Ok(path)
	}

	pub fn write_csv(&self, batch: u64, payload: &str) -> crate::Result<PathBuf> {
		let path = cafes::batch_path(&self.csv_dir, batch);

		fs::write(&path, payload)?;

		Ok(path)
	}

	/// Service configuration pointing at this workspace, with a small channel and a short poll
	/// interval so streaming edge cases show up quickly.
	pub fn config(&self) -> Config {
		Config {
			service: Service {
				http_bind: "127.0.0.1:0".to_string(),
				log_level: "info".to_string(),
			},
			security: Security { bind_localhost_only: true },
			frames: Frames {
				insert_dir: self.frames.dir(FrameSequence::Insert).to_path_buf(),
				search_dir: self.frames.dir(FrameSequence::Search).to_path_buf(),
			},
			ingest: Ingest { csv_dir: self.csv_dir.clone() },
			streaming: Streaming { channel_capacity: 2, poll_interval_ms: 20 },
			scoring: Scoring::default(),
		}
	}
}
impl Drop for TestWorkspace {
	fn drop(&mut self) {
		if let Err(err) = fs::remove_dir_all(&self.root) {
			eprintln!("Test workspace cleanup failed: {err}.");
		}
	}
}
