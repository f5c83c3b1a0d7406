use std::{
	fmt,
	io::ErrorKind,
	path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

/// The two independently numbered trace sequences produced by the R-tree visualizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameSequence {
	Insert,
	Search,
}
impl FrameSequence {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Insert => "insert",
			Self::Search => "search",
		}
	}

	pub fn not_found_message(self) -> &'static str {
		match self {
			Self::Insert => "Frame not found",
			Self::Search => "Search path not found",
		}
	}
}
impl fmt::Display for FrameSequence {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
	pub sequence: FrameSequence,
	pub id: u64,
	pub data: Value,
}

/// One file of a frame sequence, as listed to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FrameEntry {
	pub id: u64,
	pub filename: String,
}

/// Read-only view over trace frames written by an external generator as
/// `<dir>/frame_{id}.json`.
#[derive(Clone, Debug)]
pub struct FrameStore {
	insert_dir: PathBuf,
	search_dir: PathBuf,
}
impl FrameStore {
	pub fn new(insert_dir: impl Into<PathBuf>, search_dir: impl Into<PathBuf>) -> Self {
		Self { insert_dir: insert_dir.into(), search_dir: search_dir.into() }
	}

	pub fn from_config(cfg: &nearby_config::Frames) -> Self {
		Self::new(cfg.insert_dir.clone(), cfg.search_dir.clone())
	}

	pub fn dir(&self, sequence: FrameSequence) -> &Path {
		match sequence {
			FrameSequence::Insert => &self.insert_dir,
			FrameSequence::Search => &self.search_dir,
		}
	}

	pub fn frame_path(&self, sequence: FrameSequence, id: u64) -> PathBuf {
		self.dir(sequence).join(format!("frame_{id}.json"))
	}

	pub async fn get_insert_frame(&self, id: u64) -> Result<Frame> {
		self.get(FrameSequence::Insert, id).await
	}

	pub async fn get_search_frame(&self, id: u64) -> Result<Frame> {
		self.get(FrameSequence::Search, id).await
	}

	/// Clients walk ids upward until they miss, so a missing file is an ordinary `NotFound`.
	pub async fn get(&self, sequence: FrameSequence, id: u64) -> Result<Frame> {
		let path = self.frame_path(sequence, id);
		let raw = match tokio::fs::read(&path).await {
			Ok(raw) => raw,
			Err(err) if err.kind() == ErrorKind::NotFound =>
				return Err(Error::NotFound(sequence.not_found_message().to_string())),
			Err(err) => return Err(Error::Io { path, source: err }),
		};
		let data =
			serde_json::from_slice(&raw).map_err(|err| Error::Json { path: path.clone(), source: err })?;

		Ok(Frame { sequence, id, data })
	}

	/// Every `frame_{id}.json` of `sequence`, ordered by id. A missing directory is an empty
	/// sequence; other files are ignored.
	pub async fn list(&self, sequence: FrameSequence) -> Result<Vec<FrameEntry>> {
		let dir = self.dir(sequence);
		let io_error = |err| Error::Io { path: dir.to_path_buf(), source: err };
		let mut entries = match tokio::fs::read_dir(dir).await {
			Ok(entries) => entries,
			Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
			Err(err) => return Err(io_error(err)),
		};
		let mut frames = Vec::new();

		while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
			let Ok(filename) = entry.file_name().into_string() else {
				continue;
			};

			if let Some(id) = parse_frame_id(&filename) {
				frames.push(FrameEntry { id, filename });
			}
		}

		frames.sort_unstable_by_key(|frame| frame.id);

		Ok(frames)
	}

	pub async fn count(&self, sequence: FrameSequence) -> Result<usize> {
		Ok(self.list(sequence).await?.len())
	}
}

fn parse_frame_id(filename: &str) -> Option<u64> {
	filename.strip_prefix("frame_")?.strip_suffix(".json")?.parse().ok()
}
