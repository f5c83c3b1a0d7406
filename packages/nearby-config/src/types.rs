use std::{collections::BTreeMap, path::PathBuf};

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	#[serde(default)]
	pub security: Security,
	pub frames: Frames,
	pub ingest: Ingest,
	#[serde(default)]
	pub streaming: Streaming,
	#[serde(default)]
	pub scoring: Scoring,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Security {
	pub bind_localhost_only: bool,
}
impl Default for Security {
	fn default() -> Self {
		Self { bind_localhost_only: true }
	}
}

/// Directories holding externally generated R-tree trace frames, one `frame_{id}.json` per
/// step.
#[derive(Clone, Debug, Deserialize)]
pub struct Frames {
	pub insert_dir: PathBuf,
	pub search_dir: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Ingest {
	/// Directory containing `cafes_{n}.csv` batches.
	pub csv_dir: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Streaming {
	/// Bound of the handoff channel between the search worker and the response writer.
	pub channel_capacity: usize,
	/// Upper bound on a single wait for the next streamed result.
	pub poll_interval_ms: u64,
}
impl Default for Streaming {
	fn default() -> Self {
		Self { channel_capacity: 64, poll_interval_ms: 1_000 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Scoring {
	pub default_min_score: f64,
	pub default_weights: BTreeMap<String, f64>,
}
impl Default for Scoring {
	fn default() -> Self {
		Self {
			default_min_score: 0.0,
			default_weights: BTreeMap::from([
				("rating".to_string(), 0.3),
				("price_level".to_string(), 0.2),
				("current_crowd".to_string(), 0.8),
				("distance".to_string(), 1.2),
			]),
		}
	}
}

fn default_log_level() -> String {
	"info".to_string()
}
