use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Engine failure: {0}")]
	Engine(String),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Failed to read {path:?}: {source}")]
	Io { path: PathBuf, source: std::io::Error },
	#[error("Failed to decode {path:?}: {source}")]
	Json { path: PathBuf, source: serde_json::Error },
	#[error("Failed to parse CSV {path:?}: {source}")]
	Csv { path: PathBuf, source: csv::Error },
}
