mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, Frames, Ingest, Scoring, Security, Service, Streaming};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}

	for (label, dir) in [
		("frames.insert_dir", &cfg.frames.insert_dir),
		("frames.search_dir", &cfg.frames.search_dir),
		("ingest.csv_dir", &cfg.ingest.csv_dir),
	] {
		if dir.as_os_str().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.frames.insert_dir == cfg.frames.search_dir {
		return Err(Error::Validation {
			message: "frames.insert_dir and frames.search_dir must be different directories."
				.to_string(),
		});
	}
	if cfg.streaming.channel_capacity == 0 {
		return Err(Error::Validation {
			message: "streaming.channel_capacity must be greater than zero.".to_string(),
		});
	}
	if cfg.streaming.poll_interval_ms == 0 {
		return Err(Error::Validation {
			message: "streaming.poll_interval_ms must be greater than zero.".to_string(),
		});
	}
	if !cfg.scoring.default_min_score.is_finite() {
		return Err(Error::Validation {
			message: "scoring.default_min_score must be a finite number.".to_string(),
		});
	}

	for (key, weight) in &cfg.scoring.default_weights {
		if !weight.is_finite() {
			return Err(Error::Validation {
				message: format!("scoring.default_weights.{key} must be a finite number."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let log_level = cfg.service.log_level.trim();

	cfg.service.log_level =
		if log_level.is_empty() { "info".to_string() } else { log_level.to_string() };
	cfg.service.http_bind = cfg.service.http_bind.trim().to_string();
}
