use serde::Serialize;
use tokio::task;

use nearby_storage::cafes;

use crate::{Error, NearbyService, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InsertReport {
	pub batch: u64,
	pub inserted: usize,
}
impl InsertReport {
	pub fn message(&self) -> String {
		format!("Imported {} cafes from CSV", self.inserted)
	}
}

impl NearbyService {
	/// Loads `cafes_{batch}.csv` from the ingest directory and inserts every row.
	pub async fn insert_cafes(&self, batch: u64) -> Result<InsertReport> {
		let path = cafes::batch_path(&self.cfg.ingest.csv_dir, batch);
		let engine = self.engine.clone();
		let inserted = task::spawn_blocking(move || -> nearby_storage::Result<usize> {
			let rows = cafes::read_cafes(&path)?;
			let inserted = rows.len();

			engine.insert(rows)?;

			Ok(inserted)
		})
		.await?
		.map_err(|err| {
			tracing::error!(batch, error = %err, "Cafe import failed.");

			Error::Ingest { message: err.to_string() }
		})?;

		tracing::info!(batch, inserted, "Imported cafes.");

		Ok(InsertReport { batch, inserted })
	}
}
