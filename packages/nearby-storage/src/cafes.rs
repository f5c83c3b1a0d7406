use std::path::{Path, PathBuf};

use serde::Deserialize;

use nearby_domain::{
	Candidate, Point,
	scoring::{CURRENT_CROWD, PRICE_LEVEL, RATING},
};

use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct CafeRow {
	id: u64,
	name: String,
	rating: f64,
	latitude: f64,
	longitude: f64,
	price_level: i64,
	current_crowd: i64,
}
impl From<CafeRow> for Candidate {
	fn from(row: CafeRow) -> Self {
		Candidate::new(row.id, Point::new(row.longitude, row.latitude))
			.with_name(row.name)
			.with_attribute(RATING, row.rating)
			.with_attribute(PRICE_LEVEL, row.price_level as f64)
			.with_attribute(CURRENT_CROWD, row.current_crowd as f64)
	}
}

/// Location of the `batch`-sized cafe export inside `dir`.
pub fn batch_path(dir: &Path, batch: u64) -> PathBuf {
	dir.join(format!("cafes_{batch}.csv"))
}

/// Reads a cafe export with the header `id,name,rating,latitude,longitude,price_level,
/// current_crowd`.
pub fn read_cafes(path: &Path) -> Result<Vec<Candidate>> {
	let mut reader = csv::ReaderBuilder::new()
		.trim(csv::Trim::All)
		.from_path(path)
		.map_err(|err| Error::Csv { path: path.to_path_buf(), source: err })?;
	let mut cafes = Vec::new();

	for row in reader.deserialize::<CafeRow>() {
		let row = row.map_err(|err| Error::Csv { path: path.to_path_buf(), source: err })?;

		cafes.push(row.into());
	}

	Ok(cafes)
}
