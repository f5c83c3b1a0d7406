use std::{collections::HashMap, sync::Arc, time::Instant};

use serde::{Deserialize, Serialize};
use tokio::task;

use nearby_domain::{
	Candidate, Point, ScoreModel, ScoredResult, WeightSet,
	scoring::{CURRENT_CROWD, PRICE_LEVEL, RATING},
};
use nearby_storage::engine::RangeQuery;

use crate::{Error, NearbyService, Result, bridge::StreamingQuery};

const REQUIRED_PARAMS: [&str; 3] = ["lon", "lat", "radius"];
const MIN_SCORE_PARAMS: [&str; 3] = ["min_score", "minScore", "min-score"];
const INVALID_FORMAT_MESSAGE: &str = "Invalid parameter format. All parameters must be numbers.";

/// A validated range search. Built once per HTTP call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueryRequest {
	pub center: Point,
	pub radius: f64,
	pub min_score: f64,
}
impl QueryRequest {
	/// Parses raw query-string parameters. `lon`, `lat` and `radius` are required; the minimum
	/// score may be spelled `min_score`, `minScore` or `min-score` and defaults to
	/// `default_min_score`.
	pub fn from_params(params: &HashMap<String, String>, default_min_score: f64) -> Result<Self> {
		for name in REQUIRED_PARAMS {
			if !params.contains_key(name) {
				return Err(Error::invalid(format!("Missing required parameter: {name}")));
			}
		}

		let min_score = match MIN_SCORE_PARAMS.iter().find_map(|name| params.get(*name)) {
			Some(raw) => parse_number(raw)?,
			None => default_min_score,
		};
		let request = Self {
			center: Point::new(parse_number(&params["lon"])?, parse_number(&params["lat"])?),
			radius: parse_number(&params["radius"])?,
			min_score,
		};

		request.validate()?;

		Ok(request)
	}

	pub fn validate(&self) -> Result<()> {
		if !self.center.is_valid() {
			return Err(Error::invalid(
				"lon must be within [-180, 180] and lat within [-90, 90].",
			));
		}
		if !self.radius.is_finite() || self.radius < 0.0 {
			return Err(Error::invalid("radius must be zero or greater."));
		}
		if !self.min_score.is_finite() {
			return Err(Error::invalid(INVALID_FORMAT_MESSAGE));
		}

		Ok(())
	}

	fn range_query(&self, weights: Arc<WeightSet>) -> RangeQuery {
		RangeQuery { center: self.center, radius: self.radius, min_score: self.min_score, weights }
	}
}

/// Wire shape of one matched record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
	pub id: u64,
	pub lon: f64,
	pub lat: f64,
	pub name: String,
	pub rating: f64,
	pub price_level: f64,
	pub current_crowd: f64,
	pub score: f64,
	pub distance: f64,
}
impl From<&ScoredResult> for ResultRecord {
	fn from(result: &ScoredResult) -> Self {
		let candidate = &result.candidate;

		Self {
			id: candidate.id,
			lon: candidate.location.lon,
			lat: candidate.location.lat,
			name: candidate.display_name().into_owned(),
			rating: candidate.attribute(RATING).unwrap_or(0.0),
			price_level: candidate.attribute(PRICE_LEVEL).unwrap_or(0.0),
			current_crowd: candidate.attribute(CURRENT_CROWD).unwrap_or(0.0),
			score: result.score,
			distance: result.distance,
		}
	}
}

impl NearbyService {
	/// Runs the whole search, then returns every accepted record ranked by score, best first.
	/// Records with equal scores keep engine order.
	pub async fn search_batch(&self, request: QueryRequest) -> Result<Vec<ResultRecord>> {
		request.validate()?;

		let started_at = Instant::now();
		let weights = self.weights.get();
		let query = request.range_query(weights.clone());
		let engine = self.engine.clone();
		let candidates = task::spawn_blocking(move || engine.search(&query)).await??;
		let found = candidates.len();
		let mut results =
			candidates.into_iter().filter_map(admitter(&request, weights)).collect::<Vec<_>>();

		results.sort_by(|a, b| b.score.total_cmp(&a.score));

		tracing::info!(
			found,
			accepted = results.len(),
			elapsed_ms = started_at.elapsed().as_millis() as u64,
			"Batch search finished."
		);

		Ok(results.iter().map(ResultRecord::from).collect())
	}

	/// Starts a streaming search. The weight snapshot is taken now; later updates do not affect
	/// this query.
	pub fn search_stream(&self, request: QueryRequest) -> Result<StreamingQuery> {
		request.validate()?;

		let weights = self.weights.get();
		let query = request.range_query(weights.clone());

		Ok(self.bridge.start(self.engine.clone(), query, admitter(&request, weights)))
	}
}

fn admitter(
	request: &QueryRequest,
	weights: Arc<WeightSet>,
) -> impl FnMut(Candidate) -> Option<ScoredResult> + Send + 'static {
	let center = request.center;
	let min_score = request.min_score;
	let model = ScoreModel::new(request.radius);

	move |candidate| {
		let distance = center.distance_to(&candidate.location).round();

		model.evaluate(candidate, distance, &weights, min_score)
	}
}

fn parse_number(raw: &str) -> Result<f64> {
	match raw.trim().parse::<f64>() {
		Ok(value) if value.is_finite() => Ok(value),
		_ => Err(Error::invalid(INVALID_FORMAT_MESSAGE)),
	}
}
