//! Weighted multi-criteria ranking of matched records.
//!
//! Every recognized attribute is mapped onto a normalized value whose direction is fixed:
//! closer, better rated, cheaper and emptier places always score higher. A weight only says
//! how much an attribute matters, so its magnitude is used and its sign is ignored. This keeps
//! the score monotonic for any weight set a client installs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::candidate::{Candidate, ScoredResult};

pub const DISTANCE: &str = "distance";
pub const RATING: &str = "rating";
pub const PRICE_LEVEL: &str = "price_level";
pub const CURRENT_CROWD: &str = "current_crowd";

pub const RECOGNIZED_KEYS: [&str; 4] = [DISTANCE, RATING, PRICE_LEVEL, CURRENT_CROWD];

const MIN_DISTANCE_SCALE_M: f64 = 1.0;
const NEUTRAL_RATING: f64 = 3.0;
const RATING_SPAN: f64 = 2.0;
const MAX_PRICE_LEVEL: f64 = 5.0;
const MAX_CROWD: f64 = 100.0;

/// Named multipliers for candidate attributes. Unknown keys are kept but never read.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightSet(BTreeMap<String, f64>);
impl WeightSet {
	pub fn new(weights: BTreeMap<String, f64>) -> Self {
		Self(weights)
	}

	pub fn get(&self, key: &str) -> Option<f64> {
		self.0.get(key).copied()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
		self.0.iter().map(|(key, weight)| (key.as_str(), *weight))
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn as_map(&self) -> &BTreeMap<String, f64> {
		&self.0
	}
}
impl<K> FromIterator<(K, f64)> for WeightSet
where
	K: Into<String>,
{
	fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(key, weight)| (key.into(), weight)).collect())
	}
}

/// Scoring policy bound to one query. The radius sets the scale for the distance term.
#[derive(Clone, Copy, Debug)]
pub struct ScoreModel {
	distance_scale: f64,
}
impl ScoreModel {
	pub fn new(radius_m: f64) -> Self {
		let radius_m = if radius_m.is_finite() { radius_m } else { 0.0 };

		Self { distance_scale: 2.0 * radius_m.max(MIN_DISTANCE_SCALE_M) }
	}

	/// Weighted mean of the normalized attributes named in `weights`, rounded to three
	/// decimals. Returns 0 when no recognized, finite, non-zero weight is present.
	pub fn score(&self, candidate: &Candidate, distance: f64, weights: &WeightSet) -> f64 {
		let mut total = 0.0;
		let mut total_weight = 0.0;

		for (key, weight) in weights.iter() {
			if !weight.is_finite() || weight == 0.0 {
				continue;
			}

			let Some(value) = self.normalized(key, candidate, distance) else {
				continue;
			};
			let weight = weight.abs();

			total += value.unwrap_or(0.0) * weight;
			total_weight += weight;
		}

		if total_weight == 0.0 {
			return 0.0;
		}

		round3(total / total_weight)
	}

	/// Scores the candidate and applies the acceptance threshold.
	pub fn evaluate(
		&self,
		candidate: Candidate,
		distance: f64,
		weights: &WeightSet,
		min_score: f64,
	) -> Option<ScoredResult> {
		let score = self.score(&candidate, distance, weights);

		filter(score, min_score).then_some(ScoredResult { candidate, score, distance })
	}

	// Outer `None` means the key is not recognized; inner `None` means the candidate lacks the
	// attribute.
	fn normalized(&self, key: &str, candidate: &Candidate, distance: f64) -> Option<Option<f64>> {
		let value = match key {
			DISTANCE => Some(1.0 - distance.max(0.0) / self.distance_scale),
			RATING => candidate.attribute(RATING).map(|rating| (rating - NEUTRAL_RATING) / RATING_SPAN),
			PRICE_LEVEL => candidate.attribute(PRICE_LEVEL).map(|price| 1.0 - price / MAX_PRICE_LEVEL),
			CURRENT_CROWD => candidate.attribute(CURRENT_CROWD).map(|crowd| 1.0 - crowd / MAX_CROWD),
			_ => return None,
		};

		Some(value.filter(|value| value.is_finite()))
	}
}

pub fn filter(score: f64, min_score: f64) -> bool {
	score >= min_score
}

fn round3(value: f64) -> f64 {
	(value * 1_000.0).round() / 1_000.0
}
