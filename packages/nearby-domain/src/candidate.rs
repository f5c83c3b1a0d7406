use std::{borrow::Cow, collections::BTreeMap};

use serde::{Deserialize, Serialize};

use crate::geo::Point;

/// A raw record returned by a spatial engine. Distance is never part of it; callers derive it
/// from the query center.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
	pub id: u64,
	pub location: Point,
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub attributes: BTreeMap<String, f64>,
}
impl Candidate {
	pub fn new(id: u64, location: Point) -> Self {
		Self { id, location, name: String::new(), attributes: BTreeMap::new() }
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();

		self
	}

	pub fn with_attribute(mut self, key: impl Into<String>, value: f64) -> Self {
		self.attributes.insert(key.into(), value);

		self
	}

	pub fn attribute(&self, key: &str) -> Option<f64> {
		self.attributes.get(key).copied()
	}

	pub fn display_name(&self) -> Cow<'_, str> {
		if self.name.trim().is_empty() {
			Cow::Owned(format!("Cafe {}", self.id))
		} else {
			Cow::Borrowed(self.name.as_str())
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredResult {
	pub candidate: Candidate,
	pub score: f64,
	/// Meters from the query center, rounded to whole meters.
	pub distance: f64,
}
