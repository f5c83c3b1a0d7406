pub mod candidate;
pub mod geo;
pub mod scoring;

pub use candidate::{Candidate, ScoredResult};
pub use geo::Point;
pub use scoring::{ScoreModel, WeightSet};
