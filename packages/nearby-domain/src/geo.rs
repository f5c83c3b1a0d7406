use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Mean earth radius in meters used for great-circle distances.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

// Relative widening of the prefilter box so rounding never drops a point the exact check keeps.
const BOX_MARGIN: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
	pub lon: f64,
	pub lat: f64,
}
impl Point {
	pub fn new(lon: f64, lat: f64) -> Self {
		Self { lon, lat }
	}

	pub fn is_valid(&self) -> bool {
		self.lon.is_finite()
			&& self.lat.is_finite()
			&& (-180.0..=180.0).contains(&self.lon)
			&& (-90.0..=90.0).contains(&self.lat)
	}

	/// Haversine distance in meters.
	pub fn distance_to(&self, other: &Point) -> f64 {
		let d_lat = (other.lat - self.lat).to_radians();
		let d_lon = (other.lon - self.lon).to_radians();
		let lat1 = self.lat.to_radians();
		let lat2 = other.lat.to_radians();
		let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
		let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

		EARTH_RADIUS_M * c
	}
}

/// Axis-aligned lon/lat rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
	pub min: Point,
	pub max: Point,
}
impl BoundingBox {
	/// Rectangle enclosing the spherical cap of `radius_m` meters around `center`, on the same
	/// sphere as [`Point::distance_to`]. A cap that reaches a pole spans every meridian.
	pub fn around(center: Point, radius_m: f64) -> Self {
		let angular = radius_m.max(0.0) / EARTH_RADIUS_M * (1.0 + BOX_MARGIN);
		let r_lat = angular.to_degrees();
		let reaches_pole = angular >= PI / 2.0 || center.lat.abs() + r_lat >= 90.0;
		let r_lon = if reaches_pole {
			180.0
		} else {
			(angular.sin() / center.lat.to_radians().cos()).min(1.0).asin().to_degrees()
		};

		Self {
			min: Point::new(center.lon - r_lon, center.lat - r_lat),
			max: Point::new(center.lon + r_lon, center.lat + r_lat),
		}
	}

	/// Rectangles crossing the antimeridian accept every longitude and leave the rest to an
	/// exact distance check.
	pub fn contains(&self, point: &Point) -> bool {
		let wraps = self.min.lon < -180.0 || self.max.lon > 180.0;

		(wraps || (self.min.lon..=self.max.lon).contains(&point.lon))
			&& (self.min.lat..=self.max.lat).contains(&point.lat)
	}
}
