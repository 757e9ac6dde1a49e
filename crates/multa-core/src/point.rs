//! Geographic points and bounding boxes.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
  pub lat: f64,
  pub lng: f64,
}

impl Point {
  pub fn new(lat: f64, lng: f64) -> Self { Self { lat, lng } }

  /// Reject non-finite or out-of-range coordinates.
  pub fn validate(self) -> Result<Self> {
    let ok = self.lat.is_finite()
      && self.lng.is_finite()
      && (-90.0..=90.0).contains(&self.lat)
      && (-180.0..=180.0).contains(&self.lng);
    if ok {
      Ok(self)
    } else {
      Err(Error::OutOfBounds { lat: self.lat, lng: self.lng })
    }
  }
}

/// An axis-aligned latitude/longitude box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
  pub min_lat: f64,
  pub max_lat: f64,
  pub min_lng: f64,
  pub max_lng: f64,
}

impl Bounds {
  /// The whole globe.
  pub const WORLD: Self = Self {
    min_lat: -90.0,
    max_lat: 90.0,
    min_lng: -180.0,
    max_lng: 180.0,
  };

  pub fn contains(&self, p: Point) -> bool {
    (self.min_lat..=self.max_lat).contains(&p.lat)
      && (self.min_lng..=self.max_lng).contains(&p.lng)
  }

  /// Validate `p` and check it lies inside these bounds.
  pub fn check(&self, p: Point) -> Result<Point> {
    let p = p.validate()?;
    if self.contains(p) {
      Ok(p)
    } else {
      Err(Error::OutOfBounds { lat: p.lat, lng: p.lng })
    }
  }
}

impl Default for Bounds {
  fn default() -> Self { Self::WORLD }
}
