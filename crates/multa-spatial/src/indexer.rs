//! [`SpatialIndexer`]: point → cell ids at every configured resolution.

use std::f64::consts::PI;

use multa_core::{
  cell::{CellId, MAX_RESOLUTION},
  point::Point,
};

use crate::{Error, Result};

/// Latitude limit of the square Web-Mercator projection.
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialIndexer {
  resolutions: Vec<u8>,
}

impl SpatialIndexer {
  /// `resolutions` must be non-empty, strictly ascending, and within
  /// `1..=MAX_RESOLUTION`.
  pub fn new(resolutions: Vec<u8>) -> Result<Self> {
    if resolutions.is_empty() {
      return Err(Error::InvalidResolutions("at least one resolution is required".into()));
    }
    if let Some(bad) = resolutions.iter().find(|r| !(1..=MAX_RESOLUTION).contains(*r)) {
      return Err(Error::InvalidResolutions(format!(
        "{bad} is outside 1..={MAX_RESOLUTION}"
      )));
    }
    if resolutions.windows(2).any(|w| w[0] >= w[1]) {
      return Err(Error::InvalidResolutions(format!(
        "{resolutions:?} is not strictly ascending"
      )));
    }
    Ok(Self { resolutions })
  }

  pub fn resolutions(&self) -> &[u8] { &self.resolutions }

  pub fn coarsest(&self) -> u8 { self.resolutions[0] }

  pub fn finest(&self) -> u8 { self.resolutions[self.resolutions.len() - 1] }

  pub fn is_configured(&self, resolution: u8) -> bool {
    self.resolutions.contains(&resolution)
  }

  /// The configured resolution immediately finer than `resolution`.
  pub fn next_finer(&self, resolution: u8) -> Option<u8> {
    self.resolutions.iter().copied().find(|r| *r > resolution)
  }

  /// The cell containing `point` at `resolution`.
  pub fn cell_at(point: Point, resolution: u8) -> CellId {
    let n = f64::from(1u32 << resolution);
    let max = (1u32 << resolution) - 1;

    let lat = point.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = ((point.lng + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * n).floor();

    let x = (x.max(0.0) as u32).min(max);
    let y = (y.max(0.0) as u32).min(max);
    CellId::from_tile(resolution, x, y)
  }

  /// One cell per configured resolution, coarsest first.
  pub fn index(&self, point: Point) -> Result<Vec<CellId>> {
    let point = point.validate()?;
    Ok(self.resolutions.iter().map(|r| Self::cell_at(point, *r)).collect())
  }
}
