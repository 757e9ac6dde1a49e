//! Hierarchical spatial cell ids.
//!
//! A cell is a Web-Mercator quadtree tile encoded as a quadkey: one digit in
//! `0..=3` per level, so the resolution of a cell is the length of its id and
//! its parent is the id with the last digit removed.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Deepest supported resolution.
pub const MAX_RESOLUTION: u8 = 24;

/// A quadtree cell at a fixed resolution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellId(String);

impl CellId {
  /// Parse and validate a quadkey string.
  pub fn parse(s: &str) -> Result<Self> {
    let valid = !s.is_empty()
      && s.len() <= MAX_RESOLUTION as usize
      && s.bytes().all(|b| (b'0'..=b'3').contains(&b));
    if valid {
      Ok(Self(s.to_owned()))
    } else {
      Err(Error::MalformedCell(s.to_owned()))
    }
  }

  /// Build the cell for tile `(x, y)` at `resolution`.
  ///
  /// `x` and `y` must be below `2^resolution`; higher bits are ignored.
  pub fn from_tile(resolution: u8, x: u32, y: u32) -> Self {
    let resolution = resolution.clamp(1, MAX_RESOLUTION);
    let key = (1..=resolution)
      .rev()
      .map(|level| {
        let mask = 1u32 << (level - 1);
        let mut digit = b'0';
        if x & mask != 0 {
          digit += 1;
        }
        if y & mask != 0 {
          digit += 2;
        }
        digit as char
      })
      .collect();
    Self(key)
  }

  /// Tile coordinates `(x, y)` of this cell at its own resolution.
  pub fn tile(&self) -> (u32, u32) {
    self.0.bytes().fold((0, 0), |(x, y), b| {
      let d = u32::from(b - b'0');
      ((x << 1) | (d & 1), (y << 1) | (d >> 1))
    })
  }

  pub fn resolution(&self) -> u8 { self.0.len() as u8 }

  pub fn as_str(&self) -> &str { &self.0 }

  /// The enclosing cell one level up, or `None` at resolution 1.
  pub fn parent(&self) -> Option<Self> {
    self.ancestor(self.resolution().checked_sub(1)?)
  }

  /// The enclosing cell at `resolution`, if it is coarser or equal.
  pub fn ancestor(&self, resolution: u8) -> Option<Self> {
    if resolution == 0 || resolution > self.resolution() {
      return None;
    }
    Some(Self(self.0[..resolution as usize].to_owned()))
  }

  /// Whether `other` lies inside (or is) this cell.
  pub fn contains(&self, other: &CellId) -> bool { other.0.starts_with(&self.0) }
}

impl fmt::Display for CellId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl FromStr for CellId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl TryFrom<String> for CellId {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { Self::parse(&s) }
}

impl From<CellId> for String {
  fn from(c: CellId) -> Self { c.0 }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_rejects_malformed_ids() {
    assert!(CellId::parse("").is_err());
    assert!(CellId::parse("0124").is_err());
    assert!(CellId::parse("abc").is_err());
    assert!(CellId::parse(&"0".repeat(25)).is_err());
    assert!(CellId::parse("0123").is_ok());
  }

  #[test]
  fn tile_round_trip() {
    let cell = CellId::from_tile(3, 3, 5);
    assert_eq!(cell.as_str(), "213");
    assert_eq!(cell.tile(), (3, 5));
    assert_eq!(cell.resolution(), 3);
  }

  #[test]
  fn hierarchy_is_prefix_based() {
    let cell = CellId::parse("0231").unwrap();
    assert_eq!(cell.parent().unwrap().as_str(), "023");
    assert_eq!(cell.ancestor(2).unwrap().as_str(), "02");
    assert!(cell.ancestor(5).is_none());
    assert!(CellId::parse("02").unwrap().contains(&cell));
    assert!(!CellId::parse("03").unwrap().contains(&cell));
    assert!(CellId::parse("0").unwrap().parent().is_none());
  }

  #[test]
  fn serde_uses_plain_string() {
    let cell = CellId::parse("12").unwrap();
    assert_eq!(serde_json::to_string(&cell).unwrap(), "\"12\"");
    assert!(serde_json::from_str::<CellId>("\"19\"").is_err());
  }
}
