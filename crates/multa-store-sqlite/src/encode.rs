//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings so that they
//! sort lexicographically. Article lists are stored as compact JSON arrays.
//! Enums are stored as their snake_case names.

use std::{collections::HashMap, str::FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use multa_core::{
  cell::CellId,
  judgment::{ConfidenceTier, DescriptionJudgment, LocationJudgment, ResolutionMethod},
  offense::OffenseRecord,
  point::Point,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── JSON arrays ─────────────────────────────────────────────────────────────

pub fn encode_ids(ids: &[String]) -> Result<String> { Ok(serde_json::to_string(ids)?) }

pub fn decode_ids(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

pub fn encode_codes(codes: &[i64]) -> Result<String> {
  Ok(serde_json::to_string(codes)?)
}

pub fn decode_codes(s: &str) -> Result<Vec<i64>> { Ok(serde_json::from_str(s)?) }

// ─── Enums ───────────────────────────────────────────────────────────────────

fn decode_variant<T: FromStr>(kind: &'static str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| {
    Error::Core(multa_core::Error::UnknownVariant { kind, value: s.to_owned() })
  })
}

pub fn decode_method(s: &str) -> Result<ResolutionMethod> {
  decode_variant("resolution method", s)
}

pub fn decode_confidence(s: &str) -> Result<ConfidenceTier> {
  decode_variant("confidence tier", s)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `description_judgments` row.
pub struct RawDescription {
  pub description: String,
  pub article_ids: String,
  pub group_codes: String,
  pub updated_at:  String,
}

impl RawDescription {
  pub const COLUMNS: &'static str = "description, article_ids, group_codes, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      description: row.get(0)?,
      article_ids: row.get(1)?,
      group_codes: row.get(2)?,
      updated_at:  row.get(3)?,
    })
  }

  pub fn into_judgment(self) -> Result<DescriptionJudgment> {
    Ok(DescriptionJudgment {
      description: self.description,
      article_ids: decode_ids(&self.article_ids)?,
      group_codes: decode_codes(&self.group_codes)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `location_judgments` row.
pub struct RawLocation {
  pub id:                 i64,
  pub jurisdiction_id:    i64,
  pub location:           String,
  pub canonical_location: Option<String>,
  pub lat:                Option<f64>,
  pub lng:                Option<f64>,
  pub is_electronic:      bool,
  pub method:             String,
  pub confidence:         Option<String>,
  pub notes:              Option<String>,
  pub created_at:         String,
  pub updated_at:         String,
}

impl RawLocation {
  pub const COLUMNS: &'static str = "id, jurisdiction_id, location, canonical_location, \
                                     lat, lng, is_electronic, method, confidence, notes, \
                                     created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                 row.get(0)?,
      jurisdiction_id:    row.get(1)?,
      location:           row.get(2)?,
      canonical_location: row.get(3)?,
      lat:                row.get(4)?,
      lng:                row.get(5)?,
      is_electronic:      row.get(6)?,
      method:             row.get(7)?,
      confidence:         row.get(8)?,
      notes:              row.get(9)?,
      created_at:         row.get(10)?,
      updated_at:         row.get(11)?,
    })
  }

  /// Decode the row, attaching its `(resolution, cell)` pairs.
  pub fn into_judgment(self, mut cells: Vec<(u8, String)>) -> Result<LocationJudgment> {
    cells.sort_by_key(|(res, _)| *res);
    let cells = cells
      .into_iter()
      .map(|(_, c)| CellId::parse(&c))
      .collect::<multa_core::Result<Vec<_>>>()?;

    Ok(LocationJudgment {
      id:                 self.id,
      jurisdiction_id:    self.jurisdiction_id,
      location:           self.location,
      canonical_location: self.canonical_location,
      point:              point_of(self.lat, self.lng),
      is_electronic:      self.is_electronic,
      method:             decode_method(&self.method)?,
      confidence:         self.confidence.as_deref().map(decode_confidence).transpose()?,
      notes:              self.notes,
      created_at:         decode_dt(&self.created_at)?,
      updated_at:         decode_dt(&self.updated_at)?,
      cells,
    })
  }
}

/// Group `(location_id, resolution, cell)` rows by location.
pub fn group_cells(rows: Vec<(i64, u8, String)>) -> HashMap<i64, Vec<(u8, String)>> {
  let mut by_location: HashMap<i64, Vec<(u8, String)>> = HashMap::new();
  for (id, res, cell) in rows {
    by_location.entry(id).or_default().push((res, cell));
  }
  by_location
}

/// Raw values read directly from an `offenses` row.
pub struct RawOffense {
  pub id:              i64,
  pub jurisdiction_id: i64,
  pub description:     String,
  pub location:        String,
  pub occurred_at:     String,
  pub amount:          f64,
  pub article_ids:     Option<String>,
  pub article_codes:   Option<String>,
  pub location_id:     Option<i64>,
  pub lat:             Option<f64>,
  pub lng:             Option<f64>,
}

impl RawOffense {
  pub const COLUMNS: &'static str = "id, jurisdiction_id, description, location, occurred_at, \
                                     amount, article_ids, article_codes, location_id, lat, lng";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      jurisdiction_id: row.get(1)?,
      description:     row.get(2)?,
      location:        row.get(3)?,
      occurred_at:     row.get(4)?,
      amount:          row.get(5)?,
      article_ids:     row.get(6)?,
      article_codes:   row.get(7)?,
      location_id:     row.get(8)?,
      lat:             row.get(9)?,
      lng:             row.get(10)?,
    })
  }

  pub fn into_record(self) -> Result<OffenseRecord> {
    Ok(OffenseRecord {
      id:              self.id,
      jurisdiction_id: self.jurisdiction_id,
      description:     self.description,
      location:        self.location,
      occurred_at:     decode_dt(&self.occurred_at)?,
      amount:          self.amount,
      article_ids:     self.article_ids.as_deref().map(decode_ids).transpose()?,
      article_codes:   self.article_codes.as_deref().map(decode_codes).transpose()?,
      location_id:     self.location_id,
      point:           point_of(self.lat, self.lng),
    })
  }
}

fn point_of(lat: Option<f64>, lng: Option<f64>) -> Option<Point> {
  Some(Point::new(lat?, lng?))
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_sort_lexicographically() {
    let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let b = a + chrono::Duration::milliseconds(500);
    assert!(encode_dt(a) < encode_dt(b));
    assert_eq!(decode_dt(&encode_dt(b)).unwrap(), b);
  }

  #[test]
  fn unknown_method_is_rejected() {
    assert!(decode_method("telepathy").is_err());
    assert_eq!(decode_method("manual").unwrap(), ResolutionMethod::Manual);
  }
}
