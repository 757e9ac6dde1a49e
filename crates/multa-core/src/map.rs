//! Map query filters and the per-location rows the aggregator consumes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, cell::CellId, point::Point};

// ─── Filters ─────────────────────────────────────────────────────────────────

/// Active filter predicates of a map request. All are conjunctive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapFilters {
  pub jurisdiction_id: Option<i64>,
  /// Inclusive lower bound on `occurred_at`.
  pub from:            Option<DateTime<Utc>>,
  /// Exclusive upper bound on `occurred_at`.
  pub to:              Option<DateTime<Utc>>,
  /// Only records enriched with this article id.
  pub article_id:      Option<String>,
  /// Only electronic-enforcement (or only manual) locations.
  pub electronic:      Option<bool>,
}

impl MapFilters {
  /// Filter dimensions accepted by [`MapFilters::from_pairs`].
  pub const KEYS: [&'static str; 5] =
    ["jurisdiction", "from", "to", "article", "electronic"];

  /// Build filters from raw key/value pairs. Unknown keys and unparsable
  /// values are rejected, never dropped.
  pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
  where
    I: IntoIterator<Item = (&'a str, &'a str)>,
  {
    let mut filters = Self::default();
    for (key, value) in pairs {
      let invalid = || Error::InvalidFilterValue {
        key:   key.to_owned(),
        value: value.to_owned(),
      };
      match key {
        "jurisdiction" => {
          filters.jurisdiction_id = Some(value.parse().map_err(|_| invalid())?);
        }
        "from" => filters.from = Some(parse_instant(value).ok_or_else(invalid)?),
        "to" => filters.to = Some(parse_instant(value).ok_or_else(invalid)?),
        "article" => {
          let id = value.trim();
          if id.is_empty() {
            return Err(invalid());
          }
          filters.article_id = Some(id.to_owned());
        }
        "electronic" => {
          filters.electronic = Some(value.parse().map_err(|_| invalid())?);
        }
        other => return Err(Error::UnknownFilter(other.to_owned())),
      }
    }
    Ok(filters)
  }

  /// A stable string identifying this filter set, for response caching.
  pub fn cache_key(&self) -> String {
    format!(
      "j={:?};f={:?};t={:?};a={:?};e={:?}",
      self.jurisdiction_id,
      self.from.map(|d| d.timestamp()),
      self.to.map(|d| d.timestamp()),
      self.article_id,
      self.electronic,
    )
  }
}

/// Accept RFC 3339 instants or bare `YYYY-MM-DD` dates (midnight UTC).
fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|dt| dt.and_utc())
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// One distinct location with the number of matching records at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapLocation {
  pub jurisdiction_id: i64,
  /// Canonical location if a curator set one, else the raw text.
  pub label:           String,
  /// Record-weighted mean of the points sharing this label.
  pub point:           Point,
  pub records:         u64,
  /// The stored cell at the requested grouping resolution, if any.
  pub group_cell:      Option<CellId>,
}
