//! Judgments: human-confirmed enrichment decisions treated as ground truth.
//!
//! A description judgment maps a normalized infraction description to an
//! ordered list of articles. A location judgment maps a
//! `(jurisdiction, raw location)` pair to a resolved point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{cell::CellId, point::Point};

// ─── Confidence & method ─────────────────────────────────────────────────────

/// Precision class of a resolved point. Totally ordered:
/// `Approximate < Interpolated < Exact`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConfidenceTier {
  Approximate,
  Interpolated,
  Exact,
}

/// How a location judgment's point was obtained.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResolutionMethod {
  /// Matched against the local table of fixed installations.
  Gazetteer,
  /// Returned by the external geocoding provider.
  Geocoder,
  /// Placed by a curator.
  Manual,
  /// No usable point yet; needs a manual geocode.
  #[default]
  Pending,
}

// ─── Descriptions ────────────────────────────────────────────────────────────

/// A confirmed classification of an infraction description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionJudgment {
  /// The description as first judged; the unique key is its normalized form.
  pub description: String,
  /// Ordered article ids. Empty means "no article".
  pub article_ids: Vec<String>,
  /// Group codes of `article_ids`, same order.
  pub group_codes: Vec<i64>,
  pub updated_at:  DateTime<Utc>,
}

impl DescriptionJudgment {
  pub fn is_no_article(&self) -> bool { self.article_ids.is_empty() }
}

/// Input to [`crate::store::JudgmentStore::upsert_description_judgment`].
/// Group codes are derived by the store from the article catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDescriptionJudgment {
  pub description: String,
  pub article_ids: Vec<String>,
}

// ─── Locations ───────────────────────────────────────────────────────────────

/// A confirmed (or pending) geocode of a raw location string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationJudgment {
  pub id:                 i64,
  pub jurisdiction_id:    i64,
  pub location:           String,
  /// Curator-chosen display string unifying textual variants of one point.
  pub canonical_location: Option<String>,
  pub point:              Option<Point>,
  pub is_electronic:      bool,
  pub method:             ResolutionMethod,
  pub confidence:         Option<ConfidenceTier>,
  pub notes:              Option<String>,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
  /// One cell per configured resolution, coarsest first. Empty iff `point`
  /// is `None`.
  pub cells:              Vec<CellId>,
}

impl LocationJudgment {
  pub fn is_resolved(&self) -> bool { self.point.is_some() }

  /// The text shown for this location on the map.
  pub fn display(&self) -> &str {
    self.canonical_location.as_deref().unwrap_or(&self.location)
  }
}

/// Input to [`crate::store::JudgmentStore::upsert_location_judgment`].
/// Timestamps and the row id are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLocationJudgment {
  pub jurisdiction_id:    i64,
  pub location:           String,
  pub canonical_location: Option<String>,
  pub point:              Option<Point>,
  pub is_electronic:      bool,
  pub method:             ResolutionMethod,
  pub confidence:         Option<ConfidenceTier>,
  pub notes:              Option<String>,
  pub cells:              Vec<CellId>,
}

impl NewLocationJudgment {
  /// A judgment recording that no usable point was found.
  pub fn pending(
    jurisdiction_id: i64,
    location: impl Into<String>,
    reason: impl Into<String>,
  ) -> Self {
    Self {
      jurisdiction_id,
      location: location.into(),
      canonical_location: None,
      point: None,
      is_electronic: false,
      method: ResolutionMethod::Pending,
      confidence: None,
      notes: Some(reason.into()),
      cells: Vec::new(),
    }
  }
}
