//! Offense records as delivered by the acquisition collaborator.
//!
//! The core never originates offense records; it only annotates them with
//! enrichment columns during backfill.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::point::Point;

/// A raw offense record plus whatever enrichment has been applied so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffenseRecord {
  pub id:              i64,
  pub jurisdiction_id: i64,
  pub description:     String,
  pub location:        String,
  pub occurred_at:     DateTime<Utc>,
  pub amount:          f64,
  /// `None` until backfilled; `Some(vec![])` for a "no article" judgment.
  pub article_ids:     Option<Vec<String>>,
  pub article_codes:   Option<Vec<i64>>,
  /// Row id of the location judgment applied to this record.
  pub location_id:     Option<i64>,
  pub point:           Option<Point>,
}

/// Input to [`crate::store::JudgmentStore::insert_offense`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOffense {
  pub jurisdiction_id: i64,
  pub description:     String,
  pub location:        String,
  pub occurred_at:     DateTime<Utc>,
  pub amount:          f64,
}
