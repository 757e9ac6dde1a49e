//! The `JudgmentStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g. `multa-store-sqlite`).
//! Higher layers (classifier, resolver, reconciliation, API) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  article::Article,
  cell::CellId,
  judgment::{
    DescriptionJudgment, LocationJudgment, NewDescriptionJudgment, NewLocationJudgment,
  },
  map::{MapFilters, MapLocation},
  offense::{NewOffense, OffenseRecord},
};

// ─── Supporting types ────────────────────────────────────────────────────────

/// Row counts per judgment entity type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
  pub locations:    u64,
  pub descriptions: u64,
  pub articles:     u64,
}

/// Everything the store holds, as read for export.
#[derive(Debug, Clone, Default)]
pub struct JudgmentSnapshot {
  pub articles:     Vec<Article>,
  pub descriptions: Vec<DescriptionJudgment>,
  pub locations:    Vec<LocationJudgment>,
}

/// Full replacement contents for a reload. Locations must already carry
/// their spatial cells.
#[derive(Debug, Clone, Default)]
pub struct ReplaceSet {
  pub articles:     Vec<Article>,
  pub descriptions: Vec<NewDescriptionJudgment>,
  pub locations:    Vec<NewLocationJudgment>,
}

/// Offense rows still missing one kind of enrichment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSplit {
  /// No judgment exists for the raw text.
  pub unjudged:  u64,
  /// A judgment exists but has not been (or cannot yet be) applied.
  pub unapplied: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCounts {
  pub descriptions: PendingSplit,
  pub locations:    PendingSplit,
}

/// An unjudged description and how many records it affects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionQueueItem {
  pub description: String,
  pub records:     u64,
}

/// An unresolved location and how many records it affects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationQueueItem {
  pub jurisdiction_id: i64,
  pub location:        String,
  pub records:         u64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Multa judgment store backend.
///
/// Every mutation is all-or-nothing: a single-row upsert or a transactional
/// clear-and-reload of whole tables. Text keys are matched on their
/// [`normalize`](crate::text::normalize)d form.
///
/// Returned futures are `Send`, so a backend can be shared across the worker
/// threads of the API server.
pub trait JudgmentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Catalog ───────────────────────────────────────────────────────────

  fn list_articles(
    &self,
  ) -> impl Future<Output = Result<Vec<Article>, Self::Error>> + Send + '_;

  fn get_article<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Article>, Self::Error>> + Send + 'a;

  // ── Description judgments ─────────────────────────────────────────────

  fn get_description_judgment<'a>(
    &'a self,
    description: &'a str,
  ) -> impl Future<Output = Result<Option<DescriptionJudgment>, Self::Error>> + Send + 'a;

  fn list_description_judgments(
    &self,
  ) -> impl Future<Output = Result<Vec<DescriptionJudgment>, Self::Error>> + Send + '_;

  /// Insert or replace the judgment for a description. Group codes are
  /// derived from the catalog; an unknown article id is an error.
  fn upsert_description_judgment(
    &self,
    input: NewDescriptionJudgment,
  ) -> impl Future<Output = Result<DescriptionJudgment, Self::Error>> + Send + '_;

  // ── Location judgments ────────────────────────────────────────────────

  fn get_location_judgment<'a>(
    &'a self,
    jurisdiction_id: i64,
    location: &'a str,
  ) -> impl Future<Output = Result<Option<LocationJudgment>, Self::Error>> + Send + 'a;

  fn list_location_judgments(
    &self,
  ) -> impl Future<Output = Result<Vec<LocationJudgment>, Self::Error>> + Send + '_;

  /// Insert or replace the judgment for `(jurisdiction_id, location)`,
  /// preserving `created_at` and the row id of an existing judgment.
  fn upsert_location_judgment(
    &self,
    input: NewLocationJudgment,
  ) -> impl Future<Output = Result<LocationJudgment, Self::Error>> + Send + '_;

  /// Set (or clear) the curator's canonical display string. Returns `None`
  /// if no judgment exists for the pair.
  fn set_canonical_location<'a>(
    &'a self,
    jurisdiction_id: i64,
    location: &'a str,
    canonical: Option<String>,
  ) -> impl Future<Output = Result<Option<LocationJudgment>, Self::Error>> + Send + 'a;

  // ── Bulk ──────────────────────────────────────────────────────────────

  fn counts(&self) -> impl Future<Output = Result<EntityCounts, Self::Error>> + Send + '_;

  /// Clear all three judgment tables and reload them from `set` inside one
  /// transaction. Offense enrichment already applied is left untouched.
  fn replace_all(
    &self,
    set: ReplaceSet,
  ) -> impl Future<Output = Result<EntityCounts, Self::Error>> + Send + '_;

  /// Read every article and judgment, sorted by key.
  fn export_all(
    &self,
  ) -> impl Future<Output = Result<JudgmentSnapshot, Self::Error>> + Send + '_;

  // ── Offenses ──────────────────────────────────────────────────────────

  fn insert_offense(
    &self,
    input: NewOffense,
  ) -> impl Future<Output = Result<OffenseRecord, Self::Error>> + Send + '_;

  fn get_offense(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<OffenseRecord>, Self::Error>> + Send + '_;

  /// Fill article columns of records that lack them from matching
  /// description judgments. Returns the number of records updated.
  fn backfill_descriptions(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Fill location columns of records that lack them from matching resolved
  /// location judgments. Returns the number of records updated.
  fn backfill_locations(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn pending_counts(
    &self,
  ) -> impl Future<Output = Result<PendingCounts, Self::Error>> + Send + '_;

  // ── Curation queues ───────────────────────────────────────────────────

  /// Distinct descriptions with no judgment, most-affected first.
  fn unjudged_descriptions(
    &self,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<DescriptionQueueItem>, Self::Error>> + Send + '_;

  /// Distinct locations with no judgment or an unresolved one,
  /// most-affected first.
  fn unresolved_locations(
    &self,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<LocationQueueItem>, Self::Error>> + Send + '_;

  // ── Map ───────────────────────────────────────────────────────────────

  /// One row per distinct location among enriched records matching
  /// `filters`, optionally restricted to locations whose stored cell at
  /// `within`'s resolution equals `within`. `group_resolution` selects which
  /// stored cell is reported in [`MapLocation::group_cell`].
  fn map_locations<'a>(
    &'a self,
    filters: &'a MapFilters,
    within: Option<&'a CellId>,
    group_resolution: Option<u8>,
  ) -> impl Future<Output = Result<Vec<MapLocation>, Self::Error>> + Send + 'a;
}
