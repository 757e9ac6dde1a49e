//! Handlers for curation writes under `/judgments`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `PUT`  | `/judgments/descriptions` | Body: [`DescriptionBody`]; empty `article_ids` means "no article" |
//! | `PUT`  | `/judgments/locations/canonical` | Body: [`CanonicalBody`]; `null` clears |
//!
//! Both mark the reconciliation state dirty.

use axum::{Json, extract::State};
use multa_core::{
  judgment::{DescriptionJudgment, LocationJudgment, NewDescriptionJudgment},
  store::JudgmentStore,
  text::normalize,
};
use serde::Deserialize;
use tracing::info;

use crate::{AppState, error::ApiError};

// ─── Descriptions ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DescriptionBody {
  pub description: String,
  #[serde(default)]
  pub article_ids: Vec<String>,
}

/// `PUT /judgments/descriptions`
pub async fn put_description<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<DescriptionBody>,
) -> Result<Json<DescriptionJudgment>, ApiError>
where
  S: JudgmentStore + Clone,
{
  if normalize(&body.description).is_empty() {
    return Err(ApiError::BadRequest("description is empty".into()));
  }
  for id in &body.article_ids {
    let known = state.store.get_article(id).await.map_err(ApiError::internal)?;
    if known.is_none() {
      return Err(ApiError::BadRequest(format!("unknown article id: {id:?}")));
    }
  }

  let mut controller = state.controller.lock().await;
  let judgment = state
    .store
    .upsert_description_judgment(NewDescriptionJudgment {
      description: body.description,
      article_ids: body.article_ids,
    })
    .await
    .map_err(ApiError::internal)?;
  controller.mark_dirty();

  info!(description = %judgment.description, articles = ?judgment.article_ids, "description judged");
  Ok(Json(judgment))
}

// ─── Canonical locations ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CanonicalBody {
  pub jurisdiction_id:    i64,
  pub location:           String,
  pub canonical_location: Option<String>,
}

/// `PUT /judgments/locations/canonical`
pub async fn put_canonical<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<CanonicalBody>,
) -> Result<Json<LocationJudgment>, ApiError>
where
  S: JudgmentStore + Clone,
{
  let mut controller = state.controller.lock().await;
  let judgment = state
    .store
    .set_canonical_location(body.jurisdiction_id, &body.location, body.canonical_location)
    .await
    .map_err(ApiError::internal)?
    .ok_or_else(|| {
      ApiError::NotFound(format!(
        "no location judgment for {:?} in jurisdiction {}",
        body.location, body.jurisdiction_id
      ))
    })?;
  controller.mark_dirty();
  state.cache.clear();

  Ok(Json(judgment))
}
