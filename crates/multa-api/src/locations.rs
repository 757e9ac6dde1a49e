//! Handler for `POST /locations/resolve`.

use axum::{Json, extract::State};
use multa_core::{judgment::LocationJudgment, store::JudgmentStore, text::normalize};
use multa_geocode::Resolution;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ResolveBody {
  pub jurisdiction_id: i64,
  pub location:        String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveStatus {
  /// Already had a point; nothing was queried or written.
  Stored,
  Resolved,
  NeedsManual,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
  pub status:   ResolveStatus,
  pub judgment: LocationJudgment,
}

/// `POST /locations/resolve`: resolve one location and record the outcome.
pub async fn resolve<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<ResolveBody>,
) -> Result<Json<ResolveResponse>, ApiError>
where
  S: JudgmentStore + Clone,
{
  if normalize(&body.location).is_empty() {
    return Err(ApiError::BadRequest("location is empty".into()));
  }

  let resolution = state
    .resolver
    .resolve(&*state.store, body.jurisdiction_id, &body.location)
    .await?;
  let status = match &resolution {
    Resolution::Stored(judgment) => {
      return Ok(Json(ResolveResponse { status: ResolveStatus::Stored, judgment: judgment.clone() }));
    }
    Resolution::Resolved(_) => ResolveStatus::Resolved,
    Resolution::NeedsManual { .. } => ResolveStatus::NeedsManual,
  };

  let mut controller = state.controller.lock().await;
  let judgment = state
    .resolver
    .record(&*state.store, body.jurisdiction_id, &body.location, &resolution)
    .await?;
  controller.mark_dirty();

  Ok(Json(ResolveResponse { status, judgment }))
}
