//! Handlers for the `/curation` queues, most-affected first.

use axum::{
  Json,
  extract::{Query, State},
};
use multa_core::store::{DescriptionQueueItem, JudgmentStore, LocationQueueItem};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct QueueParams {
  pub limit: Option<usize>,
}

/// `GET /curation/descriptions[?limit=...]`
pub async fn descriptions<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<QueueParams>,
) -> Result<Json<Vec<DescriptionQueueItem>>, ApiError>
where
  S: JudgmentStore + Clone,
{
  let queue = state
    .store
    .unjudged_descriptions(params.limit)
    .await
    .map_err(ApiError::internal)?;
  Ok(Json(queue))
}

/// `GET /curation/locations[?limit=...]`
pub async fn locations<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<QueueParams>,
) -> Result<Json<Vec<LocationQueueItem>>, ApiError>
where
  S: JudgmentStore + Clone,
{
  let queue = state
    .store
    .unresolved_locations(params.limit)
    .await
    .map_err(ApiError::internal)?;
  Ok(Json(queue))
}
