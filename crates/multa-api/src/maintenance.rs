//! Handlers for `/maintenance` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/maintenance/reconcile` | Load then backfill; 409 if the store has unsaved work |
//! | `POST` | `/maintenance/export` | Write the export file |

use axum::{Json, extract::State};
use multa_core::store::{EntityCounts, JudgmentStore};
use multa_sync::{BackfillReport, LoadOutcome};
use serde::Serialize;
use tracing::info;

use crate::{AppState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
  pub load:     LoadOutcome,
  pub backfill: BackfillReport,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub exported: Option<EntityCounts>,
}

/// `POST /maintenance/reconcile`
pub async fn reconcile<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<ReconcileResponse>, ApiError>
where
  S: JudgmentStore + Clone,
{
  let mut controller = state.controller.lock().await;
  let result = controller.maintain().await;
  // Even a failed backfill may follow a completed load.
  state.cache.clear();
  let done = result?;

  info!(articles = done.classifier.article_count(), "swapping classifier snapshot");
  state.set_classifier(done.classifier);
  Ok(Json(ReconcileResponse {
    load:     done.load,
    backfill: done.backfill,
    exported: done.exported,
  }))
}

/// `POST /maintenance/export`
pub async fn export<S>(State(state): State<AppState<S>>) -> Result<Json<EntityCounts>, ApiError>
where
  S: JudgmentStore + Clone,
{
  let counts = state.controller.lock().await.store().await?;
  Ok(Json(counts))
}
