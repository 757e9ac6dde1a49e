//! Handlers for `/classify` endpoints.
//!
//! Both read the current classifier snapshot; neither writes.

use axum::{
  Json,
  extract::{Query, State},
};
use multa_classify::{SegmentSuggestions, Suggestion};
use multa_core::store::JudgmentStore;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ClassifyParams {
  pub text:      String,
  /// Minimum similarity in `[0, 1]`. Defaults to the server's threshold.
  pub threshold: Option<f64>,
}

impl ClassifyParams {
  fn threshold(&self, default: f64) -> Result<f64, ApiError> {
    match self.threshold {
      Some(t) if !(0.0..=1.0).contains(&t) => {
        Err(ApiError::BadRequest(format!("threshold {t} is outside [0, 1]")))
      }
      Some(t) => Ok(t),
      None => Ok(default),
    }
  }
}

/// `GET /classify/suggest?text=...[&threshold=...]`
pub async fn suggest<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ClassifyParams>,
) -> Result<Json<Vec<Suggestion>>, ApiError>
where
  S: JudgmentStore + Clone,
{
  let threshold = params.threshold(state.threshold)?;
  Ok(Json(state.classifier().suggest(&params.text, threshold)))
}

#[derive(Debug, Serialize)]
pub struct Breakdown {
  /// Whether splitting on commas finds better matches than the whole text.
  pub multi:    bool,
  pub segments: Vec<SegmentSuggestions>,
}

/// `GET /classify/breakdown?text=...[&threshold=...]`
pub async fn breakdown<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ClassifyParams>,
) -> Result<Json<Breakdown>, ApiError>
where
  S: JudgmentStore + Clone,
{
  let threshold = params.threshold(state.threshold)?;
  let classifier = state.classifier();
  Ok(Json(Breakdown {
    multi:    classifier.detect_multi_article(&params.text, threshold),
    segments: classifier.suggest_with_breakdown(&params.text, threshold),
  }))
}
