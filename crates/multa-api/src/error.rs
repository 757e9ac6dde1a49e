//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The operation would discard unsaved work, or ran out of order.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub(crate) fn internal<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Internal(Box::new(e))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Internal(e) => {
        error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

// ─── Conversions ─────────────────────────────────────────────────────────────

impl From<multa_core::Error> for ApiError {
  fn from(e: multa_core::Error) -> Self {
    use multa_core::Error as E;
    match e {
      E::MalformedCell(_)
      | E::UnknownFilter(_)
      | E::InvalidFilterValue { .. }
      | E::OutOfBounds { .. }
      | E::UnknownArticle(_)
      | E::UnknownVariant { .. } => ApiError::BadRequest(e.to_string()),
      E::Serialization(_) => ApiError::internal(e),
    }
  }
}

impl From<multa_spatial::Error> for ApiError {
  fn from(e: multa_spatial::Error) -> Self {
    match e {
      multa_spatial::Error::Core(inner) => inner.into(),
      multa_spatial::Error::UnknownResolution { .. } => ApiError::BadRequest(e.to_string()),
      other => ApiError::internal(other),
    }
  }
}

impl From<multa_geocode::Error> for ApiError {
  fn from(e: multa_geocode::Error) -> Self {
    match e {
      multa_geocode::Error::Core(inner) => inner.into(),
      multa_geocode::Error::Spatial(inner) => inner.into(),
      other => ApiError::internal(other),
    }
  }
}

impl From<multa_sync::Error> for ApiError {
  fn from(e: multa_sync::Error) -> Self {
    match e {
      multa_sync::Error::UnsavedWork { .. } | multa_sync::Error::NotLoaded => {
        ApiError::Conflict(e.to_string())
      }
      other => ApiError::internal(other),
    }
  }
}
