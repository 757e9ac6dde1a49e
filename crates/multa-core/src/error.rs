//! Error types for `multa-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("malformed cell id: {0:?}")]
  MalformedCell(String),

  #[error("unknown filter dimension: {0:?}")]
  UnknownFilter(String),

  #[error("invalid value for filter {key:?}: {value:?}")]
  InvalidFilterValue { key: String, value: String },

  #[error("coordinates out of bounds: ({lat}, {lng})")]
  OutOfBounds { lat: f64, lng: f64 },

  #[error("unknown article id: {0:?}")]
  UnknownArticle(String),

  #[error("unknown {kind} value: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
