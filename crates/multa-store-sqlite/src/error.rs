//! Error type for `multa-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] multa_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A judgment references an article that is not in the catalog.
  #[error("unknown article id: {0:?}")]
  UnknownArticle(String),

  /// The text key normalizes to the empty string.
  #[error("empty judgment key")]
  EmptyKey,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
