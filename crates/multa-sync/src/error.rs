//! Error type for `multa-sync`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The store holds more judgments of one kind than the export file; loading
  /// would discard them.
  #[error(
    "refusing to load: the store has {store} {entity} but the export file has {file}; \
     export before loading"
  )]
  UnsavedWork { entity: &'static str, store: u64, file: u64 },

  #[error("backfill requires a successful load first")]
  NotLoaded,

  #[error("core error: {0}")]
  Core(#[from] multa_core::Error),

  #[error("spatial error: {0}")]
  Spatial(#[from] multa_spatial::Error),

  #[error("classifier error: {0}")]
  Classify(#[from] multa_classify::error::Error),

  #[error("export file error: {0}")]
  Io(#[from] std::io::Error),

  #[error("export file is not valid json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("background task failed: {0}")]
  Join(#[from] tokio::task::JoinError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
