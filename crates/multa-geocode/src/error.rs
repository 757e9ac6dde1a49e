//! Error types for `multa-geocode`.

use thiserror::Error;

/// A failure of the resolver itself. Provider failures are not errors at
/// this level; they turn the item into a needs-manual resolution.
#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] multa_core::Error),

  #[error("spatial error: {0}")]
  Spatial(#[from] multa_spatial::Error),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("invalid gazetteer entry: {0}")]
  Gazetteer(String),

  #[error("http client error: {0}")]
  Client(#[from] reqwest::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }
}

/// Why a single provider produced nothing usable.
#[derive(Debug, Error)]
pub enum ProviderError {
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("server returned {status}: {body}")]
  Server { status: u16, body: String },

  #[error("provider status {status}: {message}")]
  Status { status: String, message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
