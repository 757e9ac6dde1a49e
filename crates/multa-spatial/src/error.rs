//! Error type for `multa-spatial`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] multa_core::Error),

  #[error("invalid resolutions: {0}")]
  InvalidResolutions(String),

  #[error("invalid map budget: {0}")]
  InvalidBudget(String),

  /// The requested cell is not at one of the configured resolutions.
  #[error("cell {cell:?} is at unconfigured resolution {resolution}")]
  UnknownResolution { cell: String, resolution: u8 },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
