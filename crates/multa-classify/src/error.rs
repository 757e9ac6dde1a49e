//! Error type for `multa-classify`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A judgment references an article that is not in the catalog.
  #[error("judgment for {description:?} references unknown article {article_id:?}")]
  UnknownArticle { description: String, article_id: String },

  #[error("batch line {line}: {message}")]
  Parse { line: usize, message: String },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
