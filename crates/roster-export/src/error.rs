//! Error types for `roster-export`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The attribute has neither a row accessor nor a dynamic handler.
  /// Raised while setting up an export, before any row is produced.
  #[error("unknown export attribute: {0:?}")]
  UnknownAttribute(String),

  #[error("batch size must be positive")]
  EmptyBatch,

  #[error("source error: {0}")]
  Source(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box a batch source failure into [`Error::Source`].
  pub fn fetch<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Source(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
