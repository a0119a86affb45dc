//! Error type for `roster-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] roster_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("invalid stored value: {0}")]
  Decode(String),

  /// An update or delete inside a batch matched no row. The whole batch was
  /// rolled back.
  #[error("no {table} row with id {id}")]
  RowNotFound {
    table: &'static str,
    id:    uuid::Uuid,
  },
}

impl Error {
  /// Unwrap errors raised inside a connection call back into [`Error`].
  pub(crate) fn from_call(e: tokio_rusqlite::Error) -> Self {
    match e {
      tokio_rusqlite::Error::Other(boxed) => match boxed.downcast::<Error>() {
        Ok(inner) => *inner,
        Err(other) => Self::Database(tokio_rusqlite::Error::Other(other)),
      },
      e => Self::Database(e),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
