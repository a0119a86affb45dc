//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use roster_core::{Errors, Outcome, validation::BASE};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  /// Field-level validation errors, rendered as `{"errors": {...}}`.
  #[error("validation failed")]
  Invalid(Errors),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  fn invalid_on(field: &str, message: impl Into<String>) -> Self {
    let mut errors = Errors::new();
    errors.add(field, message);
    Self::Invalid(errors)
  }
}

impl From<roster_core::Error> for ApiError {
  fn from(e: roster_core::Error) -> Self {
    use roster_core::Error as E;
    match e {
      E::GroupNotFound(_)
      | E::PersonNotFound(_)
      | E::RoleNotFound(_)
      | E::InvoiceNotFound(_)
      | E::QualificationKindNotFound(_) => Self::NotFound(e.to_string()),
      E::Unauthorized { .. } => Self::Forbidden(e.to_string()),
      E::InvalidTransition { .. } => Self::invalid_on(BASE, e.to_string()),
      E::UnknownGroupType(_) => Self::invalid_on("group_type", "is not a known group type"),
      E::UnknownContactCategory(_) | E::Serialization(_) | E::Store(_) => {
        Self::Store(Box::new(e))
      }
    }
  }
}

impl From<roster_export::Error> for ApiError {
  fn from(e: roster_export::Error) -> Self {
    use roster_export::Error as E;
    match e {
      E::UnknownAttribute(_) | E::EmptyBatch => Self::BadRequest(e.to_string()),
      E::Source(source) => Self::Store(source),
    }
  }
}

/// The applied value, or its validation errors as an [`ApiError::Invalid`].
pub fn applied<T>(outcome: Outcome<T>) -> Result<T, ApiError> {
  match outcome {
    Outcome::Applied(value) => Ok(value),
    Outcome::Invalid(errors) => Err(ApiError::Invalid(errors)),
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      ApiError::Invalid(errors) => {
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "errors": errors })))
          .into_response();
      }
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
