//! Error types for `roster-core`.
//!
//! Validation problems are not errors: they are reported through
//! [`crate::Outcome::Invalid`]. The variants here abort an operation before
//! (or instead of) any mutation.

use thiserror::Error;
use uuid::Uuid;

use crate::{ability::Capability, invoice::InvoiceState};

#[derive(Debug, Error)]
pub enum Error {
  #[error("group not found: {0}")]
  GroupNotFound(Uuid),

  #[error("person not found: {0}")]
  PersonNotFound(Uuid),

  #[error("role not found: {0}")]
  RoleNotFound(Uuid),

  #[error("invoice not found: {0}")]
  InvoiceNotFound(Uuid),

  #[error("qualification kind not found: {0}")]
  QualificationKindNotFound(Uuid),

  #[error("unknown group type: {0:?}")]
  UnknownGroupType(String),

  #[error("not allowed to {capability} in group {group_id}")]
  Unauthorized {
    capability: Capability,
    group_id:   Uuid,
  },

  #[error("invoice cannot move from {from} to {to}")]
  InvalidTransition {
    from: InvoiceState,
    to:   InvoiceState,
  },

  #[error("unknown contact category: {0:?}")]
  UnknownContactCategory(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box a backend error into [`Error::Store`].
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
