//! Field-level validation errors and the outcome of a mutating operation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field name used for errors that do not belong to a single attribute.
pub const BASE: &str = "base";

/// A set of validation messages keyed by attribute name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Errors(BTreeMap<String, Vec<String>>);

impl Errors {
  pub fn new() -> Self { Self::default() }

  pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
    self.0.entry(field.into()).or_default().push(message.into());
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  /// Total number of messages across all fields.
  pub fn len(&self) -> usize { self.0.values().map(Vec::len).sum() }

  /// Messages recorded for `field`; empty when there are none.
  pub fn on(&self, field: &str) -> &[String] {
    self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .0
      .iter()
      .flat_map(|(f, ms)| ms.iter().map(move |m| (f.as_str(), m.as_str())))
  }

  pub fn merge(&mut self, other: Errors) {
    for (field, messages) in other.0 {
      self.0.entry(field).or_default().extend(messages);
    }
  }

  /// `Applied(value)` when empty, `Invalid(self)` otherwise.
  pub fn into_outcome<T>(self, value: T) -> Outcome<T> {
    if self.is_empty() {
      Outcome::Applied(value)
    } else {
      Outcome::Invalid(self)
    }
  }
}

/// The result of a mutating operation that passed authorisation.
///
/// `Invalid` carries the field-level errors for redisplay; nothing was
/// written. Hard failures (missing records, denied capabilities, store
/// errors) travel through [`crate::Error`] instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum Outcome<T> {
  Applied(T),
  Invalid(Errors),
}

impl<T> Outcome<T> {
  pub fn is_applied(&self) -> bool { matches!(self, Self::Applied(_)) }

  pub fn applied(self) -> Option<T> {
    match self {
      Self::Applied(v) => Some(v),
      Self::Invalid(_) => None,
    }
  }

  pub fn errors(&self) -> Option<&Errors> {
    match self {
      Self::Applied(_) => None,
      Self::Invalid(e) => Some(e),
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
    match self {
      Self::Applied(v) => Outcome::Applied(f(v)),
      Self::Invalid(e) => Outcome::Invalid(e),
    }
  }
}
