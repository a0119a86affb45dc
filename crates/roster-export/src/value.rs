//! Cell values and output formats.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The rendering target of an export. Only affects how values are formatted,
/// never which columns are produced.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Format {
  Csv,
  #[default]
  Xlsx,
}

/// One cell of an export row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
  Empty,
  Text(String),
  Date(NaiveDate),
  Bool(bool),
}

impl Value {
  /// `Empty` for `None` and blank strings.
  pub fn text(s: Option<impl Into<String>>) -> Self {
    match s.map(Into::into) {
      Some(s) if !s.trim().is_empty() => Self::Text(s),
      _ => Self::Empty,
    }
  }

  pub fn is_empty(&self) -> bool { matches!(self, Self::Empty) }

  /// Adapt the value to `format`. Spreadsheets keep typed cells; CSV gets
  /// plain text.
  pub fn for_format(self, format: Format) -> Self {
    match (format, self) {
      (Format::Csv, Self::Date(d)) => Self::Text(d.format("%Y-%m-%d").to_string()),
      (Format::Csv, Self::Bool(b)) => {
        Self::Text(if b { "yes" } else { "no" }.to_owned())
      }
      (_, v) => v,
    }
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self { Self::text(Some(s)) }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self { Self::text(Some(s)) }
}

impl From<Option<String>> for Value {
  fn from(s: Option<String>) -> Self { Self::text(s) }
}

impl From<Option<NaiveDate>> for Value {
  fn from(d: Option<NaiveDate>) -> Self { d.map_or(Self::Empty, Self::Date) }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self { Self::Bool(b) }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Empty => Ok(()),
      Self::Text(s) => f.write_str(s),
      Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
      Self::Bool(b) => f.write_str(if *b { "yes" } else { "no" }),
    }
  }
}
