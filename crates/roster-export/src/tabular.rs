//! Generic tabular export: an ordered attribute/label mapping resolved once,
//! and a batched cursor producing one row of [`Value`]s per entry.

use std::{collections::VecDeque, future::Future, marker::PhantomData};

use chrono::NaiveDate;
use roster_core::date;

use crate::{
  Error, Result,
  resolver::DynamicAttribute,
  value::{Format, Value},
};

/// Rows are fetched from the source in batches of this many entries.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

// ─── Row specification ───────────────────────────────────────────────────────

/// Per-row context handed to accessors.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a, C> {
  pub format: Format,
  /// Reference date for anything that depends on being active.
  pub today:  NaiveDate,
  /// Export-wide data shared by all rows.
  pub shared: &'a C,
}

/// A named accessor producing one cell from an entry.
pub type Accessor<E, C> = fn(&E, &RowContext<'_, C>) -> Value;

/// How a kind of entry is turned into rows.
pub trait RowSpec {
  type Entry;
  /// Read-only data the accessors may consult, such as label registries.
  type Shared: Send + Sync;

  /// The accessor for a plain attribute, if the row knows it.
  fn accessor(attr: &str) -> Option<Accessor<Self::Entry, Self::Shared>>;

  /// Dynamic attribute families this row supports, in lookup order.
  fn dynamic_attributes() -> &'static [DynamicAttribute] { &[] }

  /// Resolve a dynamic attribute detected by [`RowSpec::dynamic_attributes`].
  fn resolve_dynamic(
    _entry: &Self::Entry,
    _kind: DynamicAttribute,
    _attr: &str,
    _ctx: &RowContext<'_, Self::Shared>,
  ) -> Option<String> {
    None
  }

  /// A label that replaces the human attribute name (`<attr>_label`).
  fn label(_attr: &str) -> Option<String> { None }

  /// Fallback label: `first_name` becomes `First name`.
  fn human_attribute(attr: &str) -> String {
    let spaced = attr.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
      Some(first) => first.to_uppercase().chain(chars).collect(),
      None => String::new(),
    }
  }
}

// ─── Columns ─────────────────────────────────────────────────────────────────

/// An attribute requested for export, optionally with its own label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
  pub key:   String,
  pub label: Option<String>,
}

impl Attribute {
  pub fn labelled(key: impl Into<String>, label: impl Into<String>) -> Self {
    Self { key: key.into(), label: Some(label.into()) }
  }
}

impl From<&str> for Attribute {
  fn from(key: &str) -> Self { Self { key: key.to_owned(), label: None } }
}

impl From<String> for Attribute {
  fn from(key: String) -> Self { Self { key, label: None } }
}

enum Source<E, C> {
  Field(Accessor<E, C>),
  Dynamic(DynamicAttribute),
}

struct Column<E, C> {
  key:    String,
  label:  String,
  source: Source<E, C>,
}

// ─── Batch sources ───────────────────────────────────────────────────────────

/// A finite, re-readable list of entries fetched page by page.
pub trait BatchSource: Send + Sync {
  type Item: Send;

  /// Entries `offset..offset + limit`. Fewer than `limit` entries means the
  /// end of the source was reached.
  fn fetch_batch(
    &self,
    offset: usize,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Self::Item>>> + Send + '_;
}

impl<T: Clone + Send + Sync> BatchSource for Vec<T> {
  type Item = T;

  async fn fetch_batch(&self, offset: usize, limit: usize) -> Result<Vec<T>> {
    Ok(self.iter().skip(offset).take(limit).cloned().collect())
  }
}

// ─── Export ──────────────────────────────────────────────────────────────────

/// An export of the entries of `S` described by row spec `R`.
pub struct TabularExport<R: RowSpec, S> {
  shared:     R::Shared,
  source:     S,
  columns:    Vec<Column<R::Entry, R::Shared>>,
  batch_size: usize,
  today:      NaiveDate,
  _row:       PhantomData<fn() -> R>,
}

impl<R, S> TabularExport<R, S>
where
  R: RowSpec,
  S: BatchSource<Item = R::Entry>,
{
  /// Resolve every attribute to a dynamic handler or a row accessor.
  /// Fails on the first attribute that has neither.
  pub fn new(
    shared: R::Shared,
    source: S,
    attributes: impl IntoIterator<Item = Attribute>,
  ) -> Result<Self> {
    let columns = attributes
      .into_iter()
      .map(|attr| {
        let dynamic = DynamicAttribute::detect(R::dynamic_attributes(), &attr.key);
        let source = match dynamic {
          Some(kind) => Source::Dynamic(kind),
          None => R::accessor(&attr.key)
            .map(Source::Field)
            .ok_or_else(|| Error::UnknownAttribute(attr.key.clone()))?,
        };
        let label = attr
          .label
          .or_else(|| R::label(&attr.key))
          .unwrap_or_else(|| R::human_attribute(&attr.key));
        Ok(Column { key: attr.key, label, source })
      })
      .collect::<Result<Vec<_>>>()?;

    tracing::debug!(columns = columns.len(), "prepared tabular export");
    Ok(Self {
      shared,
      source,
      columns,
      batch_size: DEFAULT_BATCH_SIZE,
      today: date::today(),
      _row: PhantomData,
    })
  }

  pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self> {
    if batch_size == 0 {
      return Err(Error::EmptyBatch);
    }
    self.batch_size = batch_size;
    Ok(self)
  }

  /// Evaluate date-dependent attributes against `today` instead of the clock.
  pub fn on(mut self, today: NaiveDate) -> Self {
    self.today = today;
    self
  }

  pub fn attributes(&self) -> Vec<&str> {
    self.columns.iter().map(|c| c.key.as_str()).collect()
  }

  pub fn labels(&self) -> Vec<&str> {
    self.columns.iter().map(|c| c.label.as_str()).collect()
  }

  /// One value per column for `entry`.
  pub fn values(&self, entry: &R::Entry, format: Format) -> Vec<Value> {
    let ctx = RowContext { format, today: self.today, shared: &self.shared };
    self
      .columns
      .iter()
      .map(|column| {
        let value = match &column.source {
          Source::Field(accessor) => accessor(entry, &ctx),
          Source::Dynamic(kind) => {
            Value::from(R::resolve_dynamic(entry, *kind, &column.key, &ctx))
          }
        };
        value.for_format(format)
      })
      .collect()
  }

  /// A fresh cursor over all rows. Every call starts from the beginning of
  /// the source.
  pub fn data_rows(&self, format: Format) -> Rows<'_, R, S> {
    Rows {
      export: self,
      format,
      offset: 0,
      buffer: VecDeque::new(),
      exhausted: false,
    }
  }

  /// Drain [`TabularExport::data_rows`] into memory.
  pub async fn collect_rows(&self, format: Format) -> Result<Vec<Vec<Value>>> {
    let mut rows = self.data_rows(format);
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
      out.push(row);
    }
    Ok(out)
  }
}

/// Cursor returned by [`TabularExport::data_rows`]. Holds at most one batch
/// of entries at a time.
pub struct Rows<'a, R: RowSpec, S> {
  export:    &'a TabularExport<R, S>,
  format:    Format,
  offset:    usize,
  buffer:    VecDeque<R::Entry>,
  exhausted: bool,
}

impl<R, S> Rows<'_, R, S>
where
  R: RowSpec,
  S: BatchSource<Item = R::Entry>,
{
  pub async fn next(&mut self) -> Result<Option<Vec<Value>>> {
    if self.buffer.is_empty() && !self.exhausted {
      let limit = self.export.batch_size;
      let batch = self.export.source.fetch_batch(self.offset, limit).await?;
      tracing::trace!(
        offset = self.offset,
        fetched = batch.len(),
        "fetched export batch"
      );
      self.exhausted = batch.len() < limit;
      self.offset += batch.len();
      self.buffer.extend(batch);
    }
    Ok(
      self
        .buffer
        .pop_front()
        .map(|entry| self.export.values(&entry, self.format)),
    )
  }
}
