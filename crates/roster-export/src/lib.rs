//! Tabular exports for Roster.
//!
//! An export is an ordered list of attributes, each resolved once to either a
//! named row accessor or a dynamic attribute family (`phone_number_*`,
//! `qualification_kind_*`, ...). Rows are produced lazily from a
//! [`tabular::BatchSource`] in fixed-size batches. Rendering the rows to CSV
//! or spreadsheet files is left to the caller.
//!
//! ```rust,ignore
//! let export = people_export(&store, &registry, group_id, PeopleList::Full, today, 1000).await?;
//! let mut rows = export.data_rows(Format::Csv);
//! while let Some(row) = rows.next().await? { /* ... */ }
//! ```

pub mod error;
pub mod people;
pub mod resolver;
pub mod tabular;
pub mod value;

pub use error::{Error, Result};
pub use people::{PeopleList, PersonRow, people_export};
pub use tabular::{Attribute, BatchSource, TabularExport};
pub use value::{Format, Value};
