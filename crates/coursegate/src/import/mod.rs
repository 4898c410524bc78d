//! Bulk user import from spreadsheet exports.
//!
//! Header names vary between exports, so columns are located through an
//! ordered synonym table ([`fields::FIELD_SYNONYMS`]). A `labels` column drives
//! auto-enrollment through a [`LabelTable`].

pub mod dates;
pub mod fields;
pub mod labels;
pub mod pipeline;

pub use dates::parse_date;
pub use fields::{ColumnMap, Field, ImportRow};
pub use labels::LabelTable;
pub use pipeline::{unique_username, BulkImporter, ImportSummary};
