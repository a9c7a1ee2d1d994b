//! Raw candidate tables.
//!
//! A [`RawTable`] is whatever the caller uploaded: named columns, one row per
//! candidate, cells that may be numeric, empty or free text. Nothing here knows
//! about the feature schema; schema alignment happens later in the pipeline.

pub mod cell;
pub mod table;

pub use cell::Cell;
pub use table::{RawTable, TableError};

/// Column holding the candidate identifier in KOI exports.
pub const IDENTIFIER_COLUMN: &str = "kepoi_name";
