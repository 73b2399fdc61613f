//! A DuckDB driver for a generic, row-oriented SQL client interface.
//!
//! DuckDB is an embedded columnar engine with prepared statements,
//! column-major results and explicit teardown. This crate adapts that model
//! to a prepare / bind / execute / fetch-rows client flow: statements are
//! scanned for positional and named placeholders, bound values are reconciled
//! against what the statement declares, results are materialized column-major
//! and served row by row through a lazy cache, and the connection tracks its
//! live cursors so closing tears everything down in order.
//!
//! ```no_run
//! use duckdb_driver::prelude::*;
//!
//! fn main() -> Result<(), DuckdbDriverError> {
//!     let driver = DuckdbDriver::new();
//!     driver.open(":memory:", "")?;
//!     let mut cursor = driver.create_cursor();
//!     cursor.prepare("SELECT CAST(? AS INTEGER) + 1")?;
//!     cursor.bind(RowValues::Int(41));
//!     cursor.execute()?;
//!     let row = cursor.fetch_row(0)?.unwrap();
//!     assert_eq!(row[0].as_int(), Some(42));
//!     Ok(())
//! }
//! ```

pub mod conversion;
pub mod cursor;
pub mod driver;
pub mod error;
pub mod escape;
pub mod options;
mod params;
mod placeholders;
pub mod types;

pub use cursor::DuckdbCursor;
pub use driver::{DuckdbDriver, NotificationHandler};
pub use error::{DuckdbDriverError, ErrorCategory, StructuredError};
pub use escape::{escape_identifier, is_identifier_escaped, strip_delimiters, IdentifierKind};
pub use options::ConnectOptions;
pub use types::{ColumnDescriptor, DriverFeature, RowValues, TableKind, ValueKind};

/// Common imports for driver users.
pub mod prelude {
    pub use crate::cursor::DuckdbCursor;
    pub use crate::driver::DuckdbDriver;
    pub use crate::error::{DuckdbDriverError, ErrorCategory, StructuredError};
    pub use crate::types::{ColumnDescriptor, DriverFeature, RowValues, TableKind, ValueKind};
}
