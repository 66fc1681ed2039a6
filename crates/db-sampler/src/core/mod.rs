//! Core abstractions for database-agnostic sampling.
//!
//! - [`value`]: SQL value representation
//! - [`row`]: Ordered rows as produced by a source
//! - [`traits`]: Source and destination contracts implemented by drivers
//! - [`identifier`]: Identifier validation and quoting

pub mod identifier;
pub mod row;
pub mod traits;
pub mod value;

pub use row::Row;
pub use traits::{ColumnFilter, DestinationDatabase, FetchRequest, OrderBy, SourceDatabase};
pub use value::{SqlNullType, SqlValue};
