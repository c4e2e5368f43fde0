//! Access layer: typed values, the row codec, and logical record
//! identity.
//!
//! - **Value / DataType**: type-safe representation of column values
//! - **row**: schema-driven serialization with a null bitmap
//! - **RecordId / TupleId**: logical handles and physical locations
//! - **RecordIndex**: the per-table logical-ID → location map

pub mod index;
pub mod row;
pub mod tuple;
pub mod value;

pub use index::RecordIndex;
pub use row::{deserialize_row, serialize_row, RowError, RowResult};
pub use tuple::{RecordId, TupleId};
pub use value::{DataType, Value};
