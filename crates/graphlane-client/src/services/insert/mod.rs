//! Batch insert pipeline: concurrent serialization, schema routing and result merging

pub mod response;
pub mod router;
pub mod serializer;

pub use response::{BatchInsertResponse, InsertResponse, RowFailure, Statistic};
pub use serializer::{serialize_rows, BatchRow, SerializedRows, WireTable};
