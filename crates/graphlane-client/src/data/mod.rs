//! Core data types for the graphlane client

pub mod codec;
pub mod config;
pub mod errors;
pub mod rows;
pub mod schema;
pub mod values;

pub use codec::{decode, decode_bool, encode, parse_uuid, parse_value, DecodeError, EncodeError};
pub use config::{ClientConfig, InsertRequestConfig, RequestConfig};
pub use errors::{ClientError, ClientResult, ErrorKind, RowKind, ValidationError};
pub use rows::{Edge, Node};
pub use schema::{Property, PropertyKind, Schema, IDENTITY_PROPERTIES};
pub use values::{PropertyValue, Values};
