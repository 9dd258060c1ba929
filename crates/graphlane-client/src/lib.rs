//! Graphlane client
//!
//! Cluster-aware access to a replicated graph database: a connection pool
//! that tracks node liveness and per-graph leaders, routes each call to the
//! right node, and a batch insert pipeline that serializes rows concurrently
//! and dispatches them per schema.

// Core modules
pub mod cluster;
pub mod data;
pub mod services;

// Testing utilities
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export key types for convenient usage
pub use cluster::{Connection, ConnectionPool, GraphManager, NodeRole};
pub use data::codec::{decode, encode, parse_value, DecodeError, EncodeError};
pub use data::config::{ClientConfig, InsertRequestConfig, RequestConfig};
pub use data::errors::{ClientError, ClientResult, ErrorKind, RowKind, ValidationError};
pub use data::rows::{Edge, Node};
pub use data::schema::{Property, PropertyKind, Schema};
pub use data::values::{PropertyValue, Values};
pub use services::insert::{BatchInsertResponse, InsertResponse, RowFailure, Statistic};
pub use services::GraphClient;

// Re-export the RPC contract
pub use graphlane_interfaces as rpc;

/// Initialize tracing for the client
///
/// Honors `RUST_LOG`; falls back to `info`, or `debug` when `debug` is set.
pub fn init_tracing(debug: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Another subscriber may already be installed, e.g. by the host application
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}
