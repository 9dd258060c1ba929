//! Cluster awareness: per-node connections, per-graph topology and the pool that routes calls

pub mod connection;
pub mod graph_manager;
pub mod pool;

pub use connection::{Connection, NodeRole};
pub use graph_manager::{GraphClusterInfo, GraphManager};
pub use pool::{ConnectionPool, HELLO_LABEL};
