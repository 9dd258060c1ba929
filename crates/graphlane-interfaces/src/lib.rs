//! Graphlane Interfaces
//!
//! This crate defines the contract between the Graphlane client and a graph
//! cluster node: the request/reply shapes, the [`GraphRpc`] stub trait that a
//! generated transport implements, and the [`Dialer`] that opens one stub per host.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Call context carried by every remote call
pub mod context;

/// Transport-level errors
pub mod error;

/// Wire types and stub traits
pub mod rpc;

/// Re-export key types for convenient usage
pub use context::{CallContext, GRAPH_NAME_KEY, PASSWORD_KEY, USER_KEY};
pub use error::{RpcError, RpcResult};
pub use rpc::{
    ClusterInfo, DbType, DialOptions, Dialer, EdgeRow, EdgeTable, ErrorCode, FollowerInfo,
    GetLeaderReply, GetLeaderRequest, GraphRpc, HelloReply, HelloRequest, InsertEdgesRequest,
    InsertNodesRequest, InsertReply, InsertStatistics, InsertType, ListSchemaReply,
    ListSchemaRequest, NodeRow, NodeTable, PropertyDef, PropertyType, SchemaDef, Status,
};
