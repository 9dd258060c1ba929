//! Request and reply shapes of the graph cluster RPC service, and the stub traits.
//!
//! Property values travel as opaque byte strings; their layout is owned by the
//! client's codec. Everything else here mirrors what a node sends and expects.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::CallContext;
use crate::error::RpcResult;

/// Status codes a node reports in its replies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The call succeeded
    #[default]
    Success,
    /// Generic failure
    Failed,
    /// A request parameter was rejected
    ParamError,
    /// Storage layer failure
    BaseDbError,
    /// Query engine failure
    EngineError,
    /// Node-level failure
    SystemError,
    /// The contacted node is not the leader; the reply names the leader
    RaftRedirect,
    /// The cluster has no leader yet
    RaftLeaderNotYetElected,
    /// Consensus log failure
    RaftLogError,
    /// Query text rejected
    UqlError,
    /// The node runs standalone, without a consensus layer
    NotRaftMode,
    /// No follower can serve the request
    RaftNoAvailableFollowers,
    /// No analytics node can serve the request
    RaftNoAvailableAlgoServers,
    /// The credentials lack a privilege
    PermissionDenied,
    /// A row id already exists
    DuplicateId,
    /// A code this client does not know
    Unknown(i32),
}

impl ErrorCode {
    /// Maps the numeric wire code
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ErrorCode::Success,
            1 => ErrorCode::Failed,
            2 => ErrorCode::ParamError,
            3 => ErrorCode::BaseDbError,
            4 => ErrorCode::EngineError,
            5 => ErrorCode::SystemError,
            6 => ErrorCode::RaftRedirect,
            7 => ErrorCode::RaftLeaderNotYetElected,
            8 => ErrorCode::RaftLogError,
            9 => ErrorCode::UqlError,
            10 => ErrorCode::NotRaftMode,
            11 => ErrorCode::RaftNoAvailableFollowers,
            12 => ErrorCode::RaftNoAvailableAlgoServers,
            13 => ErrorCode::PermissionDenied,
            14 => ErrorCode::DuplicateId,
            other => ErrorCode::Unknown(other),
        }
    }

    /// Numeric wire code
    pub fn code(&self) -> i32 {
        match self {
            ErrorCode::Success => 0,
            ErrorCode::Failed => 1,
            ErrorCode::ParamError => 2,
            ErrorCode::BaseDbError => 3,
            ErrorCode::EngineError => 4,
            ErrorCode::SystemError => 5,
            ErrorCode::RaftRedirect => 6,
            ErrorCode::RaftLeaderNotYetElected => 7,
            ErrorCode::RaftLogError => 8,
            ErrorCode::UqlError => 9,
            ErrorCode::NotRaftMode => 10,
            ErrorCode::RaftNoAvailableFollowers => 11,
            ErrorCode::RaftNoAvailableAlgoServers => 12,
            ErrorCode::PermissionDenied => 13,
            ErrorCode::DuplicateId => 14,
            ErrorCode::Unknown(code) => *code,
        }
    }

    /// Whether this is [`ErrorCode::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }
}

/// Status block attached to every reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Outcome of the call
    pub code: ErrorCode,

    /// Server-provided message, empty on success
    #[serde(default)]
    pub message: String,

    /// Cluster layout, present on leader lookups
    #[serde(default)]
    pub cluster_info: Option<ClusterInfo>,
}

impl Status {
    /// A success status without cluster information
    pub fn success() -> Self {
        Self::default()
    }

    /// A failure status with a message
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cluster_info: None,
        }
    }
}

/// Cluster layout reported by a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Leader address when the reply is a redirect
    #[serde(default)]
    pub redirect: String,

    /// Authoritative leader address
    #[serde(default)]
    pub leader_address: String,

    /// Followers known to the leader
    #[serde(default)]
    pub followers: Vec<FollowerInfo>,
}

/// One follower entry in [`ClusterInfo`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowerInfo {
    /// Host address of the follower
    pub address: String,

    /// Role bitmask, see [`FollowerInfo::ROLE_READABLE`] and [`FollowerInfo::ROLE_ANALYTICS`]
    pub role: u32,

    /// Whether the leader considers the follower healthy
    pub active: bool,
}

impl FollowerInfo {
    /// The follower serves reads
    pub const ROLE_READABLE: u32 = 1;
    /// The follower runs analytics workloads
    pub const ROLE_ANALYTICS: u32 = 2;

    /// Whether the role carries the readable bit
    pub fn is_readable(&self) -> bool {
        self.role & Self::ROLE_READABLE != 0
    }

    /// Whether the role carries the analytics bit
    pub fn is_analytics(&self) -> bool {
        self.role & Self::ROLE_ANALYTICS != 0
    }
}

/// Liveness check request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloRequest {
    /// Label echoed back by the node
    pub name: String,
}

/// Liveness check reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HelloReply {
    /// Absent status is treated as success
    #[serde(default)]
    pub status: Option<Status>,

    /// Echo of the request label
    #[serde(default)]
    pub message: String,
}

/// Leader lookup request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLeaderRequest {
    /// Graph whose leader is requested
    pub graph_name: String,
}

/// Leader lookup reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetLeaderReply {
    /// Carries the redirect address or the cluster layout
    pub status: Status,
}

/// Kind of entity a schema describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DbType {
    /// Node schemas
    Node,
    /// Edge schemas
    Edge,
}

/// Declared type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    /// No type assigned
    Unset,
    /// Signed 32-bit integer
    Int32,
    /// Unsigned 32-bit integer
    UInt32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 64-bit integer
    UInt64,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// UTF-8 string
    String,
    /// Calendar date and time
    Datetime,
    /// Seconds since the Unix epoch
    Timestamp,
}

/// Schema catalog request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSchemaRequest {
    /// Graph to list schemas of
    pub graph_name: String,
    /// Node or edge schemas
    pub db_type: DbType,
}

/// Schema catalog reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListSchemaReply {
    /// Outcome of the call
    pub status: Status,
    /// Schemas of the requested kind
    #[serde(default)]
    pub schemas: Vec<SchemaDef>,
}

/// Schema definition as sent on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDef {
    /// Schema name
    pub name: String,
    /// Optional description
    #[serde(default)]
    pub description: String,
    /// Properties in declaration order
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
}

/// Property definition as sent on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    /// Property name
    pub name: String,
    /// Declared type
    pub property_type: PropertyType,
    /// Whether inserts skip this property
    #[serde(default)]
    pub ignored: bool,
}

/// Serialised node row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRow {
    /// Caller-assigned id, may be empty
    pub id: String,
    /// Server uuid, zero when unassigned
    pub uuid: u64,
    /// Schema the row belongs to
    pub schema_name: String,
    /// Encoded property values, in table schema property order
    pub values: Vec<Vec<u8>>,
}

/// Serialised edge row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRow {
    /// Server uuid, zero when unassigned
    pub uuid: u64,
    /// Start node id
    pub from_id: String,
    /// Start node uuid
    pub from_uuid: u64,
    /// End node id
    pub to_id: String,
    /// End node uuid
    pub to_uuid: u64,
    /// Schema the row belongs to
    pub schema_name: String,
    /// Encoded property values, in table schema property order
    pub values: Vec<Vec<u8>>,
}

/// Node rows together with the schema header describing their values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTable {
    /// Schema headers
    pub schemas: Vec<SchemaDef>,
    /// Rows
    pub node_rows: Vec<NodeRow>,
}

/// Edge rows together with the schema header describing their values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeTable {
    /// Schema headers
    pub schemas: Vec<SchemaDef>,
    /// Rows
    pub edge_rows: Vec<EdgeRow>,
}

/// How an insert treats existing rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertType {
    /// Fail rows whose id exists
    #[default]
    Normal,
    /// Replace rows whose id exists
    Overwrite,
    /// Update rows whose id exists, insert the rest
    Upsert,
}

/// Batch node insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertNodesRequest {
    /// Target graph
    pub graph_name: String,
    /// Rows to insert
    pub node_table: NodeTable,
    /// Insert mode
    pub insert_type: InsertType,
    /// Suppress returned ids
    pub silent: bool,
}

/// Batch edge insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertEdgesRequest {
    /// Target graph
    pub graph_name: String,
    /// Rows to insert
    pub edge_table: EdgeTable,
    /// Insert mode
    pub insert_type: InsertType,
    /// Create missing endpoint nodes
    pub create_node_if_not_exist: bool,
    /// Suppress returned ids
    pub silent: bool,
}

/// Timing figures reported by an insert, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertStatistics {
    /// Wall time spent by the node
    pub total_cost: i64,
    /// Time spent inside the engine
    pub engine_cost: i64,
}

/// Batch insert reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertReply {
    /// Outcome of the call
    pub status: Status,
    /// Ids of inserted rows, empty when silent
    #[serde(default)]
    pub ids: Vec<String>,
    /// Uuids of inserted rows, empty when silent
    #[serde(default)]
    pub uuids: Vec<u64>,
    /// Row position within the batch to the error code for that row
    #[serde(default)]
    pub error_items: BTreeMap<u32, i32>,
    /// Timing figures
    #[serde(default)]
    pub statistics: InsertStatistics,
}

/// Options applied when dialing a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialOptions {
    /// Certificate file for TLS; plain transport when absent
    pub tls_certificate: Option<PathBuf>,
    /// Upper bound on establishing the link
    pub connect_timeout: Duration,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            tls_certificate: None,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Contract for a stub bound to one cluster node.
///
/// Implementations are generated transports; the client never looks past this trait.
#[async_trait]
pub trait GraphRpc: Send + Sync {
    /// Contract: lightweight liveness check. The node echoes `request.name` in `message`.
    async fn say_hello(&self, ctx: &CallContext, request: HelloRequest) -> RpcResult<HelloReply>;

    /// Contract: reports the leader for a graph.
    /// - `Success` carries `cluster_info.leader_address` and the followers.
    /// - `RaftRedirect` carries `cluster_info.redirect`, the node the caller should ask instead.
    /// - `NotRaftMode` means the node is standalone.
    async fn get_leader(&self, ctx: &CallContext, request: GetLeaderRequest) -> RpcResult<GetLeaderReply>;

    /// Contract: lists node or edge schemas of a graph.
    async fn list_schemas(&self, ctx: &CallContext, request: ListSchemaRequest) -> RpcResult<ListSchemaReply>;

    /// Contract: inserts a node table. Row-level failures are reported in `error_items`.
    async fn insert_nodes(&self, ctx: &CallContext, request: InsertNodesRequest) -> RpcResult<InsertReply>;

    /// Contract: inserts an edge table. Row-level failures are reported in `error_items`.
    async fn insert_edges(&self, ctx: &CallContext, request: InsertEdgesRequest) -> RpcResult<InsertReply>;

    /// Contract: releases the underlying transport. Later calls fail with `RpcError::Closed`.
    async fn close(&self) -> RpcResult<()>;
}

/// Opens stubs to cluster nodes
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Contract: establishes a link to `host` within `options.connect_timeout`.
    async fn dial(&self, host: &str, options: &DialOptions) -> RpcResult<Arc<dyn GraphRpc>>;
}
