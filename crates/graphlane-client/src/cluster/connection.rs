//! A single cluster node and the stub bound to it.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use graphlane_interfaces::{
    CallContext, DialOptions, Dialer, FollowerInfo, GetLeaderReply, GetLeaderRequest, GraphRpc, HelloReply,
    HelloRequest, InsertEdgesRequest, InsertNodesRequest, InsertReply, ListSchemaReply, ListSchemaRequest, RpcError,
};
use parking_lot::RwLock;
use tracing::{debug, instrument};

use crate::data::errors::{ClientError, ClientResult};

/// Role a node plays for the graphs it serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Leader,
    Follower,
    Unknown,
}

/// Link to one node.
///
/// Shared as `Arc<Connection>` between the pool's host table, the active set
/// and per-graph cluster records. Liveness, role and capability bits are
/// updated in place by topology and liveness refreshes.
pub struct Connection {
    host: String,
    stub: Arc<dyn GraphRpc>,
    active: AtomicBool,
    role: RwLock<NodeRole>,
    capabilities: AtomicU32,
    closed: AtomicBool,
}

impl Connection {
    pub fn new(host: impl Into<String>, stub: Arc<dyn GraphRpc>) -> Self {
        Self {
            host: host.into(),
            stub,
            active: AtomicBool::new(false),
            role: RwLock::new(NodeRole::Unknown),
            capabilities: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Dials `host`, bounded by the connect timeout in `options`
    #[instrument(skip(dialer, options))]
    pub async fn dial(dialer: &dyn Dialer, host: &str, options: &DialOptions) -> ClientResult<Self> {
        let stub = match tokio::time::timeout(options.connect_timeout, dialer.dial(host, options)).await {
            Ok(Ok(stub)) => stub,
            Ok(Err(source)) => {
                return Err(ClientError::Connectivity {
                    host: host.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(ClientError::Connectivity {
                    host: host.to_string(),
                    source: RpcError::DeadlineExceeded,
                })
            }
        };
        debug!(host, "Dialed node");
        Ok(Self::new(host, stub))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub fn role(&self) -> NodeRole {
        *self.role.read()
    }

    pub fn set_role(&self, role: NodeRole) {
        *self.role.write() = role;
    }

    /// Applies a follower role bitmask as reported by the leader
    pub fn set_follower_role(&self, bits: u32) {
        self.set_role(NodeRole::Follower);
        self.capabilities.store(bits, Ordering::Release);
    }

    pub fn is_readable(&self) -> bool {
        self.capabilities.load(Ordering::Acquire) & FollowerInfo::ROLE_READABLE != 0
    }

    pub fn is_analytics(&self) -> bool {
        self.capabilities.load(Ordering::Acquire) & FollowerInfo::ROLE_ANALYTICS != 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> ClientResult<()> {
        if self.is_closed() {
            return Err(self.rpc_error(RpcError::Closed));
        }
        Ok(())
    }

    fn rpc_error(&self, source: RpcError) -> ClientError {
        ClientError::Rpc {
            host: self.host.clone(),
            source,
        }
    }

    /// Liveness check echoing `label`
    pub async fn say_hello(&self, ctx: &CallContext, label: &str) -> ClientResult<HelloReply> {
        self.ensure_open()?;
        let request = HelloRequest { name: label.to_string() };
        ctx.run(self.stub.say_hello(ctx, request))
            .await
            .map_err(|e| self.rpc_error(e))
    }

    pub async fn get_leader(&self, ctx: &CallContext, graph: &str) -> ClientResult<GetLeaderReply> {
        self.ensure_open()?;
        let request = GetLeaderRequest {
            graph_name: graph.to_string(),
        };
        ctx.run(self.stub.get_leader(ctx, request))
            .await
            .map_err(|e| self.rpc_error(e))
    }

    pub async fn list_schemas(&self, ctx: &CallContext, request: ListSchemaRequest) -> ClientResult<ListSchemaReply> {
        self.ensure_open()?;
        ctx.run(self.stub.list_schemas(ctx, request))
            .await
            .map_err(|e| self.rpc_error(e))
    }

    pub async fn insert_nodes(&self, ctx: &CallContext, request: InsertNodesRequest) -> ClientResult<InsertReply> {
        self.ensure_open()?;
        ctx.run(self.stub.insert_nodes(ctx, request))
            .await
            .map_err(|e| self.rpc_error(e))
    }

    pub async fn insert_edges(&self, ctx: &CallContext, request: InsertEdgesRequest) -> ClientResult<InsertReply> {
        self.ensure_open()?;
        ctx.run(self.stub.insert_edges(ctx, request))
            .await
            .map_err(|e| self.rpc_error(e))
    }

    /// Releases the transport. Closing twice is a no-op.
    pub async fn close(&self) -> ClientResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.set_active(false);
        self.stub.close().await.map_err(|e| self.rpc_error(e))
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.host)
            .field("active", &self.is_active())
            .field("role", &self.role())
            .field("capabilities", &self.capabilities.load(Ordering::Relaxed))
            .field("closed", &self.is_closed())
            .finish()
    }
}
