use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use graphlane_interfaces::{
    CallContext, ClusterInfo, DbType, DialOptions, Dialer, FollowerInfo, GetLeaderReply, GetLeaderRequest, GraphRpc,
    HelloReply, HelloRequest, InsertEdgesRequest, InsertNodesRequest, InsertReply, InsertStatistics, ErrorCode,
    ListSchemaReply, ListSchemaRequest, PropertyDef, PropertyType, RpcError, RpcResult, SchemaDef, Status,
};
use parking_lot::Mutex;

/// RPC methods counted by [`FakeCluster`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Dial,
    Hello,
    GetLeader,
    ListSchemas,
    InsertNodes,
    InsertEdges,
    Close,
}

#[derive(Debug, Clone, Default)]
enum LeaderMode {
    #[default]
    Standalone,
    Raft {
        leader: String,
        followers: Vec<FollowerInfo>,
    },
}

#[derive(Debug, Default)]
struct NodeState {
    unreachable: bool,
    hanging: bool,
    hello_status: Option<Status>,
}

#[derive(Debug, Default)]
struct ClusterState {
    nodes: HashMap<String, NodeState>,
    mode: LeaderMode,
    leader_overrides: HashMap<String, Status>,
    schemas: HashMap<DbType, Vec<SchemaDef>>,
    node_inserts: Vec<(String, InsertNodesRequest)>,
    edge_inserts: Vec<(String, InsertEdgesRequest)>,
    row_errors: HashMap<String, BTreeMap<u32, i32>>,
    insert_status: HashMap<String, Status>,
    calls: HashMap<(String, Method), usize>,
    next_uuid: u64,
}

impl ClusterState {
    fn node(&mut self, host: &str) -> &mut NodeState {
        self.nodes.entry(host.to_string()).or_default()
    }

    fn leader_status(&self, host: &str) -> Status {
        if let Some(status) = self.leader_overrides.get(host) {
            return status.clone();
        }
        match &self.mode {
            LeaderMode::Standalone => Status::error(ErrorCode::NotRaftMode, "not in raft mode"),
            LeaderMode::Raft { leader, followers } if leader == host => Status {
                code: ErrorCode::Success,
                message: String::new(),
                cluster_info: Some(ClusterInfo {
                    redirect: String::new(),
                    leader_address: leader.clone(),
                    followers: followers.clone(),
                }),
            },
            LeaderMode::Raft { leader, .. } => redirect_status(leader),
        }
    }

    fn insert_reply(&mut self, schema: &str, ids: Vec<String>, silent: bool) -> InsertReply {
        let rows = ids.len();
        if let Some(status) = self.insert_status.get(schema) {
            return InsertReply {
                status: status.clone(),
                ..Default::default()
            };
        }

        let error_items = self
            .row_errors
            .get(schema)
            .map(|errors| {
                errors
                    .iter()
                    .filter(|(pos, _)| (**pos as usize) < rows)
                    .map(|(pos, code)| (*pos, *code))
                    .collect()
            })
            .unwrap_or_default();

        let mut reply = InsertReply {
            status: Status::success(),
            error_items,
            statistics: InsertStatistics {
                total_cost: 2 * rows as i64,
                engine_cost: rows as i64,
            },
            ..Default::default()
        };
        if !silent {
            for id in ids {
                self.next_uuid += 1;
                reply.uuids.push(self.next_uuid);
                reply.ids.push(if id.is_empty() { format!("auto-{}", self.next_uuid) } else { id });
            }
        }
        reply
    }
}

fn redirect_status(target: &str) -> Status {
    Status {
        code: ErrorCode::RaftRedirect,
        message: String::new(),
        cluster_info: Some(ClusterInfo {
            redirect: target.to_string(),
            ..Default::default()
        }),
    }
}

/// In-memory cluster for tests.
///
/// Any host can be dialed unless marked unreachable. Without a leader the
/// cluster answers leader lookups with `NotRaftMode`. Cloning shares state.
#[derive(Debug, Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raft mode with `leader` and readable, active followers
    pub fn with_leader(self, leader: &str, followers: &[&str]) -> Self {
        let followers = followers
            .iter()
            .map(|address| FollowerInfo {
                address: address.to_string(),
                role: FollowerInfo::ROLE_READABLE,
                active: true,
            })
            .collect();
        self.set_leader(leader, followers);
        self
    }

    /// Raft mode with explicit follower entries
    pub fn with_followers(self, leader: &str, followers: Vec<FollowerInfo>) -> Self {
        self.set_leader(leader, followers);
        self
    }

    pub fn with_schema(self, db_type: DbType, name: &str, properties: &[(&str, PropertyType)]) -> Self {
        let def = SchemaDef {
            name: name.to_string(),
            description: String::new(),
            properties: properties
                .iter()
                .map(|(name, ty)| PropertyDef {
                    name: name.to_string(),
                    property_type: *ty,
                    ignored: false,
                })
                .collect(),
        };
        self.state.lock().schemas.entry(db_type).or_default().push(def);
        self
    }

    pub fn set_leader(&self, leader: &str, followers: Vec<FollowerInfo>) {
        self.state.lock().mode = LeaderMode::Raft {
            leader: leader.to_string(),
            followers,
        };
    }

    /// Makes `host` answer leader lookups with a redirect to `target`
    pub fn set_redirect(&self, host: &str, target: &str) {
        self.state
            .lock()
            .leader_overrides
            .insert(host.to_string(), redirect_status(target));
    }

    /// Makes `host` answer leader lookups with `status`
    pub fn set_leader_status(&self, host: &str, status: Status) {
        self.state.lock().leader_overrides.insert(host.to_string(), status);
    }

    pub fn set_unreachable(&self, host: &str, unreachable: bool) {
        self.state.lock().node(host).unreachable = unreachable;
    }

    /// Makes every call to `host` wait forever
    pub fn set_hanging(&self, host: &str, hanging: bool) {
        self.state.lock().node(host).hanging = hanging;
    }

    pub fn set_hello_status(&self, host: &str, status: Option<Status>) {
        self.state.lock().node(host).hello_status = status;
    }

    /// Reports `errors` (row position to code) for inserts into `schema`
    pub fn set_row_errors(&self, schema: &str, errors: BTreeMap<u32, i32>) {
        self.state.lock().row_errors.insert(schema.to_string(), errors);
    }

    /// Replies to inserts into `schema` with `status`
    pub fn set_insert_status(&self, schema: &str, status: Status) {
        self.state.lock().insert_status.insert(schema.to_string(), status);
    }

    pub fn calls(&self, host: &str, method: Method) -> usize {
        self.state
            .lock()
            .calls
            .get(&(host.to_string(), method))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self, method: Method) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|((_, m), _)| *m == method)
            .map(|(_, n)| n)
            .sum()
    }

    pub fn close_calls(&self, host: &str) -> usize {
        self.calls(host, Method::Close)
    }

    /// Node insert requests in arrival order, with the host that received each
    pub fn node_inserts(&self) -> Vec<(String, InsertNodesRequest)> {
        self.state.lock().node_inserts.clone()
    }

    /// Edge insert requests in arrival order, with the host that received each
    pub fn edge_inserts(&self) -> Vec<(String, InsertEdgesRequest)> {
        self.state.lock().edge_inserts.clone()
    }

    /// A stub bound to `host`
    pub fn stub(&self, host: &str) -> Arc<dyn GraphRpc> {
        Arc::new(FakeNode {
            host: host.to_string(),
            cluster: self.clone(),
        })
    }

    pub fn dialer(&self) -> Arc<dyn Dialer> {
        Arc::new(FakeDialer { cluster: self.clone() })
    }

    /// Counts a call; true when the node hangs
    fn record(&self, host: &str, method: Method) -> bool {
        let mut state = self.state.lock();
        *state.calls.entry((host.to_string(), method)).or_default() += 1;
        state.node(host).hanging
    }
}

/// Stub answering from [`FakeCluster`] state
#[derive(Debug)]
pub struct FakeNode {
    host: String,
    cluster: FakeCluster,
}

impl FakeNode {
    async fn enter(&self, method: Method) {
        if self.cluster.record(&self.host, method) {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl GraphRpc for FakeNode {
    async fn say_hello(&self, _ctx: &CallContext, request: HelloRequest) -> RpcResult<HelloReply> {
        self.enter(Method::Hello).await;
        let status = self.cluster.state.lock().node(&self.host).hello_status.clone();
        Ok(HelloReply {
            status,
            message: format!("{} from {}", request.name, self.host),
        })
    }

    async fn get_leader(&self, _ctx: &CallContext, _request: GetLeaderRequest) -> RpcResult<GetLeaderReply> {
        self.enter(Method::GetLeader).await;
        let status = self.cluster.state.lock().leader_status(&self.host);
        Ok(GetLeaderReply { status })
    }

    async fn list_schemas(&self, _ctx: &CallContext, request: ListSchemaRequest) -> RpcResult<ListSchemaReply> {
        self.enter(Method::ListSchemas).await;
        let schemas = self
            .cluster
            .state
            .lock()
            .schemas
            .get(&request.db_type)
            .cloned()
            .unwrap_or_default();
        Ok(ListSchemaReply {
            status: Status::success(),
            schemas,
        })
    }

    async fn insert_nodes(&self, _ctx: &CallContext, request: InsertNodesRequest) -> RpcResult<InsertReply> {
        self.enter(Method::InsertNodes).await;
        let schema = request
            .node_table
            .schemas
            .first()
            .map(|s| s.name.clone())
            .unwrap_or_default();
        let ids = request.node_table.node_rows.iter().map(|r| r.id.clone()).collect();

        let mut state = self.cluster.state.lock();
        let reply = state.insert_reply(&schema, ids, request.silent);
        state.node_inserts.push((self.host.clone(), request));
        Ok(reply)
    }

    async fn insert_edges(&self, _ctx: &CallContext, request: InsertEdgesRequest) -> RpcResult<InsertReply> {
        self.enter(Method::InsertEdges).await;
        let schema = request
            .edge_table
            .schemas
            .first()
            .map(|s| s.name.clone())
            .unwrap_or_default();
        let ids = request
            .edge_table
            .edge_rows
            .iter()
            .map(|r| format!("{}->{}", r.from_id, r.to_id))
            .collect();

        let mut state = self.cluster.state.lock();
        let reply = state.insert_reply(&schema, ids, request.silent);
        state.edge_inserts.push((self.host.clone(), request));
        Ok(reply)
    }

    async fn close(&self) -> RpcResult<()> {
        self.cluster.record(&self.host, Method::Close);
        Ok(())
    }
}

/// Dialer handing out [`FakeNode`] stubs
#[derive(Debug)]
pub struct FakeDialer {
    cluster: FakeCluster,
}

#[async_trait]
impl Dialer for FakeDialer {
    async fn dial(&self, host: &str, _options: &DialOptions) -> RpcResult<Arc<dyn GraphRpc>> {
        self.cluster.record(host, Method::Dial);
        if self.cluster.state.lock().node(host).unreachable {
            return Err(RpcError::Unavailable(format!("{} is unreachable", host)));
        }
        Ok(self.cluster.stub(host))
    }
}
