//! Connection pool: host table, active set, leader discovery and routing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use graphlane_interfaces::{CallContext, Dialer, ErrorCode, GRAPH_NAME_KEY, PASSWORD_KEY, USER_KEY};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use super::connection::{Connection, NodeRole};
use super::graph_manager::GraphManager;
use crate::data::config::{ClientConfig, RequestConfig};
use crate::data::errors::{ClientError, ClientResult};

/// Label sent with liveness checks
pub const HELLO_LABEL: &str = "graphlane";

/// Connections keyed by host, remembering first-seen order
#[derive(Debug, Default)]
struct HostTable {
    by_host: HashMap<String, Arc<Connection>>,
    order: Vec<String>,
}

impl HostTable {
    fn get(&self, host: &str) -> Option<Arc<Connection>> {
        self.by_host.get(host).cloned()
    }

    /// Inserts `conn` unless its host is already present. Returns the
    /// connection to use and, on a race, the one that lost.
    fn insert(&mut self, conn: Arc<Connection>) -> (Arc<Connection>, Option<Arc<Connection>>) {
        if let Some(existing) = self.by_host.get(conn.host()) {
            return (Arc::clone(existing), Some(conn));
        }
        self.order.push(conn.host().to_string());
        self.by_host.insert(conn.host().to_string(), Arc::clone(&conn));
        (conn, None)
    }

    fn all(&self) -> Vec<Arc<Connection>> {
        self.order.iter().filter_map(|h| self.by_host.get(h).cloned()).collect()
    }

    fn drain(&mut self) -> Vec<Arc<Connection>> {
        let all = self.all();
        self.by_host.clear();
        self.order.clear();
        all
    }
}

/// Pool of links to every known cluster node.
///
/// One instance is shared (usually as `Arc<ConnectionPool>`) by every caller.
/// The active set is swapped atomically as a whole, so readers always see
/// either the previous or the next complete set.
pub struct ConnectionPool {
    config: ClientConfig,
    dialer: Arc<dyn Dialer>,
    hosts: RwLock<HostTable>,
    graph_manager: GraphManager,
    active: RwLock<Arc<Vec<Arc<Connection>>>>,
    next_active: AtomicUsize,
    raft: AtomicBool,
    topology_lock: tokio::sync::Mutex<()>,
    monitor: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl ConnectionPool {
    /// Creates a pool: dials every seed host, checks liveness and discovers
    /// the leader of the default graph.
    ///
    /// Unreachable hosts and a failed leader lookup are logged, not fatal.
    #[instrument(skip(config, dialer), fields(hosts = config.hosts.len()))]
    pub async fn new(config: ClientConfig, dialer: Arc<dyn Dialer>) -> ClientResult<Self> {
        config.validate()?;

        let pool = Self {
            config,
            dialer,
            hosts: RwLock::new(HostTable::default()),
            graph_manager: GraphManager::new(),
            active: RwLock::new(Arc::new(Vec::new())),
            next_active: AtomicUsize::new(0),
            raft: AtomicBool::new(false),
            topology_lock: tokio::sync::Mutex::new(()),
            monitor: Mutex::new(None),
            closed: AtomicBool::new(false),
        };

        pool.create_connections().await;
        let active = pool.refresh_active_connections().await?;
        if active == 0 {
            warn!("No host answered the liveness check");
        }

        let graph = pool.config.default_graph.clone();
        if let Err(err) = pool.refresh_cluster_topology(&graph).await {
            warn!(graph = %graph, error = %err, "Initial topology refresh failed");
        }

        info!(active, raft = pool.is_raft(), "Connection pool ready");
        Ok(pool)
    }

    /// Creates a shared pool and starts the health monitor when the
    /// configuration sets an interval.
    pub async fn connect(config: ClientConfig, dialer: Arc<dyn Dialer>) -> ClientResult<Arc<Self>> {
        let interval = config.health_check_interval();
        let pool = Arc::new(Self::new(config, dialer).await?);
        if let Some(interval) = interval {
            let handle = pool.spawn_health_monitor(interval);
            *pool.monitor.lock() = Some(handle);
        }
        Ok(pool)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn graph_manager(&self) -> &GraphManager {
        &self.graph_manager
    }

    /// Whether the last leader lookup found a raft cluster
    pub fn is_raft(&self) -> bool {
        self.raft.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> ClientResult<()> {
        if self.is_closed() {
            return Err(ClientError::PoolClosed);
        }
        Ok(())
    }

    /// Every known connection in first-seen order
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.hosts.read().all()
    }

    pub fn connection(&self, host: &str) -> Option<Arc<Connection>> {
        self.hosts.read().get(host)
    }

    /// Current active set
    pub fn active_connections(&self) -> Arc<Vec<Arc<Connection>>> {
        Arc::clone(&*self.active.read())
    }

    /// Dials every configured host not yet in the table, concurrently.
    ///
    /// Returns the failures; each is also logged.
    pub async fn create_connections(&self) -> Vec<ClientError> {
        let options = self.config.dial_options();
        let pending: Vec<&String> = self
            .config
            .hosts
            .iter()
            .filter(|host| self.connection(host).is_none())
            .collect();

        let dials = pending
            .iter()
            .map(|host| Connection::dial(self.dialer.as_ref(), host, &options));

        let mut failures = Vec::new();
        for result in join_all(dials).await {
            match result {
                Ok(conn) => {
                    let (_, duplicate) = self.hosts.write().insert(Arc::new(conn));
                    if let Some(duplicate) = duplicate {
                        self.discard(duplicate).await;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "Failed to connect to host");
                    failures.push(err);
                }
            }
        }
        failures
    }

    /// Returns the connection for `host`, dialing it on first use
    pub async fn get_or_create_connection(&self, host: &str) -> ClientResult<Arc<Connection>> {
        if let Some(conn) = self.connection(host) {
            return Ok(conn);
        }
        self.ensure_open()?;

        let conn = Connection::dial(self.dialer.as_ref(), host, &self.config.dial_options()).await?;
        let (conn, duplicate) = self.hosts.write().insert(Arc::new(conn));
        if let Some(duplicate) = duplicate {
            self.discard(duplicate).await;
        }
        Ok(conn)
    }

    async fn discard(&self, conn: Arc<Connection>) {
        if let Err(err) = conn.close().await {
            debug!(host = conn.host(), error = %err, "Failed to close duplicate connection");
        }
    }

    /// Checks every known connection concurrently and swaps in the new active set.
    ///
    /// A check counts as alive when it answers before the liveness timeout with an
    /// absent or success status. Returns the size of the new set.
    #[instrument(skip(self))]
    pub async fn refresh_active_connections(&self) -> ClientResult<usize> {
        self.ensure_open()?;

        let checks = self.connections().into_iter().map(|conn| async move {
            let ctx = self.context(&self.config.default_graph, self.config.liveness_timeout());
            let alive = match conn.say_hello(&ctx, HELLO_LABEL).await {
                Ok(reply) => reply.status.as_ref().map_or(true, |s| s.code.is_success()),
                Err(err) => {
                    debug!(host = conn.host(), error = %err, "Liveness check failed");
                    false
                }
            };
            conn.set_active(alive);
            (conn, alive)
        });

        let active: Vec<Arc<Connection>> = join_all(checks)
            .await
            .into_iter()
            .filter_map(|(conn, alive)| alive.then_some(conn))
            .collect();

        let count = active.len();
        *self.active.write() = Arc::new(active);
        debug!(active = count, "Refreshed active connections");
        Ok(count)
    }

    /// Discovers the leader and followers of `graph`.
    ///
    /// Starts at the cached leader, or any connection when none is known, and
    /// follows redirects until a node answers with the cluster layout. More
    /// than `max_redirects` redirects fail with [`ClientError::TooManyRedirects`].
    #[instrument(skip(self))]
    pub async fn refresh_cluster_topology(&self, graph: &str) -> ClientResult<()> {
        self.ensure_open()?;
        let _guard = self.topology_lock.lock().await;

        let (mut conn, mut from_cache) = match self.graph_manager.get_leader(graph) {
            Some(leader) => (leader, true),
            None => (self.any_connection()?, false),
        };
        let mut redirects = 0usize;

        loop {
            let ctx = self.context(graph, self.config.timeout());
            let reply = match conn.get_leader(&ctx, graph).await {
                Ok(reply) => reply,
                Err(err) if from_cache => {
                    // A stale leader gets one retry through another node
                    from_cache = false;
                    warn!(graph, host = conn.host(), error = %err, "Cached leader unreachable, asking another node");
                    self.graph_manager.clear_leader(graph);
                    conn = self.any_connection_except(conn.host())?;
                    continue;
                }
                Err(err) => {
                    return Err(ClientError::Topology {
                        graph: graph.to_string(),
                        code: None,
                        message: err.to_string(),
                    })
                }
            };
            let status = reply.status;

            match status.code {
                ErrorCode::NotRaftMode => {
                    self.raft.store(false, Ordering::Release);
                    conn.set_role(NodeRole::Leader);
                    self.graph_manager.set_leader(graph, &conn);
                    self.graph_manager.clear_followers(graph);
                    info!(graph, leader = conn.host(), "Standalone node, using it as leader");
                    return Ok(());
                }
                ErrorCode::RaftRedirect => {
                    self.raft.store(true, Ordering::Release);
                    let target = status.cluster_info.map(|info| info.redirect).unwrap_or_default();
                    if target.is_empty() {
                        return Err(ClientError::Topology {
                            graph: graph.to_string(),
                            code: Some(ErrorCode::RaftRedirect),
                            message: format!("{} redirected without an address", conn.host()),
                        });
                    }

                    redirects += 1;
                    if redirects > self.config.max_redirects {
                        warn!(graph, limit = self.config.max_redirects, "Leader redirect limit reached");
                        return Err(ClientError::TooManyRedirects {
                            graph: graph.to_string(),
                            limit: self.config.max_redirects,
                        });
                    }

                    debug!(graph, from = conn.host(), to = %target, "Following leader redirect");
                    let next = self.get_or_create_connection(&target).await?;
                    self.graph_manager.set_leader(graph, &next);
                    conn = next;
                }
                ErrorCode::Success => {
                    self.raft.store(true, Ordering::Release);
                    let cluster = status.cluster_info.unwrap_or_default();

                    let leader = if cluster.leader_address.is_empty() || cluster.leader_address == conn.host() {
                        Arc::clone(&conn)
                    } else {
                        self.get_or_create_connection(&cluster.leader_address).await?
                    };
                    leader.set_role(NodeRole::Leader);
                    self.graph_manager.set_leader(graph, &leader);
                    self.graph_manager.clear_followers(graph);

                    for follower in &cluster.followers {
                        let follower_conn = match self.get_or_create_connection(&follower.address).await {
                            Ok(c) => c,
                            Err(err) => {
                                warn!(graph, host = %follower.address, error = %err, "Skipping unreachable follower");
                                continue;
                            }
                        };
                        follower_conn.set_active(follower.active);
                        follower_conn.set_follower_role(follower.role);
                        self.graph_manager.add_follower(graph, &follower_conn);
                    }

                    info!(
                        graph,
                        leader = leader.host(),
                        followers = cluster.followers.len(),
                        redirects,
                        "Refreshed cluster topology"
                    );
                    return Ok(());
                }
                code => {
                    warn!(graph, host = conn.host(), ?code, message = %status.message, "Leader lookup failed");
                    return Err(ClientError::Topology {
                        graph: graph.to_string(),
                        code: Some(code),
                        message: status.message,
                    });
                }
            }
        }
    }

    /// Picks the connection for a call.
    ///
    /// Leader-bound calls (consistency mode or `use_leader`) go to the graph
    /// leader, discovering it first when unknown. Everything else rotates over
    /// the active set.
    pub async fn select_connection(&self, request: Option<&RequestConfig>) -> ClientResult<Arc<Connection>> {
        self.ensure_open()?;
        let use_leader = self.config.consistency || request.map_or(false, |r| r.use_leader);
        if use_leader {
            let graph = self.graph_for(request).to_string();
            self.leader_connection(&graph).await
        } else {
            self.next_active()
        }
    }

    /// Leader of `graph`, refreshing the topology when none is cached
    pub async fn leader_connection(&self, graph: &str) -> ClientResult<Arc<Connection>> {
        if let Some(leader) = self.graph_manager.get_leader(graph) {
            return Ok(leader);
        }
        self.refresh_cluster_topology(graph).await?;
        self.graph_manager
            .get_leader(graph)
            .ok_or_else(|| ClientError::Topology {
                graph: graph.to_string(),
                code: None,
                message: "no leader known after refresh".to_string(),
            })
    }

    /// Next analytics node of `graph` (the default graph when `None`)
    pub async fn select_analytics_connection(&self, graph: Option<&str>) -> ClientResult<Arc<Connection>> {
        self.ensure_open()?;
        let graph = graph.unwrap_or(&self.config.default_graph);
        if !self.graph_manager.has_leader(graph) {
            self.refresh_cluster_topology(graph).await?;
        }
        self.graph_manager.get_analytics_connection(graph)
    }

    /// Round-robin pick from the active set
    pub fn next_active(&self) -> ClientResult<Arc<Connection>> {
        let active = self.active_connections();
        if active.is_empty() {
            return Err(ClientError::NoActiveConnection);
        }
        let tick = self.next_active.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::clone(&active[tick % active.len()]))
    }

    fn any_connection(&self) -> ClientResult<Arc<Connection>> {
        self.next_active()
            .or_else(|_| self.connections().into_iter().next().ok_or(ClientError::NoActiveConnection))
    }

    /// First active connection not bound to `host`, falling back to any known one
    fn any_connection_except(&self, host: &str) -> ClientResult<Arc<Connection>> {
        let active = self.active_connections();
        let known = self.connections();
        active
            .iter()
            .chain(known.iter())
            .find(|conn| conn.host() != host)
            .cloned()
            .ok_or(ClientError::NoActiveConnection)
    }

    fn graph_for<'a>(&'a self, request: Option<&'a RequestConfig>) -> &'a str {
        request
            .and_then(|r| r.graph.as_deref())
            .unwrap_or(&self.config.default_graph)
    }

    /// Context for one call: request timeout or the client default, plus the
    /// graph name and credentials as metadata.
    pub fn build_call_context(&self, request: Option<&RequestConfig>) -> CallContext {
        let timeout = request
            .and_then(|r| r.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.config.timeout());
        self.context(self.graph_for(request), timeout)
    }

    fn context(&self, graph: &str, timeout: Duration) -> CallContext {
        CallContext::with_timeout(timeout)
            .with_metadata(GRAPH_NAME_KEY, graph)
            .with_metadata(USER_KEY, &self.config.username)
            .with_metadata(PASSWORD_KEY, &self.config.password)
    }

    /// Starts a task that periodically redials missing seeds, re-checks
    /// liveness and refreshes every known graph's topology.
    ///
    /// The task holds only a weak reference and stops once the pool is closed or dropped.
    pub fn spawn_health_monitor(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick fires immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(pool) = weak.upgrade() else { break };
                if pool.is_closed() {
                    break;
                }
                pool.health_check().await;
            }
            debug!("Health monitor stopped");
        })
    }

    async fn health_check(&self) {
        self.create_connections().await;
        if let Err(err) = self.refresh_active_connections().await {
            warn!(error = %err, "Active connection refresh failed");
            return;
        }
        for graph in self.graph_manager.graphs() {
            if let Err(err) = self.refresh_cluster_topology(&graph).await {
                warn!(graph = %graph, error = %err, "Topology refresh failed");
            }
        }
    }

    /// Closes every connection. Safe to call more than once; later calls and
    /// any selection after the first close see [`ClientError::PoolClosed`]
    /// or succeed as no-ops.
    pub async fn close(&self) -> ClientResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(monitor) = self.monitor.lock().take() {
            monitor.abort();
        }

        let connections = self.hosts.write().drain();
        *self.active.write() = Arc::new(Vec::new());
        self.graph_manager.clear();

        let results = join_all(connections.iter().map(|conn| conn.close())).await;
        for (conn, result) in connections.iter().zip(results) {
            if let Err(err) = result {
                warn!(host = conn.host(), error = %err, "Error closing connection");
            }
        }

        info!(closed = connections.len(), "Connection pool closed");
        Ok(())
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("hosts", &self.config.hosts)
            .field("active", &self.active_connections().len())
            .field("raft", &self.is_raft())
            .field("closed", &self.is_closed())
            .finish()
    }
}
