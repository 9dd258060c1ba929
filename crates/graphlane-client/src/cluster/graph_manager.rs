//! Per-graph cluster records: leader, followers and analytics nodes.
//!
//! Records hold [`Weak`] references; the pool's host table owns every
//! connection, so a dropped connection simply disappears from the records.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::connection::Connection;
use crate::data::errors::{ClientError, ClientResult};

/// Cluster layout of one graph
#[derive(Debug, Clone, Default)]
pub struct GraphClusterInfo {
    leader: Option<Weak<Connection>>,
    followers: Vec<Weak<Connection>>,
    analytics: Vec<Weak<Connection>>,
    last_analytics_index: usize,
}

impl GraphClusterInfo {
    pub fn leader(&self) -> Option<Arc<Connection>> {
        self.leader.as_ref().and_then(Weak::upgrade)
    }

    pub fn followers(&self) -> Vec<Arc<Connection>> {
        self.followers.iter().filter_map(Weak::upgrade).collect()
    }

    pub fn analytics_nodes(&self) -> Vec<Arc<Connection>> {
        self.analytics.iter().filter_map(Weak::upgrade).collect()
    }

    fn next_analytics(&mut self) -> Option<Arc<Connection>> {
        let nodes = self.analytics_nodes();
        if nodes.is_empty() {
            return None;
        }
        let index = self.last_analytics_index % nodes.len();
        self.last_analytics_index = index + 1;
        Some(Arc::clone(&nodes[index]))
    }
}

/// Graph name to cluster record map.
///
/// A graph absent from the map behaves exactly like one with no known leader.
#[derive(Debug, Default)]
pub struct GraphManager {
    graphs: RwLock<HashMap<String, GraphClusterInfo>>,
}

impl GraphManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_leader(&self, graph: &str, leader: &Arc<Connection>) {
        let mut graphs = self.graphs.write();
        graphs.entry(graph.to_string()).or_default().leader = Some(Arc::downgrade(leader));
    }

    pub fn get_leader(&self, graph: &str) -> Option<Arc<Connection>> {
        self.graphs.read().get(graph).and_then(GraphClusterInfo::leader)
    }

    /// Drops the cached leader of `graph`, keeping the graph known
    pub fn clear_leader(&self, graph: &str) {
        if let Some(info) = self.graphs.write().get_mut(graph) {
            info.leader = None;
        }
    }

    pub fn has_leader(&self, graph: &str) -> bool {
        self.get_leader(graph).is_some()
    }

    /// Forgets the followers and analytics nodes of `graph`
    pub fn clear_followers(&self, graph: &str) {
        if let Some(info) = self.graphs.write().get_mut(graph) {
            info.followers.clear();
            info.analytics.clear();
            info.last_analytics_index = 0;
        }
    }

    /// Records a follower; analytics-capable followers also join the analytics rotation
    pub fn add_follower(&self, graph: &str, follower: &Arc<Connection>) {
        let mut graphs = self.graphs.write();
        let info = graphs.entry(graph.to_string()).or_default();
        info.followers.push(Arc::downgrade(follower));
        if follower.is_analytics() {
            info.analytics.push(Arc::downgrade(follower));
        }
    }

    pub fn followers(&self, graph: &str) -> Vec<Arc<Connection>> {
        self.graphs
            .read()
            .get(graph)
            .map(GraphClusterInfo::followers)
            .unwrap_or_default()
    }

    /// Next analytics node of `graph` in round-robin order
    pub fn get_analytics_connection(&self, graph: &str) -> ClientResult<Arc<Connection>> {
        self.graphs
            .write()
            .get_mut(graph)
            .and_then(GraphClusterInfo::next_analytics)
            .ok_or_else(|| ClientError::NoAnalyticsNode(graph.to_string()))
    }

    /// Copy of the record for `graph`
    pub fn snapshot(&self, graph: &str) -> Option<GraphClusterInfo> {
        self.graphs.read().get(graph).cloned()
    }

    pub fn graphs(&self) -> Vec<String> {
        self.graphs.read().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.graphs.write().clear();
    }
}
