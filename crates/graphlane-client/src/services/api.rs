use std::sync::Arc;

use graphlane_interfaces::{DbType, Dialer, EdgeTable, NodeTable};
use tracing::{debug, instrument};

use super::insert::response::{BatchInsertResponse, InsertResponse};
use super::insert::router;
use super::insert::serializer::WireTable;
use crate::cluster::pool::{ConnectionPool, HELLO_LABEL};
use crate::data::config::{ClientConfig, InsertRequestConfig, RequestConfig};
use crate::data::errors::{ClientError, ClientResult};
use crate::data::rows::{Edge, Node};
use crate::data::schema::Schema;

/// Client for a graph cluster.
///
/// Cheap to clone; clones share one [`ConnectionPool`].
#[derive(Debug, Clone)]
pub struct GraphClient {
    pool: Arc<ConnectionPool>,
}

impl GraphClient {
    /// Creates a client and its pool, starting the health monitor when configured.
    pub async fn connect(config: ClientConfig, dialer: Arc<dyn Dialer>) -> ClientResult<Self> {
        let pool = ConnectionPool::connect(config, dialer).await?;
        Ok(Self { pool })
    }

    /// Wraps an existing pool
    pub fn from_pool(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Round-trips a liveness check through the next active node.
    ///
    /// Returns true when the node echoed the hello label back.
    pub async fn test(&self) -> ClientResult<bool> {
        let conn = self.pool.select_connection(None).await?;
        let ctx = self.pool.build_call_context(None);
        let reply = conn.say_hello(&ctx, HELLO_LABEL).await?;
        if let Some(status) = reply.status.filter(|s| !s.code.is_success()) {
            return Err(ClientError::RemoteStatus {
                code: status.code,
                message: status.message,
            });
        }
        debug!(host = conn.host(), message = %reply.message, "Hello answered");
        Ok(reply.message.contains(HELLO_LABEL))
    }

    /// Lists node or edge schemas of the request's graph
    pub async fn list_schemas(&self, db_type: DbType, request: Option<&RequestConfig>) -> ClientResult<Vec<Schema>> {
        router::list_schemas(&self.pool, db_type, request).await
    }

    /// Looks up one schema by name
    pub async fn get_schema(
        &self,
        db_type: DbType,
        name: &str,
        request: Option<&RequestConfig>,
    ) -> ClientResult<Schema> {
        self.list_schemas(db_type, request)
            .await?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ClientError::SchemaNotFound {
                db_type,
                name: name.to_string(),
            })
    }

    /// Sends an already serialized node table to the leader.
    ///
    /// A non-success server status fails the call.
    #[instrument(skip_all, fields(rows = table.node_rows.len()))]
    pub async fn insert_nodes_batch(
        &self,
        table: NodeTable,
        config: &InsertRequestConfig,
    ) -> ClientResult<InsertResponse> {
        let response = router::send_table(&self.pool, WireTable::Nodes(table), config).await?;
        router::ensure_success(response)
    }

    /// Sends an already serialized edge table to the leader
    #[instrument(skip_all, fields(rows = table.edge_rows.len()))]
    pub async fn insert_edges_batch(
        &self,
        table: EdgeTable,
        config: &InsertRequestConfig,
    ) -> ClientResult<InsertResponse> {
        let response = router::send_table(&self.pool, WireTable::Edges(table), config).await?;
        router::ensure_success(response)
    }

    /// Inserts nodes that all belong to `schema`.
    ///
    /// A `None` row, a missing property or an unencodable value fails the
    /// call before anything is sent; so does a non-success server status.
    pub async fn insert_nodes_batch_by_schema<I, R>(
        &self,
        schema: &Schema,
        rows: I,
        config: &InsertRequestConfig,
    ) -> ClientResult<InsertResponse>
    where
        I: IntoIterator<Item = R>,
        R: Into<Option<Node>>,
    {
        let rows: Vec<Option<Node>> = rows.into_iter().map(Into::into).collect();
        router::insert_by_schema(&self.pool, schema, rows, config).await
    }

    /// Inserts edges that all belong to `schema`. See [`Self::insert_nodes_batch_by_schema`].
    pub async fn insert_edges_batch_by_schema<I, R>(
        &self,
        schema: &Schema,
        rows: I,
        config: &InsertRequestConfig,
    ) -> ClientResult<InsertResponse>
    where
        I: IntoIterator<Item = R>,
        R: Into<Option<Edge>>,
    {
        let rows: Vec<Option<Edge>> = rows.into_iter().map(Into::into).collect();
        router::insert_by_schema(&self.pool, schema, rows, config).await
    }

    /// Inserts nodes of any mix of schemas, grouped by each row's schema name
    pub async fn insert_nodes_batch_auto(
        &self,
        nodes: Vec<Node>,
        config: &InsertRequestConfig,
    ) -> ClientResult<BatchInsertResponse> {
        router::insert_auto(&self.pool, nodes, config).await
    }

    /// Inserts edges of any mix of schemas, grouped by each row's schema name
    pub async fn insert_edges_batch_auto(
        &self,
        edges: Vec<Edge>,
        config: &InsertRequestConfig,
    ) -> ClientResult<BatchInsertResponse> {
        router::insert_auto(&self.pool, edges, config).await
    }

    /// Closes the pool and every connection
    pub async fn close(&self) -> ClientResult<()> {
        self.pool.close().await
    }
}
