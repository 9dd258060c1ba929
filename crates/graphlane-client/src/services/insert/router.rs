//! Schema grouping and dispatch of batch inserts.

use std::collections::HashMap;
use std::sync::Arc;

use graphlane_interfaces::{DbType, InsertEdgesRequest, InsertNodesRequest, ListSchemaRequest};
use tracing::{debug, info, instrument, warn};

use super::response::{BatchInsertResponse, InsertResponse, RowFailure};
use super::serializer::{serialize_rows, BatchRow, WireTable};
use crate::cluster::pool::ConnectionPool;
use crate::data::config::{InsertRequestConfig, RequestConfig};
use crate::data::errors::{ClientError, ClientResult};
use crate::data::schema::Schema;

/// Rows sharing a schema, each with its index in the caller's input
struct SchemaGroup<R> {
    name: String,
    rows: Vec<(usize, Option<R>)>,
}

impl<R> SchemaGroup<R> {
    fn indices(&self) -> Vec<usize> {
        self.rows.iter().map(|(index, _)| *index).collect()
    }
}

/// Splits rows by schema name, keeping first-appearance order of schemas and
/// input order within each group.
fn group_by_schema<R: BatchRow>(rows: Vec<R>) -> Vec<SchemaGroup<R>> {
    let mut groups: Vec<SchemaGroup<R>> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (index, row) in rows.into_iter().enumerate() {
        let position = match positions.get(row.schema_name()) {
            Some(position) => *position,
            None => {
                let name = row.schema_name().to_string();
                positions.insert(name.clone(), groups.len());
                groups.push(SchemaGroup { name, rows: Vec::new() });
                groups.len() - 1
            }
        };
        groups[position].rows.push((index, Some(row)));
    }
    groups
}

/// Fetches the schema catalog of one kind
pub(crate) async fn list_schemas(
    pool: &ConnectionPool,
    db_type: DbType,
    request: Option<&RequestConfig>,
) -> ClientResult<Vec<Schema>> {
    let conn = pool.select_connection(request).await?;
    let ctx = pool.build_call_context(request);
    let graph_name = ctx.graph_name().unwrap_or_default().to_string();

    let reply = conn.list_schemas(&ctx, ListSchemaRequest { graph_name, db_type }).await?;
    if !reply.status.code.is_success() {
        return Err(ClientError::RemoteStatus {
            code: reply.status.code,
            message: reply.status.message,
        });
    }
    Ok(reply
        .schemas
        .into_iter()
        .map(|def| Schema::from_wire(def, db_type))
        .collect())
}

/// Sends a prebuilt table to the leader of the target graph
pub(crate) async fn send_table(
    pool: &ConnectionPool,
    table: WireTable,
    config: &InsertRequestConfig,
) -> ClientResult<InsertResponse> {
    let request = config.request.clone().with_leader();
    let conn = pool.select_connection(Some(&request)).await?;
    let ctx = pool.build_call_context(Some(&request));
    let graph_name = ctx.graph_name().unwrap_or_default().to_string();
    let rows = table.len();

    let reply = match table {
        WireTable::Nodes(node_table) => {
            conn.insert_nodes(
                &ctx,
                InsertNodesRequest {
                    graph_name,
                    node_table,
                    insert_type: config.insert_type,
                    silent: config.silent,
                },
            )
            .await?
        }
        WireTable::Edges(edge_table) => {
            conn.insert_edges(
                &ctx,
                InsertEdgesRequest {
                    graph_name,
                    edge_table,
                    insert_type: config.insert_type,
                    create_node_if_not_exist: config.create_node_if_not_exist,
                    silent: config.silent,
                },
            )
            .await?
        }
    };

    debug!(host = conn.host(), rows, code = ?reply.status.code, "Insert batch sent");
    Ok(reply.into())
}

/// Serializes and sends rows that all belong to `schema`.
///
/// Any validation error, transport error or non-success status fails the call.
#[instrument(skip_all, fields(schema = %schema.name, rows = rows.len()))]
pub(crate) async fn insert_by_schema<R: BatchRow>(
    pool: &ConnectionPool,
    schema: &Schema,
    rows: Vec<Option<R>>,
    config: &InsertRequestConfig,
) -> ClientResult<InsertResponse> {
    let header = schema.to_wire_header();
    let indexed = rows.into_iter().enumerate().collect();
    let wire = serialize_rows(Arc::new(schema.clone()), indexed).await.into_result()?;

    let response = send_table(pool, R::into_table(header, wire), config).await?;
    ensure_success(response)
}

/// Turns a non-success server status into [`ClientError::RemoteStatus`]
pub(crate) fn ensure_success(response: InsertResponse) -> ClientResult<InsertResponse> {
    if !response.is_success() {
        return Err(ClientError::RemoteStatus {
            code: response.status.code,
            message: response.status.message,
        });
    }
    Ok(response)
}

/// Groups rows by schema and inserts each group in turn.
///
/// Schemas are resolved up front; an unknown schema fails the call before
/// anything is sent. Groups are serialized and sent one after another. A
/// group that fails validation, transport or server status is recorded in the
/// merged response and the remaining groups still run.
#[instrument(skip_all, fields(rows = rows.len()))]
pub(crate) async fn insert_auto<R: BatchRow>(
    pool: &ConnectionPool,
    rows: Vec<R>,
    config: &InsertRequestConfig,
) -> ClientResult<BatchInsertResponse> {
    let groups = group_by_schema(rows);
    let catalog = list_schemas(pool, R::DB_TYPE, Some(&config.request)).await?;

    let mut resolved = Vec::with_capacity(groups.len());
    for group in groups {
        let schema = catalog
            .iter()
            .find(|s| s.name == group.name)
            .cloned()
            .ok_or_else(|| ClientError::SchemaNotFound {
                db_type: R::DB_TYPE,
                name: group.name.clone(),
            })?;
        resolved.push((Arc::new(schema), group));
    }

    let mut merged = BatchInsertResponse::default();
    for (schema, group) in resolved {
        let indices = group.indices();
        let header = schema.to_wire_header();

        let wire = match serialize_rows(Arc::clone(&schema), group.rows).await.into_result() {
            Ok(wire) => wire,
            Err(err) => {
                warn!(schema = %group.name, error = %err, "Schema group failed validation");
                merged
                    .errors_by_index
                    .insert(err.index(), RowFailure::Validation(err.clone()));
                merged.record_failure(&group.name, err.into());
                continue;
            }
        };

        match send_table(pool, R::into_table(header, wire), config).await {
            Ok(response) => {
                if !response.is_success() {
                    warn!(schema = %group.name, code = ?response.status.code, "Schema group rejected");
                    merged.record_failure(
                        &group.name,
                        ClientError::RemoteStatus {
                            code: response.status.code,
                            message: response.status.message.clone(),
                        },
                    );
                }
                merged.record_response(&group.name, &indices, response);
            }
            Err(err) => {
                warn!(schema = %group.name, error = %err, "Schema group insert failed");
                merged.record_failure(&group.name, err);
            }
        }
    }

    info!(
        schemas = merged.responses.len() + merged.failures.len(),
        failed = merged.failures.len(),
        row_errors = merged.errors_by_index.len(),
        "Batch insert finished"
    );
    Ok(merged)
}
