//! Concurrent row serialization.
//!
//! Each row of a group is encoded by its own task. Results land in the slot
//! matching the row's input position, so output order never depends on
//! completion order. A failure lowers a shared cutoff slot and aborts every
//! task past it; rows before the cutoff still finish, so the reported error is
//! always the failing row with the lowest position.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use graphlane_interfaces::{DbType, EdgeRow, EdgeTable, NodeRow, NodeTable, SchemaDef};
use tokio::task::JoinSet;
use tracing::trace;

use crate::data::codec::encode;
use crate::data::errors::{RowKind, ValidationError};
use crate::data::rows::{Edge, Node};
use crate::data::schema::Schema;
use crate::data::values::Values;

/// A wire table ready to be sent
#[derive(Debug, Clone, PartialEq)]
pub enum WireTable {
    Nodes(NodeTable),
    Edges(EdgeTable),
}

impl WireTable {
    pub fn len(&self) -> usize {
        match self {
            WireTable::Nodes(table) => table.node_rows.len(),
            WireTable::Edges(table) => table.edge_rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A caller row that can be serialized against a schema
pub trait BatchRow: Send + Sync + 'static {
    type Wire: Send + 'static;

    const KIND: RowKind;
    const DB_TYPE: DbType;

    fn schema_name(&self) -> &str;

    fn values(&self) -> &Values;

    /// Wire row carrying this row's identity fields and the encoded values
    fn to_wire(&self, schema_name: &str, values: Vec<Vec<u8>>) -> Self::Wire;

    fn into_table(header: SchemaDef, rows: Vec<Self::Wire>) -> WireTable;
}

impl BatchRow for Node {
    type Wire = NodeRow;

    const KIND: RowKind = RowKind::Node;
    const DB_TYPE: DbType = DbType::Node;

    fn schema_name(&self) -> &str {
        &self.schema
    }

    fn values(&self) -> &Values {
        &self.values
    }

    fn to_wire(&self, schema_name: &str, values: Vec<Vec<u8>>) -> NodeRow {
        NodeRow {
            id: self.id.clone(),
            uuid: self.uuid,
            schema_name: schema_name.to_string(),
            values,
        }
    }

    fn into_table(header: SchemaDef, rows: Vec<NodeRow>) -> WireTable {
        WireTable::Nodes(NodeTable {
            schemas: vec![header],
            node_rows: rows,
        })
    }
}

impl BatchRow for Edge {
    type Wire = EdgeRow;

    const KIND: RowKind = RowKind::Edge;
    const DB_TYPE: DbType = DbType::Edge;

    fn schema_name(&self) -> &str {
        &self.schema
    }

    fn values(&self) -> &Values {
        &self.values
    }

    fn to_wire(&self, schema_name: &str, values: Vec<Vec<u8>>) -> EdgeRow {
        EdgeRow {
            uuid: self.uuid,
            from_id: self.from.clone(),
            from_uuid: self.from_uuid,
            to_id: self.to.clone(),
            to_uuid: self.to_uuid,
            schema_name: schema_name.to_string(),
            values,
        }
    }

    fn into_table(header: SchemaDef, rows: Vec<EdgeRow>) -> WireTable {
        WireTable::Edges(EdgeTable {
            schemas: vec![header],
            edge_rows: rows,
        })
    }
}

/// Outcome of serializing one group
#[derive(Debug)]
pub struct SerializedRows<W> {
    /// One slot per input row; `None` where the row failed or was abandoned
    pub slots: Vec<Option<W>>,
    pub first_error: Option<ValidationError>,
}

impl<W> SerializedRows<W> {
    /// All rows in input order, or the first error
    pub fn into_result(self) -> Result<Vec<W>, ValidationError> {
        if let Some(err) = self.first_error {
            return Err(err);
        }
        Ok(self.slots.into_iter().flatten().collect())
    }
}

/// Serializes `rows` against `schema`, one task per row.
///
/// Each entry pairs the row with the index reported in errors, normally its
/// position in the caller's input. Returns once every spawned task has
/// finished or been aborted.
pub async fn serialize_rows<R: BatchRow>(
    schema: Arc<Schema>,
    rows: Vec<(usize, Option<R>)>,
) -> SerializedRows<R::Wire> {
    let mut slots: Vec<Option<R::Wire>> = std::iter::repeat_with(|| None).take(rows.len()).collect();
    let mut first_error: Option<(usize, ValidationError)> = None;
    let cutoff = Arc::new(AtomicUsize::new(usize::MAX));
    let mut units = JoinSet::new();
    let mut handles = Vec::with_capacity(rows.len());

    for (slot, (index, row)) in rows.into_iter().enumerate() {
        let Some(row) = row else {
            first_error = Some((slot, ValidationError::NilRow { kind: R::KIND, index }));
            cutoff.store(slot, Ordering::Release);
            break;
        };
        let schema = Arc::clone(&schema);
        let cutoff = Arc::clone(&cutoff);
        handles.push(units.spawn(async move { (slot, encode_row(&schema, index, &row, slot, &cutoff)) }));
    }

    while let Some(joined) = units.join_next().await {
        match joined {
            Ok((slot, Ok(Some(wire)))) => slots[slot] = Some(wire),
            Ok((slot, Ok(None))) => trace!(slot, "Row abandoned after an earlier row failed"),
            Ok((slot, Err(err))) => {
                if first_error.as_ref().map_or(true, |(first, _)| slot < *first) {
                    first_error = Some((slot, err));
                    cutoff.fetch_min(slot, Ordering::AcqRel);
                    for handle in handles.iter().skip(slot + 1) {
                        handle.abort();
                    }
                }
            }
            Err(join_err) if join_err.is_cancelled() => {}
            Err(join_err) => std::panic::resume_unwind(join_err.into_panic()),
        }
    }

    SerializedRows {
        slots,
        first_error: first_error.map(|(_, err)| err),
    }
}

/// Encodes one row's required properties in schema order.
///
/// Returns `Ok(None)` once a row before `slot` has failed.
fn encode_row<R: BatchRow>(
    schema: &Schema,
    index: usize,
    row: &R,
    slot: usize,
    cutoff: &AtomicUsize,
) -> Result<Option<R::Wire>, ValidationError> {
    let mut encoded = Vec::new();

    for property in schema.required_properties() {
        if cutoff.load(Ordering::Acquire) < slot {
            return Ok(None);
        }
        let value = row
            .values()
            .get(&property.name)
            .ok_or_else(|| ValidationError::MissingProperty {
                kind: R::KIND,
                index,
                property: property.name.clone(),
            })?;
        let bytes = encode(value, property.property_type).map_err(|source| ValidationError::Encode {
            kind: R::KIND,
            index,
            property: property.name.clone(),
            value: value.to_string(),
            source,
        })?;
        encoded.push(bytes);
    }

    Ok(Some(row.to_wire(&schema.name, encoded)))
}
