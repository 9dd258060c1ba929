//! Insert results as returned to callers.

use std::collections::BTreeMap;

use graphlane_interfaces::{ErrorCode, InsertReply, InsertStatistics, Status};
use serde::{Deserialize, Serialize};

use crate::data::errors::{ClientError, ValidationError};

/// Timing figures, summed across batches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistic {
    pub total_cost: i64,
    pub engine_cost: i64,
}

impl Statistic {
    pub fn merge(&mut self, other: &Statistic) {
        self.total_cost += other.total_cost;
        self.engine_cost += other.engine_cost;
    }
}

impl From<InsertStatistics> for Statistic {
    fn from(stats: InsertStatistics) -> Self {
        Self {
            total_cost: stats.total_cost,
            engine_cost: stats.engine_cost,
        }
    }
}

/// Result of one insert call against one schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertResponse {
    pub status: Status,
    pub ids: Vec<String>,
    pub uuids: Vec<u64>,
    /// Row position within the batch to the server's error code
    pub error_items: BTreeMap<usize, ErrorCode>,
    pub statistic: Statistic,
}

impl InsertResponse {
    pub fn is_success(&self) -> bool {
        self.status.code.is_success()
    }
}

impl From<InsertReply> for InsertResponse {
    fn from(reply: InsertReply) -> Self {
        Self {
            status: reply.status,
            ids: reply.ids,
            uuids: reply.uuids,
            error_items: reply
                .error_items
                .into_iter()
                .map(|(pos, code)| (pos as usize, ErrorCode::from_code(code)))
                .collect(),
            statistic: reply.statistics.into(),
        }
    }
}

/// Why a row of a multi-schema insert did not land
#[derive(Debug, Clone, PartialEq)]
pub enum RowFailure {
    /// The row could not be serialized; its whole schema group was skipped
    Validation(ValidationError),
    /// The server rejected the row
    Server(ErrorCode),
}

/// Merged result of a multi-schema insert.
///
/// Schema groups that failed as a whole are listed in `failures`. The row
/// that made a group fail validation, and every row the server rejected, is
/// keyed by its original input index in `errors_by_index`.
#[derive(Debug, Default)]
pub struct BatchInsertResponse {
    /// Server response per schema, for groups that reached the server
    pub responses: BTreeMap<String, InsertResponse>,
    /// Schema groups that failed, with the cause
    pub failures: BTreeMap<String, ClientError>,
    /// First non-success code reported by any group
    pub error_code: Option<ErrorCode>,
    /// One `schema:message` line per failed group
    pub message: String,
    /// Original row index to the failure of that row
    pub errors_by_index: BTreeMap<usize, RowFailure>,
    pub statistic: Statistic,
}

impl BatchInsertResponse {
    /// True when every group was inserted and no row was rejected
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.errors_by_index.is_empty()
    }

    pub(crate) fn record_failure(&mut self, schema: &str, err: ClientError) {
        if let Some(code) = err.code() {
            self.error_code.get_or_insert(code);
        }
        let text = match &err {
            ClientError::RemoteStatus { message, .. } => message.clone(),
            other => other.to_string(),
        };
        self.message.push_str(&format!("{}:{}\r\n", schema, text));
        self.failures.insert(schema.to_string(), err);
    }

    pub(crate) fn record_response(&mut self, schema: &str, original_indices: &[usize], response: InsertResponse) {
        for (pos, code) in &response.error_items {
            match original_indices.get(*pos) {
                Some(index) => {
                    self.errors_by_index.insert(*index, RowFailure::Server(*code));
                }
                None => tracing::warn!(schema, pos, "Server reported an error for an unknown row"),
            }
        }
        self.statistic.merge(&response.statistic);
        self.responses.insert(schema.to_string(), response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::errors::RowKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reply_conversion() {
        let mut reply = InsertReply {
            ids: vec!["a".into(), "b".into()],
            uuids: vec![1, 2],
            statistics: InsertStatistics { total_cost: 5, engine_cost: 3 },
            ..Default::default()
        };
        reply.error_items.insert(1, ErrorCode::DuplicateId.code());

        let response = InsertResponse::from(reply);
        assert!(response.is_success());
        assert_eq!(response.error_items.get(&1), Some(&ErrorCode::DuplicateId));
        assert_eq!(response.statistic, Statistic { total_cost: 5, engine_cost: 3 });
    }

    #[test]
    fn test_merge_remaps_indices_and_keeps_first_code() {
        let mut batch = BatchInsertResponse::default();

        let mut response = InsertResponse {
            statistic: Statistic { total_cost: 4, engine_cost: 2 },
            ..Default::default()
        };
        response.error_items.insert(1, ErrorCode::DuplicateId);
        batch.record_response("person", &[3, 7], response);

        batch.record_failure(
            "company",
            ClientError::RemoteStatus { code: ErrorCode::PermissionDenied, message: "denied".into() },
        );
        batch.record_failure(
            "city",
            ClientError::RemoteStatus { code: ErrorCode::EngineError, message: "boom".into() },
        );
        batch.record_failure(
            "tag",
            ValidationError::NilRow { kind: RowKind::Node, index: 0 }.into(),
        );

        assert_eq!(batch.errors_by_index.get(&7), Some(&RowFailure::Server(ErrorCode::DuplicateId)));
        assert_eq!(batch.error_code, Some(ErrorCode::PermissionDenied));
        assert!(batch.message.starts_with("company:"));
        assert_eq!(batch.message.matches("\r\n").count(), 3);
        assert_eq!(batch.statistic.total_cost, 4);
        assert!(!batch.is_success());
    }
}
