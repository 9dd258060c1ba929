//! Error types for the graphlane client

use std::fmt;

use graphlane_interfaces::{DbType, ErrorCode, RpcError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::codec::EncodeError;

/// Result alias used across the client
pub type ClientResult<T> = Result<T, ClientError>;

/// Base error type for client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No hosts configured")]
    NoHosts,

    #[error("Connection to {host} failed: {source}")]
    Connectivity {
        host: String,
        #[source]
        source: RpcError,
    },

    #[error("Call to {host} failed: {source}")]
    Rpc {
        host: String,
        #[source]
        source: RpcError,
    },

    #[error("Topology refresh for graph '{graph}' failed: {message}")]
    Topology {
        graph: String,
        code: Option<ErrorCode>,
        message: String,
    },

    #[error("Leader lookup for graph '{graph}' exceeded {limit} redirects")]
    TooManyRedirects { graph: String, limit: usize },

    #[error("No active connection available")]
    NoActiveConnection,

    #[error("No analytics node available for graph '{0}'")]
    NoAnalyticsNode(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{db_type:?} schema not found: {name}")]
    SchemaNotFound { db_type: DbType, name: String },

    #[error("Server returned {code:?}: {message}")]
    RemoteStatus { code: ErrorCode, message: String },

    #[error("Connection pool is closed")]
    PoolClosed,
}

/// Coarse classification of a [`ClientError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Connectivity,
    Topology,
    Routing,
    Validation,
    Schema,
    Remote,
    Closed,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Config(_) | ClientError::NoHosts => ErrorKind::Config,
            ClientError::Connectivity { .. } | ClientError::Rpc { .. } => ErrorKind::Connectivity,
            ClientError::Topology { .. } | ClientError::TooManyRedirects { .. } => ErrorKind::Topology,
            ClientError::NoActiveConnection | ClientError::NoAnalyticsNode(_) => ErrorKind::Routing,
            ClientError::Validation(_) => ErrorKind::Validation,
            ClientError::SchemaNotFound { .. } => ErrorKind::Schema,
            ClientError::RemoteStatus { .. } => ErrorKind::Remote,
            ClientError::PoolClosed => ErrorKind::Closed,
        }
    }

    /// Server status code carried by the error, if any
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::RemoteStatus { code, .. } => Some(*code),
            ClientError::Topology { code, .. } => *code,
            _ => None,
        }
    }
}

/// Which kind of row a validation error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowKind {
    Node,
    Edge,
}

impl fmt::Display for RowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKind::Node => write!(f, "node"),
            RowKind::Edge => write!(f, "edge"),
        }
    }
}

/// A row that cannot be serialized against its schema.
///
/// `index` is the row's position in the caller's input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{kind} row [{index}] error: row is nil")]
    NilRow { kind: RowKind, index: usize },

    #[error("{kind} row [{index}] error: values doesn't contain property [{property}]")]
    MissingProperty {
        kind: RowKind,
        index: usize,
        property: String,
    },

    #[error("{kind} row [{index}] error: failed to serialize value of property {property}, value={value}: {source}")]
    Encode {
        kind: RowKind,
        index: usize,
        property: String,
        value: String,
        #[source]
        source: EncodeError,
    },
}

impl ValidationError {
    pub fn index(&self) -> usize {
        match self {
            ValidationError::NilRow { index, .. }
            | ValidationError::MissingProperty { index, .. }
            | ValidationError::Encode { index, .. } => *index,
        }
    }

    pub fn row_kind(&self) -> RowKind {
        match self {
            ValidationError::NilRow { kind, .. }
            | ValidationError::MissingProperty { kind, .. }
            | ValidationError::Encode { kind, .. } => *kind,
        }
    }

    /// Offending property, absent for nil rows
    pub fn property(&self) -> Option<&str> {
        match self {
            ValidationError::NilRow { .. } => None,
            ValidationError::MissingProperty { property, .. } | ValidationError::Encode { property, .. } => {
                Some(property)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphlane_interfaces::PropertyType;

    #[test]
    fn test_validation_messages_name_row_and_property() {
        let err = ValidationError::MissingProperty {
            kind: RowKind::Edge,
            index: 2,
            property: "weight".into(),
        };
        assert_eq!(
            err.to_string(),
            "edge row [2] error: values doesn't contain property [weight]"
        );
        assert_eq!(err.index(), 2);
        assert_eq!(err.property(), Some("weight"));

        let err = ValidationError::Encode {
            kind: RowKind::Node,
            index: 0,
            property: "age".into(),
            value: "1.5".into(),
            source: EncodeError::TypeMismatch {
                expected: PropertyType::Int32,
                found: "double",
            },
        };
        assert!(err.to_string().starts_with("node row [0] error: failed to serialize value of property age, value=1.5"));
    }

    #[test]
    fn test_error_kinds() {
        let err = ClientError::from(ValidationError::NilRow { kind: RowKind::Node, index: 1 });
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "node row [1] error: row is nil");

        let err = ClientError::RemoteStatus {
            code: ErrorCode::PermissionDenied,
            message: "denied".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Remote);
        assert_eq!(err.code(), Some(ErrorCode::PermissionDenied));

        let err = ClientError::TooManyRedirects { graph: "g".into(), limit: 8 };
        assert_eq!(err.kind(), ErrorKind::Topology);
        assert_eq!(ClientError::NoActiveConnection.kind(), ErrorKind::Routing);
    }
}
