//! Transport errors raised by a [`GraphRpc`](crate::GraphRpc) stub.

use thiserror::Error;

/// Result type for remote calls
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors a stub reports when a call could not complete.
///
/// A server that answers with a non-success [`ErrorCode`](crate::ErrorCode) is
/// *not* an `RpcError`: the reply carries that status and the caller decides.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// The node could not be reached
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// The call context deadline passed before a reply arrived
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// The transport failed mid-call
    #[error("Transport error: {0}")]
    Transport(String),

    /// The stub was closed
    #[error("Connection closed")]
    Closed,

    /// The request was rejected before reaching the server
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl RpcError {
    /// Whether the error means the node is unreachable rather than the request being bad
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            RpcError::Unavailable(_) | RpcError::DeadlineExceeded | RpcError::Transport(_) | RpcError::Closed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_display() {
        let error = RpcError::Unavailable("10.0.0.2:60061".into());
        assert_eq!(format!("{}", error), "Unavailable: 10.0.0.2:60061");
        assert_eq!(format!("{}", RpcError::DeadlineExceeded), "Deadline exceeded");
    }

    #[test]
    fn test_connectivity_classification() {
        assert!(RpcError::Closed.is_connectivity());
        assert!(RpcError::DeadlineExceeded.is_connectivity());
        assert!(!RpcError::InvalidArgument("bad".into()).is_connectivity());
    }
}
