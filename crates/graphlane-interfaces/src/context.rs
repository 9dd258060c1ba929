//! Per-call context: a deadline plus the metadata pairs sent alongside a request.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{RpcError, RpcResult};

/// Metadata key selecting the graph a call operates on
pub const GRAPH_NAME_KEY: &str = "graph_name";
/// Metadata key carrying the user name
pub const USER_KEY: &str = "user";
/// Metadata key carrying the password
pub const PASSWORD_KEY: &str = "password";

/// Time-bounded context for a single remote call.
///
/// The context is a plain value: dropping it releases it, so every exit path of
/// the calling operation cleans it up. [`CallContext::run`] abandons the wrapped
/// future once the deadline passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    deadline: Instant,
    metadata: Vec<(String, String)>,
}

impl CallContext {
    /// Creates a context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            metadata: Vec::new(),
        }
    }

    /// Adds a metadata pair, replacing an existing value for the same key.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.metadata.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.metadata.push((key, value)),
        }
        self
    }

    /// All metadata pairs in insertion order
    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    /// Looks up a metadata value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Graph selected for this call, if any
    pub fn graph_name(&self) -> Option<&str> {
        self.get(GRAPH_NAME_KEY)
    }

    /// Instant after which the call is abandoned
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has passed
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Drives `call` to completion unless the deadline passes first.
    ///
    /// On expiry the future is dropped, so no partial call state outlives the context.
    pub async fn run<T, F>(&self, call: F) -> RpcResult<T>
    where
        F: Future<Output = RpcResult<T>>,
    {
        match tokio::time::timeout_at(self.deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(RpcError::DeadlineExceeded),
        }
    }
}
