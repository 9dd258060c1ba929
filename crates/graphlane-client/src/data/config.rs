//! Client and per-request configuration
//!
//! [`ClientConfig::load`] reads `GRAPHLANE_*` environment variables (after
//! loading a `.env` file if present); [`ClientConfig::from_yaml_str`] reads a
//! YAML document. Both fall back to the defaults below for absent keys.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use graphlane_interfaces::{DialOptions, InsertType};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::errors::{ClientError, ClientResult};

/// Connection and routing settings shared by every call made through a pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Seed host addresses, `host:port`
    #[serde(default)]
    pub hosts: Vec<String>,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Graph used when a request names none
    #[serde(default = "default_graph")]
    pub default_graph: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Liveness check timeout in milliseconds
    #[serde(default = "default_liveness_timeout_ms")]
    pub liveness_timeout_ms: u64,

    /// Dial timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Route every call to the leader
    #[serde(default)]
    pub consistency: bool,

    /// Redirects followed by one leader lookup before giving up
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Background refresh period in seconds; no monitor when absent
    #[serde(default)]
    pub health_check_interval_secs: Option<u64>,

    /// Certificate file enabling TLS
    #[serde(default)]
    pub tls_certificate: Option<PathBuf>,

    #[serde(default)]
    pub debug: bool,
}

fn default_username() -> String {
    "root".to_string()
}

fn default_graph() -> String {
    "default".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_liveness_timeout_ms() -> u64 {
    3000
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_max_redirects() -> usize {
    8
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            username: default_username(),
            password: String::new(),
            default_graph: default_graph(),
            timeout_secs: default_timeout_secs(),
            liveness_timeout_ms: default_liveness_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            consistency: false,
            max_redirects: default_max_redirects(),
            health_check_interval_secs: None,
            tls_certificate: None,
            debug: false,
        }
    }
}

impl ClientConfig {
    /// Defaults with the given seed hosts
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_default_graph(mut self, graph: impl Into<String>) -> Self {
        self.default_graph = graph.into();
        self
    }

    pub fn with_consistency(mut self, consistency: bool) -> Self {
        self.consistency = consistency;
        self
    }

    /// Load configuration from `.env` and environment variables
    pub fn load() -> ClientResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from a key lookup using the `GRAPHLANE_*` names
    pub fn from_lookup<F>(lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(hosts) = lookup("GRAPHLANE_HOSTS") {
            config.hosts = hosts
                .split(',')
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .collect();
        }

        if let Some(username) = lookup("GRAPHLANE_USERNAME") {
            config.username = username;
        }

        if let Some(password) = lookup("GRAPHLANE_PASSWORD") {
            config.password = password;
        }

        if let Some(graph) = lookup("GRAPHLANE_GRAPH") {
            config.default_graph = graph;
        }

        parse_into(&lookup, "GRAPHLANE_TIMEOUT_SECS", &mut config.timeout_secs);
        parse_into(&lookup, "GRAPHLANE_LIVENESS_TIMEOUT_MS", &mut config.liveness_timeout_ms);
        parse_into(&lookup, "GRAPHLANE_CONNECT_TIMEOUT_MS", &mut config.connect_timeout_ms);
        parse_into(&lookup, "GRAPHLANE_MAX_REDIRECTS", &mut config.max_redirects);

        if let Some(consistency) = lookup("GRAPHLANE_CONSISTENCY") {
            config.consistency = is_truthy(&consistency);
        }

        if let Some(interval) = lookup("GRAPHLANE_HEALTH_CHECK_INTERVAL_SECS") {
            match interval.parse::<u64>() {
                Ok(0) => config.health_check_interval_secs = None,
                Ok(secs) => config.health_check_interval_secs = Some(secs),
                Err(_) => warn!("Invalid GRAPHLANE_HEALTH_CHECK_INTERVAL_SECS value: {}", interval),
            }
        }

        if let Some(cert) = lookup("GRAPHLANE_TLS_CERT") {
            if !cert.is_empty() {
                config.tls_certificate = Some(PathBuf::from(cert));
            }
        }

        if let Some(debug) = lookup("GRAPHLANE_DEBUG") {
            config.debug = is_truthy(&debug);
        }

        config.validate()?;

        if config.password.is_empty() {
            warn!("No GRAPHLANE_PASSWORD provided - connecting without a password");
        }

        info!(hosts = config.hosts.len(), graph = %config.default_graph, "Loaded client configuration");
        Ok(config)
    }

    /// Parses a YAML document
    pub fn from_yaml_str(yaml: &str) -> ClientResult<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ClientError::Config(format!("Invalid YAML configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the settings a pool cannot start without
    pub fn validate(&self) -> ClientResult<()> {
        if self.hosts.is_empty() {
            return Err(ClientError::NoHosts);
        }
        if self.hosts.iter().any(|h| h.trim().is_empty()) {
            return Err(ClientError::Config("Host addresses must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ClientError::Config("Timeout must be at least one second".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn health_check_interval(&self) -> Option<Duration> {
        self.health_check_interval_secs.map(Duration::from_secs)
    }

    pub fn dial_options(&self) -> DialOptions {
        DialOptions {
            tls_certificate: self.tls_certificate.clone(),
            connect_timeout: self.connect_timeout(),
        }
    }
}

fn parse_into<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => warn!("Invalid {} value: {}", key, raw),
        }
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Per-call overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Graph for this call; the client default when absent
    #[serde(default)]
    pub graph: Option<String>,

    /// Timeout for this call in seconds; the client timeout when absent
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Route this call to the leader
    #[serde(default)]
    pub use_leader: bool,
}

impl RequestConfig {
    pub fn for_graph(graph: impl Into<String>) -> Self {
        Self {
            graph: Some(graph.into()),
            ..Self::default()
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_leader(mut self) -> Self {
        self.use_leader = true;
        self
    }

    /// Graph for this call, falling back to `default_graph`
    pub fn graph_or<'a>(&'a self, default_graph: &'a str) -> &'a str {
        self.graph.as_deref().unwrap_or(default_graph)
    }
}

/// Options for batch inserts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertRequestConfig {
    #[serde(default)]
    pub request: RequestConfig,

    #[serde(default)]
    pub insert_type: InsertType,

    /// Create endpoint nodes that do not exist yet (edge inserts only)
    #[serde(default)]
    pub create_node_if_not_exist: bool,

    /// Ask the server not to return ids
    #[serde(default)]
    pub silent: bool,
}

impl InsertRequestConfig {
    pub fn for_graph(graph: impl Into<String>) -> Self {
        Self {
            request: RequestConfig::for_graph(graph),
            ..Self::default()
        }
    }

    pub fn with_insert_type(mut self, insert_type: InsertType) -> Self {
        self.insert_type = insert_type;
        self
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_create_node_if_not_exist(mut self, create: bool) -> Self {
        self.create_node_if_not_exist = create;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_overrides_defaults() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("GRAPHLANE_HOSTS", "10.0.0.1:60061, 10.0.0.2:60061,"),
            ("GRAPHLANE_PASSWORD", "secret"),
            ("GRAPHLANE_CONSISTENCY", "true"),
            ("GRAPHLANE_MAX_REDIRECTS", "3"),
            ("GRAPHLANE_TIMEOUT_SECS", "not-a-number"),
        ]))
        .unwrap();

        assert_eq!(config.hosts, vec!["10.0.0.1:60061", "10.0.0.2:60061"]);
        assert_eq!(config.password, "secret");
        assert!(config.consistency);
        assert_eq!(config.max_redirects, 3);
        assert_eq!(config.timeout_secs, 15, "invalid values keep the default");
        assert_eq!(config.username, "root");
    }

    #[test]
    fn test_from_lookup_requires_hosts() {
        let err = ClientConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ClientError::NoHosts));
    }

    #[test]
    fn test_from_yaml_str() {
        let config = ClientConfig::from_yaml_str(
            r#"
hosts:
  - "127.0.0.1:60061"
default_graph: social
liveness_timeout_ms: 250
health_check_interval_secs: 30
"#,
        )
        .unwrap();

        assert_eq!(config.default_graph, "social");
        assert_eq!(config.liveness_timeout(), Duration::from_millis(250));
        assert_eq!(config.health_check_interval(), Some(Duration::from_secs(30)));
        assert_eq!(config.max_redirects, 8);
        assert!(!config.consistency);
    }

    #[test]
    fn test_request_graph_fallback() {
        let request = RequestConfig::default();
        assert_eq!(request.graph_or("default"), "default");
        let request = RequestConfig::for_graph("social").with_leader();
        assert_eq!(request.graph_or("default"), "social");
        assert!(request.use_leader);
        assert!(!InsertRequestConfig::default().silent);
    }
}
