//! Shared helpers for graphlane client integration tests

#![allow(dead_code)]

use graphlane_client::ClientConfig;

/// Initialize tracing for tests, once per binary
pub fn init_test_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Client configuration for the given fake hosts
pub fn config(hosts: &[&str]) -> ClientConfig {
    ClientConfig::new(hosts.iter().copied()).with_credentials("root", "secret")
}
