// Test utilities for the graphlane client
//
// An in-memory cluster that stands in for real nodes, so pool, routing and
// insert behavior can be exercised without a database.

mod fake_cluster;

pub use fake_cluster::{FakeCluster, FakeDialer, FakeNode, Method};
