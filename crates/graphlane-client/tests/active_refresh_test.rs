//! Liveness probing, the active set and the health monitor

use std::sync::Arc;
use std::time::Duration;

use graphlane_client::rpc::{ErrorCode, Status};
use graphlane_client::test_utils::{FakeCluster, Method};
use graphlane_client::{ClientError, ConnectionPool, GraphClient};
use pretty_assertions::assert_eq;

mod common;
use common::{config, init_test_tracing};

fn active_hosts(pool: &ConnectionPool) -> Vec<String> {
    pool.active_connections().iter().map(|c| c.host().to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_host_is_never_selected() {
    init_test_tracing();
    let cluster = FakeCluster::new().with_leader("h1", &["h2", "h3"]);
    cluster.set_hanging("h2", true);

    let pool = ConnectionPool::new(config(&["h1", "h2", "h3"]), cluster.dialer())
        .await
        .unwrap();

    assert_eq!(active_hosts(&pool), vec!["h1", "h3"]);

    for _ in 0..10 {
        let conn = pool.select_connection(None).await.unwrap();
        assert_ne!(conn.host(), "h2");
    }
}

#[tokio::test]
async fn test_error_status_marks_host_inactive() {
    let cluster = FakeCluster::new().with_leader("h1", &[]);
    cluster.set_hello_status("h2", Some(Status::error(ErrorCode::SystemError, "starting up")));
    cluster.set_hello_status("h3", Some(Status::success()));

    let pool = ConnectionPool::new(config(&["h1", "h2", "h3"]), cluster.dialer())
        .await
        .unwrap();

    assert_eq!(active_hosts(&pool), vec!["h1", "h3"]);
}

#[tokio::test]
async fn test_unreachable_seed_is_skipped() {
    let cluster = FakeCluster::new().with_leader("h1", &[]);
    cluster.set_unreachable("h2", true);

    let pool = ConnectionPool::new(config(&["h1", "h2"]), cluster.dialer()).await.unwrap();

    assert!(pool.connection("h2").is_none());
    assert_eq!(active_hosts(&pool), vec!["h1"]);

    cluster.set_unreachable("h2", false);
    let failures = pool.create_connections().await;
    assert!(failures.is_empty());
    assert_eq!(pool.refresh_active_connections().await.unwrap(), 2);
    assert_eq!(cluster.calls("h2", Method::Dial), 2);
}

#[tokio::test]
async fn test_no_active_connection() {
    let cluster = FakeCluster::new();
    cluster.set_unreachable("h1", true);

    let pool = ConnectionPool::new(config(&["h1"]), cluster.dialer()).await.unwrap();

    let err = pool.select_connection(None).await.unwrap_err();
    assert!(matches!(err, ClientError::NoActiveConnection));
}

#[tokio::test]
async fn test_liveness_check_echoes_label() {
    let cluster = FakeCluster::new().with_leader("h1", &[]);
    let client = GraphClient::connect(config(&["h1"]), cluster.dialer()).await.unwrap();

    assert!(client.test().await.unwrap());

    client.close().await.unwrap();
    assert!(matches!(client.test().await, Err(ClientError::PoolClosed)));
}

#[tokio::test(start_paused = true)]
async fn test_health_monitor_readmits_recovered_host() {
    init_test_tracing();
    let cluster = FakeCluster::new().with_leader("h1", &["h2"]);
    cluster.set_hanging("h2", true);

    let pool = Arc::new(
        ConnectionPool::new(config(&["h1", "h2"]), cluster.dialer())
            .await
            .unwrap(),
    );
    assert_eq!(active_hosts(&pool), vec!["h1"]);

    let monitor = pool.spawn_health_monitor(Duration::from_secs(5));
    cluster.set_hanging("h2", false);
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert_eq!(active_hosts(&pool), vec!["h1", "h2"]);

    pool.close().await.unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(monitor.is_finished());
}
