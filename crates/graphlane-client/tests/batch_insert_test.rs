//! Schema-grouped batch inserts against a fake cluster

use std::collections::BTreeMap;

use graphlane_client::rpc::{DbType, ErrorCode, PropertyType, Status};
use graphlane_client::test_utils::{FakeCluster, Method};
use graphlane_client::{
    ClientError, Edge, GraphClient, InsertRequestConfig, Node, RowFailure, RowKind, Schema, ValidationError,
};
use pretty_assertions::assert_eq;

mod common;
use common::{config, init_test_tracing};

fn social_cluster() -> FakeCluster {
    FakeCluster::new()
        .with_leader("h1", &["h2"])
        .with_schema(DbType::Edge, "follows", &[("since", PropertyType::Int64)])
        .with_schema(DbType::Edge, "rates", &[("weight", PropertyType::Double)])
        .with_schema(
            DbType::Node,
            "person",
            &[("name", PropertyType::String), ("age", PropertyType::Int32)],
        )
        .with_schema(DbType::Node, "company", &[("name", PropertyType::String)])
}

async fn client(cluster: &FakeCluster) -> GraphClient {
    GraphClient::connect(config(&["h1", "h2"]), cluster.dialer())
        .await
        .unwrap()
}

fn people_and_companies() -> Vec<Node> {
    vec![
        Node::new("person").with_id("p1").with_value("name", "ada").with_value("age", 36),
        Node::new("company").with_id("c1").with_value("name", "acme"),
        Node::new("person").with_id("p2").with_value("name", "alan").with_value("age", 41),
        Node::new("person").with_id("p3").with_value("name", "grace").with_value("age", 45),
    ]
}

#[tokio::test]
async fn test_invalid_group_is_isolated() {
    init_test_tracing();
    let cluster = social_cluster();
    let client = client(&cluster).await;

    let edges = vec![
        Edge::new("follows").between("a", "b").with_value("since", 2019i64),
        Edge::new("follows").between("b", "c").with_value("since", 2020i64),
        Edge::new("rates").between("a", "x"),
        Edge::new("rates").between("b", "x").with_value("weight", 0.5),
        Edge::new("follows").between("c", "a").with_value("since", 2021i64),
    ];

    let result = client
        .insert_edges_batch_auto(edges, &InsertRequestConfig::default())
        .await
        .unwrap();

    assert!(!result.is_success());
    assert_eq!(result.responses.keys().collect::<Vec<_>>(), vec!["follows"]);
    assert_eq!(result.responses["follows"].ids, vec!["a->b", "b->c", "c->a"]);
    assert_eq!(result.failures.keys().collect::<Vec<_>>(), vec!["rates"]);
    assert_eq!(result.errors_by_index.keys().copied().collect::<Vec<_>>(), vec![2]);

    match &result.errors_by_index[&2] {
        RowFailure::Validation(err) => {
            assert_eq!(err.row_kind(), RowKind::Edge);
            assert_eq!(err.property(), Some("weight"));
        }
        other => panic!("expected a validation failure, got {other:?}"),
    }
    assert!(result.message.starts_with("rates:"));
    assert!(result.message.contains("weight"));

    let sent = cluster.edge_inserts();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "h1", "inserts go to the leader");
    assert_eq!(sent[0].1.edge_table.schemas[0].name, "follows");
    assert_eq!(result.statistic.total_cost, 6);
    assert_eq!(result.statistic.engine_cost, 3);
}

#[tokio::test]
async fn test_unknown_schema_sends_nothing() {
    let cluster = social_cluster();
    let client = client(&cluster).await;

    let nodes = vec![
        Node::new("person").with_id("p1").with_value("name", "ada").with_value("age", 36),
        Node::new("planet").with_id("earth"),
    ];
    let err = client
        .insert_nodes_batch_auto(nodes, &InsertRequestConfig::default())
        .await
        .unwrap_err();

    match err {
        ClientError::SchemaNotFound { db_type, name } => {
            assert_eq!(db_type, DbType::Node);
            assert_eq!(name, "planet");
        }
        other => panic!("expected SchemaNotFound, got {other:?}"),
    }
    assert_eq!(cluster.total_calls(Method::InsertNodes), 0);
}

#[tokio::test]
async fn test_server_row_errors_map_to_input_indices() {
    let cluster = social_cluster();
    cluster.set_row_errors("person", BTreeMap::from([(1, ErrorCode::DuplicateId.code())]));
    let client = client(&cluster).await;

    let result = client
        .insert_nodes_batch_auto(people_and_companies(), &InsertRequestConfig::default())
        .await
        .unwrap();

    assert!(result.failures.is_empty());
    assert_eq!(result.error_code, None);
    // position 1 of the person group is input row 2
    assert_eq!(
        result.errors_by_index,
        BTreeMap::from([(2, RowFailure::Server(ErrorCode::DuplicateId))])
    );

    let sent = cluster.node_inserts();
    let schemas: Vec<_> = sent.iter().map(|(_, r)| r.node_table.schemas[0].name.clone()).collect();
    assert_eq!(schemas, vec!["person", "company"]);
    let person_ids: Vec<_> = sent[0].1.node_table.node_rows.iter().map(|r| r.id.clone()).collect();
    assert_eq!(person_ids, vec!["p1", "p2", "p3"]);
}

#[tokio::test]
async fn test_rejected_group_sets_code_and_message() {
    let cluster = social_cluster();
    cluster.set_insert_status("company", Status::error(ErrorCode::PermissionDenied, "denied"));
    let client = client(&cluster).await;

    let result = client
        .insert_nodes_batch_auto(people_and_companies(), &InsertRequestConfig::default())
        .await
        .unwrap();

    assert_eq!(result.error_code, Some(ErrorCode::PermissionDenied));
    assert_eq!(result.message, "company:denied\r\n");
    assert!(result.failures.contains_key("company"));
    assert!(result.responses["person"].is_success());
    assert_eq!(result.responses["person"].ids.len(), 3);
}

#[tokio::test]
async fn test_by_schema_rejects_nil_row_before_sending() {
    let cluster = social_cluster();
    let client = client(&cluster).await;
    let schema = client.get_schema(DbType::Node, "company", None).await.unwrap();

    let rows = vec![Some(Node::new("company").with_id("c1").with_value("name", "acme")), None];
    let err = client
        .insert_nodes_batch_by_schema(&schema, rows, &InsertRequestConfig::default())
        .await
        .unwrap_err();

    match err {
        ClientError::Validation(err) => {
            assert_eq!(err, ValidationError::NilRow { kind: RowKind::Node, index: 1 });
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
    assert_eq!(cluster.total_calls(Method::InsertNodes), 0);
}

#[tokio::test]
async fn test_by_schema_surfaces_remote_status() {
    let cluster = social_cluster();
    cluster.set_insert_status("company", Status::error(ErrorCode::EngineError, "disk full"));
    let client = client(&cluster).await;
    let schema = Schema::new("company", DbType::Node).with_property("name", PropertyType::String);

    let err = client
        .insert_nodes_batch_by_schema(
            &schema,
            vec![Node::new("company").with_value("name", "acme")],
            &InsertRequestConfig::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::RemoteStatus { code: ErrorCode::EngineError, ref message } if message == "disk full"
    ));
}

#[tokio::test]
async fn test_by_schema_to_named_graph() {
    let cluster = social_cluster();
    let client = client(&cluster).await;
    let schema = client.get_schema(DbType::Node, "person", None).await.unwrap();

    let config = InsertRequestConfig::for_graph("social").with_silent(true);
    let response = client
        .insert_nodes_batch_by_schema(
            &schema,
            vec![
                Node::new("person").with_id("p1").with_value("name", "ada").with_value("age", "36"),
                Node::new("person").with_value("name", "anon").with_value("age", 20),
            ],
            &config,
        )
        .await
        .unwrap();

    assert!(response.is_success());
    assert!(response.ids.is_empty(), "silent inserts return no ids");

    let sent = cluster.node_inserts();
    assert_eq!(sent.len(), 1);
    let (host, request) = &sent[0];
    assert_eq!(host, "h1");
    assert_eq!(request.graph_name, "social");
    assert!(request.silent);
    assert_eq!(request.node_table.node_rows[0].values[1], 36i32.to_be_bytes().to_vec());
}

#[tokio::test]
async fn test_prebuilt_table_rejection_fails_the_call() {
    use graphlane_client::rpc::{NodeRow, NodeTable, SchemaDef};

    let cluster = social_cluster();
    cluster.set_insert_status("company", Status::error(ErrorCode::EngineError, "disk full"));
    let client = client(&cluster).await;

    let table = NodeTable {
        schemas: vec![SchemaDef {
            name: "company".into(),
            ..Default::default()
        }],
        node_rows: vec![NodeRow {
            id: "c1".into(),
            schema_name: "company".into(),
            ..Default::default()
        }],
    };
    let err = client
        .insert_nodes_batch(table, &InsertRequestConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::RemoteStatus { code: ErrorCode::EngineError, ref message } if message == "disk full"
    ));
    assert_eq!(cluster.total_calls(Method::InsertNodes), 1);
}
