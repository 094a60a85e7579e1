/// Error handling tests: remote rejections, local validation and transport
/// failures as seen through the public API
use dena_client::{Base, ClientConfig, ClientError, Dena, Update};
use dena_test_utils::{record, MockServer, TEST_KEY, TEST_PROJECT};
use serde_json::json;

fn users_base(server: &MockServer) -> Base {
    server.client(TEST_KEY).unwrap().base("users").unwrap()
}

#[tokio::test]
async fn test_missing_key_carries_service_payload() {
    let server = MockServer::start().await.unwrap();
    let users = users_base(&server);

    let err = users.get("ghost").await.unwrap_err();
    match &err {
        ClientError::Remote { status, body } => {
            assert_eq!(*status, 404);
            assert_eq!(body, &json!({ "errors": ["Key not found"] }));
        }
        other => panic!("expected a remote error, got {:?}", other),
    }
    assert_eq!(err.code(), "NOT_FOUND");
    assert_eq!(err.remote_errors(), vec!["Key not found"]);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_insert_conflict() {
    let server = MockServer::start().await.unwrap();
    let users = users_base(&server);

    users.insert(record(json!({ "key": "taken", "v": 1 }))).await.unwrap();
    let err = users
        .insert(record(json!({ "key": "taken", "v": 2 })))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(409));
    assert_eq!(err.code(), "ALREADY_EXISTS");
    assert_eq!(err.remote_errors(), vec!["Key already exists"]);
    assert_eq!(
        server.stored_item(TEST_PROJECT, "users", "taken"),
        Some(json!({ "key": "taken", "v": 1 }))
    );
}

#[tokio::test]
async fn test_update_missing_key() {
    let server = MockServer::start().await.unwrap();
    let users = users_base(&server);

    let err = users
        .update("ghost", &Update::new().set("a", 1))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_update_rejected_by_service() {
    let server = MockServer::start().await.unwrap();
    let users = users_base(&server);
    users.put(record(json!({ "key": "k", "name": "text" }))).await.unwrap();

    let err = users
        .update("k", &Update::new().increment("name", 1))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.code(), "BAD_REQUEST");
    assert_eq!(
        server.stored_item(TEST_PROJECT, "users", "k"),
        Some(json!({ "key": "k", "name": "text" }))
    );
}

#[tokio::test]
async fn test_duplicate_delete_fields_never_sent() {
    let server = MockServer::start().await.unwrap();
    let users = users_base(&server);

    let update = Update::new().delete("a").delete("b").delete("a");
    let err = users.update("k", &update).await.unwrap_err();

    assert!(matches!(err, ClientError::InvalidArgument(_)));
    assert_eq!(err.code(), "INVALID_ARGUMENT");
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_distinct_delete_fields_are_sent() {
    let server = MockServer::start().await.unwrap();
    let users = users_base(&server);
    users
        .put(record(json!({ "key": "k", "a": 1, "b": 2, "c": 3 })))
        .await
        .unwrap();

    users
        .update("k", &Update::new().delete("a").delete("b"))
        .await
        .unwrap();
    assert_eq!(
        server.stored_item(TEST_PROJECT, "users", "k"),
        Some(json!({ "key": "k", "c": 3 }))
    );
}

#[tokio::test]
async fn test_partial_put_failure_is_not_an_error() {
    let server = MockServer::builder().max_item_bytes(64).start().await.unwrap();
    let users = users_base(&server);

    let small = record(json!({ "key": "small" }));
    let large = record(json!({ "key": "large", "blob": "x".repeat(200) }));
    let response = users.put(vec![small, large.clone()]).await.unwrap();

    assert!(!response.all_processed());
    assert_eq!(response.processed.items.len(), 1);
    assert_eq!(response.processed.items[0].key, "small");
    assert_eq!(response.failed.items, vec![large]);
    assert_eq!(server.item_count(TEST_PROJECT, "users"), 1);
}

#[tokio::test]
async fn test_unknown_key_is_unauthorized() {
    let server = MockServer::builder().api_key(TEST_KEY).start().await.unwrap();
    let users: Base = server.client("testproj_wrongSecret").unwrap().base("users").unwrap();

    let err = users.get("anything").await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.code(), "UNAUTHORIZED");
    assert_eq!(err.body(), Some(&json!({ "errors": ["Unauthorized"] })));

    let ok = users_base(&server).delete("anything").await.unwrap();
    assert_eq!(ok.key, "anything");
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let config = ClientConfig::new().with_base_endpoint(format!("http://{}", addr));
    let users: Base = Dena::with_config(TEST_KEY, config).unwrap().base("users").unwrap();

    let err = users.get("k").await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(err.code(), "TRANSPORT_ERROR");
    assert!(err.is_retryable());
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn test_mismatched_record_type_is_serialization_error() {
    #[derive(Debug, serde::Deserialize, serde::Serialize)]
    struct Strict {
        count: u32,
    }

    let server = MockServer::start().await.unwrap();
    users_base(&server)
        .put(record(json!({ "key": "k", "count": "many" })))
        .await
        .unwrap();

    let strict: Base<Strict> = server.client(TEST_KEY).unwrap().base("users").unwrap();
    let err = strict.get("k").await.unwrap_err();
    assert!(matches!(err, ClientError::Serialization(_)));
    assert_eq!(err.code(), "SERIALIZATION_ERROR");
}

#[test]
fn test_empty_key_rejected_by_factory() {
    let err = Dena::new("").unwrap_err();
    assert!(matches!(err, ClientError::InvalidArgument(_)));
}

#[test]
fn test_invalid_endpoint_rejected_by_factory() {
    let config = ClientConfig::new().with_base_endpoint("not a url");
    assert!(Dena::with_config(TEST_KEY, config).is_err());
}

#[tokio::test]
async fn test_non_finite_increment_never_sent() {
    let server = MockServer::start().await.unwrap();
    let users = users_base(&server);

    let err = users
        .update("k", &Update::new().increment_f64("x", f64::NAN))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::InvalidArgument(_)));
    assert!(server.requests().is_empty());
}
