//! Integration tests for GET caching, invalidation and de-duplication
#![allow(clippy::expect_used)]

use futures::future::join_all;
use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tradedesk_client::{
    ApiClient, ClientConfig, Contract, InvalidationMode, JsonSchema, NO_BODY, NO_PARAMS,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct User {
    id: u64,
    name: String,
}

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::new(format!("{}/api", server.uri())).with_report_errors(false)
}

fn client(server: &MockServer) -> ApiClient {
    ApiClient::anonymous(config(server)).expect("Client should build")
}

fn envelope(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": data }))
}

fn users() -> Value {
    json!([{ "id": 1, "name": "Ada" }, { "id": 2, "name": "Grace" }])
}

/// A second identical GET inside the TTL is served without network I/O
#[tokio::test]
async fn test_get_is_cached_within_ttl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(envelope(users()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let first: Vec<User> = client
        .get("/users", NO_PARAMS, Contract::none())
        .await
        .expect("First GET should succeed");
    let second: Vec<User> = client
        .get("/users", NO_PARAMS, Contract::none())
        .await
        .expect("Second GET should be served from cache");

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    let stats = client.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);
}

/// Once the TTL has passed the next GET goes back to the network
#[tokio::test]
async fn test_cache_expires_after_ttl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(envelope(users()))
        .expect(2)
        .mount(&server)
        .await;

    let client = ApiClient::anonymous(config(&server).with_cache_ttl(Duration::from_millis(50)))
        .expect("Client should build");

    let _: Value = client.get("/users", NO_PARAMS, Contract::none()).await.expect("GET");
    tokio::time::sleep(Duration::from_millis(80)).await;
    let _: Value = client.get("/users", NO_PARAMS, Contract::none()).await.expect("GET");
}

/// GET /users?limit=10 is cached, POST /users clears it, the next GET refetches
#[tokio::test]
async fn test_post_invalidates_cached_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(query_param("limit", "10"))
        .respond_with(envelope(users()))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users"))
        .respond_with(envelope(json!({ "id": 3, "name": "Linus" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let params = json!({ "limit": 10 });
    let key = client.cache_key("/users", Some(&params)).expect("Key should build");

    let _: Vec<User> = client.get("/users", Some(&params), Contract::none()).await.expect("GET");
    let _: Vec<User> = client.get("/users", Some(&params), Contract::none()).await.expect("GET");
    assert!(client.has_cached_data(&key));

    let created: User = client
        .post("/users", Some(&json!({ "name": "Linus" })), Contract::none())
        .await
        .expect("POST should succeed");
    assert_eq!(created.id, 3);
    assert!(!client.has_cached_data(&key));

    let _: Vec<User> = client.get("/users", Some(&params), Contract::none()).await.expect("GET");
}

/// PUT /orders/1 clears every cached read under /orders and nothing else
#[tokio::test]
async fn test_update_invalidates_resource_family() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orders/1"))
        .respond_with(envelope(json!({ "id": 1 })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .respond_with(envelope(json!([{ "id": 1 }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/customers"))
        .respond_with(envelope(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/orders/1"))
        .respond_with(envelope(json!({ "id": 1, "status": "shipped" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    for endpoint in ["/orders/1", "/orders", "/customers"] {
        let _: Value = client.get(endpoint, NO_PARAMS, Contract::none()).await.expect("GET");
    }

    let _: Value = client
        .put("/orders/1", Some(&json!({ "status": "shipped" })), Contract::none())
        .await
        .expect("PUT should succeed");

    let order_key = client.cache_key("/orders/1", NO_PARAMS).expect("key");
    let list_key = client.cache_key("/orders", NO_PARAMS).expect("key");
    let customers_key = client.cache_key("/customers", NO_PARAMS).expect("key");
    assert!(!client.has_cached_data(&order_key));
    assert!(!client.has_cached_data(&list_key));
    assert!(client.has_cached_data(&customers_key));
    assert_eq!(client.cache_stats().invalidations, 2);
}

/// Default substring matching also drops /users-preferences; segment matching keeps it
#[tokio::test]
async fn test_invalidation_modes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(envelope(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/users/5"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    for (mode, prefs_survive) in [
        (InvalidationMode::Substring, false),
        (InvalidationMode::SegmentPrefix, true),
    ] {
        let client = ApiClient::anonymous(config(&server).with_invalidation(mode))
            .expect("Client should build");
        let _: Value = client.get("/users", NO_PARAMS, Contract::none()).await.expect("GET");
        let _: Value = client
            .get("/users-preferences", NO_PARAMS, Contract::none())
            .await
            .expect("GET");

        client
            .delete::<(), _>("/users/5", NO_BODY, Contract::none())
            .await
            .expect("DELETE should succeed");

        let users_key = client.cache_key("/users", NO_PARAMS).expect("key");
        let prefs_key = client.cache_key("/users-preferences", NO_PARAMS).expect("key");
        assert!(!client.has_cached_data(&users_key), "{mode:?}");
        assert_eq!(client.has_cached_data(&prefs_key), prefs_survive, "{mode:?}");
    }
}

/// Concurrent identical GETs produce exactly one network request
#[tokio::test]
async fn test_concurrent_gets_are_deduplicated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(envelope(users()).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let calls = (0..5).map(|_| client.get::<Vec<User>, Value>("/users", None, Contract::none()));
    let results = join_all(calls).await;

    let expected: Vec<User> = serde_json::from_value(users()).expect("fixture");
    for result in results {
        assert_eq!(result.expect("Every caller should get the data"), expected);
    }
    assert_eq!(client.in_flight(), 0);
}

/// Null and empty-string params are dropped, and key order does not matter
#[tokio::test]
async fn test_equivalent_params_share_cache_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(envelope(users()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let noisy = json!({ "status": "active", "q": "", "team": null, "limit": 10 });
    let clean = json!({ "limit": 10, "status": "active" });

    let _: Value = client.get("/users", Some(&noisy), Contract::none()).await.expect("GET");
    let _: Value = client.get("/users", Some(&clean), Contract::none()).await.expect("GET");

    let key = client.cache_key("/users", Some(&noisy)).expect("key");
    assert!(key.ends_with("/api/users?limit=10&status=active"));
}

#[tokio::test]
async fn test_disabled_cache_always_fetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(envelope(users()))
        .expect(2)
        .mount(&server)
        .await;

    let client = ApiClient::anonymous(config(&server).with_cache_enabled(false))
        .expect("Client should build");
    let _: Value = client.get("/users", NO_PARAMS, Contract::none()).await.expect("GET");
    let _: Value = client.get("/users", NO_PARAMS, Contract::none()).await.expect("GET");
    assert_eq!(client.cache_stats().entries, 0);
}

#[tokio::test]
async fn test_failed_get_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server);
    for _ in 0..2 {
        let err = client
            .get::<Value, Value>("/users", None, Contract::none())
            .await
            .expect_err("503 should fail");
        assert_eq!(err.status(), 503);
        assert!(err.is_server_error());
    }
    assert_eq!(client.in_flight(), 0);
}

/// A response that fails its schema is reported as 422 and never cached
#[tokio::test]
async fn test_invalid_response_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/1"))
        .respond_with(envelope(json!({ "id": "one" })))
        .expect(2)
        .mount(&server)
        .await;

    let schema = JsonSchema::new(&json!({
        "type": "object",
        "properties": { "id": { "type": "integer" } },
        "required": ["id"]
    }))
    .expect("Schema should compile");

    let client = client(&server);
    for _ in 0..2 {
        let err = client
            .get::<Value, Value>("/users/1", None, Contract::output(&schema))
            .await
            .expect_err("Schema mismatch should fail");
        assert_eq!(err.status(), 422);
        assert_eq!(err.status_text(), "Response Validation Failed");
        let data = err.data().expect("Validation errors carry data");
        assert_eq!(data["received"], json!({ "id": "one" }));
    }

    let key = client.cache_key("/users/1", NO_PARAMS).expect("key");
    assert!(!client.has_cached_data(&key));
}

#[tokio::test]
async fn test_cache_management() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(envelope(json!({ "ok": true })))
        .mount(&server)
        .await;

    let client = client(&server);
    let _: Value = client.get("/a", NO_PARAMS, Contract::none()).await.expect("GET");
    let _: Value = client.get("/b", NO_PARAMS, Contract::none()).await.expect("GET");

    let a = client.cache_key("/a", NO_PARAMS).expect("key");
    let b = client.cache_key("/b", NO_PARAMS).expect("key");

    let ttl = client.cache_ttl(&a).expect("Entry should be fresh");
    assert!(ttl <= client.config().cache_ttl);
    assert_eq!(client.clear_expired_cache(), 0);

    assert!(client.clear_cache_entry(&a));
    assert!(!client.clear_cache_entry(&a));
    assert!(!client.has_cached_data(&a));
    assert!(client.has_cached_data(&b));

    client.clear_cache();
    assert!(!client.has_cached_data(&b));
    assert_eq!(client.cache_ttl(&b), None);
}
