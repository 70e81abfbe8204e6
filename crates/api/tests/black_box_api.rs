use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value as JsonValue, json};

use keystone_api::app::{self, services::AppServices};
use keystone_api::server::HttpServer;
use keystone_core::{StoreError, StoreResult};
use keystone_customers::CUSTOMER_VIEWS;
use keystone_infra::StartupPhase;
use keystone_infra::migration::MigrationTarget;
use keystone_infra::read_model::{DocumentStore, InMemoryDocumentStore};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Run the full startup sequence against in-memory stores on an ephemeral port.
    async fn spawn() -> Self {
        Self::spawn_with(AppServices::in_memory()).await
    }

    async fn spawn_with(services: AppServices) -> Self {
        let services = Arc::new(services);
        let router = app::build_app(Arc::clone(&services));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let server = HttpServer::from_listener(listener, router);
        let addr = server.local_addr().expect("bound listener has an address");
        let base_url = format!("http://{}", addr);

        let mut sequencer = services.startup_sequencer();
        let handle = tokio::spawn(async move {
            sequencer.run(server).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Read store whose next put or delete fails once with `Unavailable`.
struct FlakyReadStore {
    inner: InMemoryDocumentStore,
    fail_put: AtomicBool,
    fail_delete: AtomicBool,
}

impl FlakyReadStore {
    fn new() -> Self {
        Self {
            inner: InMemoryDocumentStore::new([CUSTOMER_VIEWS]),
            fail_put: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    fn outage() -> StoreError {
        StoreError::unavailable("read store offline")
    }
}

#[async_trait]
impl DocumentStore for FlakyReadStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn missing_collections(&self) -> StoreResult<Vec<String>> {
        self.inner.missing_collections().await
    }

    async fn ensure_collections(&self) -> StoreResult<()> {
        self.inner.ensure_collections().await
    }

    async fn put_document(&self, collection: &str, id: &str, body: JsonValue) -> StoreResult<()> {
        if self.fail_put.swap(false, Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.put_document(collection, id, body).await
    }

    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<JsonValue>> {
        self.inner.get_document(collection, id).await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<bool> {
        if self.fail_delete.swap(false, Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.delete_document(collection, id).await
    }
}

fn services_with(read_store: Arc<FlakyReadStore>) -> AppServices {
    AppServices {
        read_store,
        ..AppServices::in_memory()
    }
}

async fn create_customer(client: &reqwest::Client, srv: &TestServer, name: &str, email: &str) -> String {
    let res = client
        .post(srv.url("/customers"))
        .json(&json!({ "name": name, "email": email }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn startup_prepares_every_store_before_serving() {
    let services = AppServices::in_memory();
    let mut sequencer = services.startup_sequencer();

    sequencer.prepare().await.unwrap();

    assert!(services.mappings.is_compiled());
    assert!(!services.write_schema.has_pending_changes().await.unwrap());
    assert!(!services.event_schema.has_pending_changes().await.unwrap());
    assert!(services.read_store.missing_collections().await.unwrap().is_empty());
    assert_eq!(
        sequencer.phase(),
        Some(StartupPhase::EnsuringReadCollections)
    );
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn customer_lifecycle_create_update_delete() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let id = create_customer(&client, &srv, "Ada Lovelace", "Ada@Example.com").await;

    // Write store
    let res = client
        .get(srv.url(&format!("/customers/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["name"], "Ada Lovelace");
    assert_eq!(body["email"], "ada@example.com");

    // Read store projection
    let res = client
        .get(srv.url(&format!("/customers/{id}/view")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let view: serde_json::Value = res.json().await.unwrap();
    assert_eq!(view["name"], "Ada Lovelace");
    assert!(view["member_since"].is_string());

    // Update
    let res = client
        .put(srv.url(&format!("/customers/{id}")))
        .json(&json!({ "name": "Countess of Lovelace" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["name"], "Countess of Lovelace");
    assert_eq!(body["email"], "ada@example.com");

    let view: serde_json::Value = client
        .get(srv.url(&format!("/customers/{id}/view")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["name"], "Countess of Lovelace");

    // Delete
    let res = client
        .delete(srv.url(&format!("/customers/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    for path in [format!("/customers/{id}"), format!("/customers/{id}/view")] {
        let res = client.get(srv.url(&path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{path}");
    }
}

#[tokio::test]
async fn invalid_input_is_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/customers"))
        .json(&json!({ "name": "Ada", "email": "not-an-email" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = client
        .get(srv.url("/customers/not-a-uuid"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");

    let id = create_customer(&client, &srv, "Grace", "grace@example.com").await;
    let res = client
        .put(srv.url(&format!("/customers/{id}")))
        .json(&json!({ "name": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Rejected update leaves the stored customer untouched.
    let body: serde_json::Value = client
        .get(srv.url(&format!("/customers/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["name"], "Grace");
}

#[tokio::test]
async fn unknown_customers_are_not_found() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let id = "0190a4f2-0000-7000-8000-000000000000";

    let res = client
        .get(srv.url(&format!("/customers/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");

    let res = client
        .put(srv.url(&format!("/customers/{id}")))
        .json(&json!({ "name": "Nobody" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .delete(srv.url(&format!("/customers/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn retried_delete_removes_a_view_left_behind() {
    let read_store = Arc::new(FlakyReadStore::new());
    let srv = TestServer::spawn_with(services_with(Arc::clone(&read_store))).await;
    let client = reqwest::Client::new();

    let id = create_customer(&client, &srv, "Ada", "ada@example.com").await;

    read_store.fail_delete.store(true, Ordering::SeqCst);
    let res = client
        .delete(srv.url(&format!("/customers/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let res = client
        .delete(srv.url(&format!("/customers/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    for path in [format!("/customers/{id}"), format!("/customers/{id}/view")] {
        let res = client.get(srv.url(&path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{path}");
    }

    // Nothing left to remove.
    let res = client
        .delete(srv.url(&format!("/customers/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_succeeds_when_the_view_cannot_be_written() {
    let read_store = Arc::new(FlakyReadStore::new());
    let srv = TestServer::spawn_with(services_with(Arc::clone(&read_store))).await;
    let client = reqwest::Client::new();

    read_store.fail_put.store(true, Ordering::SeqCst);
    let id = create_customer(&client, &srv, "Grace", "grace@example.com").await;

    let res = client
        .get(srv.url(&format!("/customers/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(srv.url(&format!("/customers/{id}/view")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // The next write projects the view again.
    let res = client
        .put(srv.url(&format!("/customers/{id}")))
        .json(&json!({ "name": "Grace Hopper" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let view: serde_json::Value = client
        .get(srv.url(&format!("/customers/{id}/view")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["name"], "Grace Hopper");
}
