//! Common test utilities for integration tests
//!
//! Builds the real router over an in-memory store and the HS256 verifier, so
//! these tests need neither PostgreSQL nor network access.
//!
//! - `TestContext`: router, store handle, and token minting
//! - `CountingStore`: `TaskStore` wrapper that records how often it is called
//! - request/response helpers
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use taskboard_api::app::{build_router, AppState};
use taskboard_api::config::Config;
use taskboard_shared::auth::jwt::{create_token, Claims, HmacVerifier};
use taskboard_shared::models::task::{CreateTask, Task, UpdateTask};
use taskboard_shared::store::{MemoryTaskStore, StoreError, StoreResult, TaskStore};
use tower::Service as _;

pub const SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const ISSUER: &str = "taskboard";

/// Delegates to an inner store and counts every call
pub struct CountingStore {
    inner: MemoryTaskStore,
    calls: AtomicUsize,
    fail: bool,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryTaskStore::new(),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// A store whose every operation fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryTaskStore {
        &self.inner
    }

    fn hit(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for CountingStore {
    fn backend(&self) -> &'static str {
        "counting"
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.hit()?;
        self.inner.health_check().await
    }

    async fn list_tasks(&self, author_id: &str, search: Option<&str>) -> StoreResult<Vec<Task>> {
        self.hit()?;
        self.inner.list_tasks(author_id, search).await
    }

    async fn find_task(&self, id: i32) -> StoreResult<Option<Task>> {
        self.hit()?;
        self.inner.find_task(id).await
    }

    async fn ensure_user(&self, id: &str, email: Option<&str>) -> StoreResult<()> {
        self.hit()?;
        self.inner.ensure_user(id, email).await
    }

    async fn create_task(&self, data: CreateTask) -> StoreResult<Task> {
        self.hit()?;
        self.inner.create_task(data).await
    }

    async fn update_task(&self, id: i32, data: UpdateTask) -> StoreResult<Option<Task>> {
        self.hit()?;
        self.inner.update_task(id, data).await
    }

    async fn delete_task(&self, id: i32) -> StoreResult<bool> {
        self.hit()?;
        self.inner.delete_task(id).await
    }
}

/// Test context containing the router and its store
pub struct TestContext {
    pub app: axum::Router,
    pub store: Arc<CountingStore>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_store(CountingStore::new())
    }

    pub fn with_store(store: CountingStore) -> Self {
        let store = Arc::new(store);
        let state = AppState::new(
            store.clone(),
            Arc::new(HmacVerifier::new(SECRET, ISSUER)),
            test_config(),
        );

        Self {
            app: build_router(state),
            store,
        }
    }

    /// Sends a request through the full middleware stack
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().call(request).await.unwrap()
    }

    /// Creates a task through the API and returns its JSON
    pub async fn create_task(&self, user: &str, text: &str) -> serde_json::Value {
        let response = self
            .send(json_request(
                "POST",
                "/api/tasks",
                Some(user),
                serde_json::json!({ "text": text }),
            ))
            .await;
        assert_eq!(response.status(), 201);
        body_json(response).await
    }
}

pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("API_HOST", "127.0.0.1"),
        ("STORAGE_BACKEND", "memory"),
        ("AUTH_PROVIDER", "hs256"),
        ("JWT_SECRET", SECRET),
        ("JWT_ISSUER", ISSUER),
    ]);
    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

/// Valid bearer token for `user`
pub fn token_for(user: &str) -> String {
    create_token(
        &Claims::new(user, ISSUER).with_email(format!("{}@example.com", user)),
        SECRET,
    )
    .unwrap()
}

pub fn expired_token_for(user: &str) -> String {
    create_token(
        &Claims::with_expiration(user, ISSUER, Duration::seconds(-3600)),
        SECRET,
    )
    .unwrap()
}

/// Request without a body, authenticated as `user` if given
pub fn request(method: &str, uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("authorization", format!("Bearer {}", token_for(user)));
    }
    builder.body(Body::empty()).unwrap()
}

/// JSON request, authenticated as `user` if given
pub fn json_request(
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    raw_request(method, uri, user, body.to_string())
}

/// Request with an arbitrary (possibly malformed) JSON body
pub fn raw_request(method: &str, uri: &str, user: Option<&str>, body: String) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("authorization", format!("Bearer {}", token_for(user)));
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
