/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskboard_api::{app::{build_router, AppState}, config::Config};
/// use taskboard_shared::auth::jwt::HmacVerifier;
/// use taskboard_shared::store::MemoryTaskStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(
///     Arc::new(MemoryTaskStore::new()),
///     Arc::new(HmacVerifier::new("a-local-development-secret-of-32-bytes", "taskboard")),
///     config,
/// );
///
/// let app = build_router(state);
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ErrorResponse,
    middleware::{auth::require_auth, security::SecurityHeadersLayer, trace::RequestSpan},
    routes,
};
use axum::{
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::{any::Any, sync::Arc, time::Duration};
use taskboard_shared::{auth::verifier::TokenVerifier, store::TaskStore};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any as AnyOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Upper bound on request handling time
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on request body size (1 MiB)
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state
///
/// Cloned for each request via Axum's `State` extractor; every field is an
/// `Arc`, so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Persistence gateway
    pub store: Arc<dyn TaskStore>,

    /// Bearer token verifier
    pub verifier: Arc<dyn TokenVerifier>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn TaskStore>, verifier: Arc<dyn TokenVerifier>, config: Config) -> Self {
        Self {
            store,
            verifier,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Routes
///
/// ```text
/// /
/// ├── GET /health              # Health check (public)
/// └── /api/                    # Bearer token required
///     ├── GET    /tasks        # List own tasks (?search=)
///     ├── POST   /tasks        # Create task
///     ├── GET    /tasks/:id    # Read task
///     ├── PATCH  /tasks/:id    # Update text / completed
///     └── DELETE /tasks/:id    # Delete task
/// ```
///
/// # Middleware Stack
///
/// Outermost first:
/// 1. Request id (`x-request-id`, generated if missing, echoed back)
/// 2. Access log (tower-http TraceLayer)
/// 3. Panic capture (rendered as the standard 500 body)
/// 4. Body size limit, then timeout
/// 5. CORS
/// 6. Security headers
/// 7. Authentication (`/api` only)
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/tasks/:id",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let cors = cors_layer(&state.config);
    let production = state.config.api.production;
    let cloud_project = state.config.logging.cloud_project.clone();

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .fallback(routes::not_found)
        .layer(SecurityHeadersLayer::new(production))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(RequestSpan::new(cloud_project.as_deref()))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(cors),
        )
        .with_state(state)
}

/// Any origin when `*` is configured outside production, otherwise the
/// explicit allow-list
fn cors_layer(config: &Config) -> CorsLayer {
    let origins = &config.api.cors_origins;

    let allow_origin = if !config.api.production && origins.iter().any(|o| o == "*") {
        AllowOrigin::from(AnyOrigin)
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter(|origin| origin.as_str() != "*")
                .filter_map(|origin| origin.parse().ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };

    tracing::error!(panic = %detail, "Handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::internal()),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned()).unwrap()
    }

    #[tokio::test]
    async fn test_handle_panic_body() {
        let response = handle_panic(Box::new("boom".to_string()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "internal server error");
        assert!(!body.to_string().contains("boom"));
    }

    #[test]
    fn test_cors_layer_builds_for_both_modes() {
        let base = [("STORAGE_BACKEND", "memory"), ("FIREBASE_PROJECT_ID", "p")];
        let _ = cors_layer(&config(&base));

        let mut strict = base.to_vec();
        strict.push(("CORS_ORIGINS", "https://app.example"));
        let _ = cors_layer(&config(&strict));

        let mut production = base.to_vec();
        production.push(("APP_ENV", "production"));
        let _ = cors_layer(&config(&production));
    }
}
