//! # Taskboard API Server
//!
//! Multi-user task tracking over a JSON API. Callers authenticate with a
//! Firebase ID token (or an HS256 token in local development) and manage
//! their own to-do items.
//!
//! ## Startup
//!
//! 1. Load configuration; anything missing or invalid aborts startup
//! 2. Open the store (PostgreSQL pool plus migrations, or in-memory)
//! 3. Build the token verifier; Firebase keys are fetched before serving
//! 4. Serve until Ctrl-C / SIGTERM, then close the pool
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p taskboard-api
//! ```

use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;
use taskboard_api::{
    app::{build_router, AppState},
    config::{AuthProvider, Config, LogFormat, StorageBackend},
    telemetry,
};
use taskboard_shared::{
    auth::{firebase::FirebaseVerifier, jwt::HmacVerifier, verifier::TokenVerifier},
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    store::{MemoryTaskStore, PgTaskStore, TaskStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            telemetry::init(LogFormat::Pretty);
            tracing::error!(error = %err, "Invalid configuration");
            return Err(err);
        }
    };
    telemetry::init(config.logging.format);

    tracing::info!(
        "Taskboard API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let (store, pool) = open_store(&config).await.inspect_err(|err| {
        tracing::error!(error = %err, "Failed to open store");
    })?;

    let verifier = build_verifier(&config).await.inspect_err(|err| {
        tracing::error!(error = %err, "Failed to initialize token verifier");
    })?;

    let bind_address = config.bind_address();
    let app = build_router(AppState::new(store, verifier, config));

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {}", bind_address))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = pool {
        close_pool(pool).await;
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn open_store(config: &Config) -> anyhow::Result<(Arc<dyn TaskStore>, Option<PgPool>)> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; tasks are lost on restart");
            Ok((Arc::new(MemoryTaskStore::new()), None))
        }
        StorageBackend::Postgres => {
            let url = config
                .storage
                .database_url
                .clone()
                .context("DATABASE_URL environment variable is required")?;

            let db_config = DatabaseConfig {
                max_connections: config.storage.max_connections,
                ..DatabaseConfig::from_url(url)
            };
            let pool = create_pool(db_config)
                .await
                .context("failed to connect to PostgreSQL")?;

            if config.storage.run_migrations {
                run_migrations(&pool)
                    .await
                    .context("failed to run database migrations")?;
            }

            Ok((Arc::new(PgTaskStore::new(pool.clone())), Some(pool)))
        }
    }
}

async fn build_verifier(config: &Config) -> anyhow::Result<Arc<dyn TokenVerifier>> {
    let auth = &config.auth;

    match auth.provider {
        AuthProvider::Firebase => {
            let project_id = auth
                .firebase_project_id
                .clone()
                .context("FIREBASE_PROJECT_ID environment variable is required")?;

            let verifier = FirebaseVerifier::new(project_id)?;
            verifier
                .initialize()
                .await
                .context("failed to fetch Firebase signing keys")?;

            Ok(Arc::new(verifier))
        }
        AuthProvider::Hs256 => {
            let secret = auth
                .jwt_secret
                .clone()
                .context("JWT_SECRET environment variable is required")?;

            tracing::warn!("Using HS256 shared-secret tokens; intended for development only");
            Ok(Arc::new(HmacVerifier::new(secret, auth.jwt_issuer.clone())))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}
