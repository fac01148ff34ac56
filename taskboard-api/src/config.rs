/// Configuration management for the API server
///
/// This module loads configuration from environment variables (and a `.env`
/// file, if present) into a type-safe configuration struct. Anything missing
/// or malformed is reported at startup and the server does not start.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT` / `PORT`: Port to bind to (default: 8080, `PORT` wins)
/// - `APP_ENV`: `development` or `production` (default: development)
/// - `CORS_ORIGINS`: Comma-separated allowed origins (default: *)
/// - `STORAGE_BACKEND`: `postgres` or `memory` (default: postgres)
/// - `DATABASE_URL`: PostgreSQL connection string (required for postgres)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `RUN_MIGRATIONS`: Apply bundled migrations at startup (default: true)
/// - `AUTH_PROVIDER`: `firebase` or `hs256` (default: firebase)
/// - `FIREBASE_PROJECT_ID` / `GOOGLE_CLOUD_PROJECT`: Firebase project (required for firebase)
/// - `JWT_SECRET`: HS256 secret, at least 32 characters (required for hs256)
/// - `JWT_ISSUER`: HS256 issuer (default: taskboard)
/// - `LOG_FORMAT`: `json` or `pretty` (default: pretty)
/// - `RUST_LOG`: Log filter
///
/// # Example
///
/// ```no_run
/// use taskboard_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use std::env;
use std::str::FromStr;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Persistence configuration
    pub storage: StorageConfig,

    /// Token verification configuration
    pub auth: AuthConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins (`*` means any)
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS, strict CORS)
    pub production: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => anyhow::bail!("STORAGE_BACKEND must be 'postgres' or 'memory', got '{}'", other),
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// PostgreSQL connection URL (set when backend is postgres)
    pub database_url: Option<String>,

    /// Maximum number of connections in pool
    pub max_connections: u32,

    /// Apply bundled migrations at startup
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProvider {
    Firebase,
    Hs256,
}

impl FromStr for AuthProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firebase" => Ok(AuthProvider::Firebase),
            "hs256" => Ok(AuthProvider::Hs256),
            other => anyhow::bail!("AUTH_PROVIDER must be 'firebase' or 'hs256', got '{}'", other),
        }
    }
}

/// Token verification configuration
#[derive(Clone)]
pub struct AuthConfig {
    pub provider: AuthProvider,

    /// Firebase project id (set when provider is firebase)
    pub firebase_project_id: Option<String>,

    /// HS256 secret (set when provider is hs256)
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub jwt_secret: Option<String>,

    /// HS256 issuer
    pub jwt_issuer: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("provider", &self.provider)
            .field("firebase_project_id", &self.firebase_project_id)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("jwt_issuer", &self.jwt_issuer)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,

    /// Google Cloud project used to build Cloud Logging trace paths
    pub cloud_project: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match var("PORT").or_else(|| var("API_PORT")) {
            Some(port) => port
                .trim()
                .parse::<u16>()
                .with_context(|| format!("invalid port '{}'", port))?,
            None => 8080,
        };

        let production = var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let cors_origins: Vec<String> = var("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let backend = var("STORAGE_BACKEND")
            .map(|v| v.parse::<StorageBackend>())
            .transpose()?
            .unwrap_or(StorageBackend::Postgres);

        let database_url = var("DATABASE_URL");
        if backend == StorageBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL environment variable is required");
        }

        let max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .with_context(|| format!("invalid DATABASE_MAX_CONNECTIONS '{}'", v))?,
            None => 10,
        };
        if max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
        }

        let run_migrations = match var("RUN_MIGRATIONS") {
            Some(v) => parse_bool(&v).with_context(|| format!("invalid RUN_MIGRATIONS '{}'", v))?,
            None => true,
        };

        let provider = var("AUTH_PROVIDER")
            .map(|v| v.parse::<AuthProvider>())
            .transpose()?
            .unwrap_or(AuthProvider::Firebase);

        let firebase_project_id = var("FIREBASE_PROJECT_ID").or_else(|| var("GOOGLE_CLOUD_PROJECT"));
        if provider == AuthProvider::Firebase && firebase_project_id.is_none() {
            anyhow::bail!("FIREBASE_PROJECT_ID environment variable is required");
        }

        let jwt_secret = var("JWT_SECRET");
        if provider == AuthProvider::Hs256 {
            match &jwt_secret {
                None => anyhow::bail!("JWT_SECRET environment variable is required"),
                Some(secret) if secret.len() < 32 => {
                    anyhow::bail!("JWT_SECRET must be at least 32 characters long")
                }
                Some(_) => {}
            }
        }
        let jwt_issuer = var("JWT_ISSUER").unwrap_or_else(|| "taskboard".to_string());

        let format = match var("LOG_FORMAT") {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        let cloud_project = var("GOOGLE_CLOUD_PROJECT").or_else(|| firebase_project_id.clone());

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
                production,
            },
            storage: StorageConfig {
                backend,
                database_url,
                max_connections,
                run_migrations,
            },
            auth: AuthConfig {
                provider,
                firebase_project_id,
                jwt_secret,
                jwt_issuer,
            },
            logging: LoggingConfig {
                format,
                cloud_project,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("expected a boolean"),
    }
}
