/// Middleware modules for the API server
///
/// - `auth`: Bearer token authentication for `/api/*`
/// - `security`: Security response headers
/// - `trace`: Request spans (request id, Cloud trace)

pub mod auth;
pub mod security;
pub mod trace;
