//! # Taskboard Shared Library
//!
//! Types and persistence/auth plumbing shared by the Taskboard API server and
//! its integration tests.
//!
//! ## Module Organization
//!
//! - `models`: Database models (tasks, users) and their SQL operations
//! - `db`: Connection pool and migration runner
//! - `store`: The persistence gateway (`TaskStore`) with PostgreSQL and in-memory backends
//! - `auth`: Bearer token verification, auth context, and the ownership guard

pub mod auth;
pub mod db;
pub mod models;
pub mod store;

/// Current version of the Taskboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
