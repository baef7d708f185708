//! RapidXSolution site service
//!
//! Serves the marketing site's content (portfolio projects, blog posts,
//! client reviews, trusted partners) and the admin content-management API.
//!
//! # Features
//!
//! - Admin authentication with attempt counting, timed lockout, and
//!   session expiry, persisted through a pluggable key/value store
//! - Content CRUD over a hosted libSQL/Turso database or in memory
//! - JSON HTTP API built on axum

pub mod auth;
pub mod config;
pub mod content;
pub mod error;
#[cfg(feature = "http-server")]
pub mod http_transport;
pub mod logging;

// Re-export main types for convenience
pub use config::ServerConfig;
pub use error::{Result, SiteError};
