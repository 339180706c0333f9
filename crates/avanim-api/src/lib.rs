//! Axum HTTP API server for the avatar animation platform.
//!
//! This crate provides:
//! - Account signup/login with argon2 password hashes and JWT sessions
//! - Avatar uploads and animation generation through the motion-transfer wrapper
//! - Role-gated admin user management
//! - Rate limiting, security headers and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{AnimationService, AvatarService, MediaFiles, UserService};
pub use state::{build_store, AppState};
