//! API configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

/// Which [`Store`](avanim_store::Store) implementation backs the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Firestore,
}

impl StoreBackend {
    fn from_env_value(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "firestore" => StoreBackend::Firestore,
            "memory" => StoreBackend::Memory,
            other => {
                warn!("Unknown STORE_BACKEND '{}', using memory", other);
                StoreBackend::Memory
            }
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    /// Per-IP requests per second on `/api`
    pub rate_limit_rps: u32,
    /// Max request body size, uploads included
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Directory served under `/static`; holds `avatars/`, `animations/`
    /// and `driving/`
    pub static_root: PathBuf,
    /// HMAC secret for session tokens
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub store_backend: StoreBackend,
    /// Admin account ensured at startup when both are set
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 20,
            max_body_size: 16 * 1024 * 1024,
            environment: "development".to_string(),
            static_root: PathBuf::from("static"),
            jwt_secret: random_secret(),
            session_ttl: Duration::from_secs(24 * 3600),
            store_backend: StoreBackend::Memory,
            admin_email: None,
            admin_password: None,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("JWT_SECRET not set, sessions will not survive a restart");
                defaults.jwt_secret
            }
        };

        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_rps),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            static_root: std::env::var("STATIC_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_root),
            jwt_secret,
            session_ttl: std::env::var("SESSION_TTL_HOURS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(|h| Duration::from_secs(h * 3600))
                .unwrap_or(defaults.session_ttl),
            store_backend: std::env::var("STORE_BACKEND")
                .map(|v| StoreBackend::from_env_value(&v))
                .unwrap_or(defaults.store_backend),
            admin_email: std::env::var("ADMIN_EMAIL").ok().filter(|s| !s.is_empty()),
            admin_password: std::env::var("ADMIN_PASSWORD").ok().filter(|s| !s.is_empty()),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    pub fn avatars_dir(&self) -> PathBuf {
        self.static_root.join("avatars")
    }

    pub fn animations_dir(&self) -> PathBuf {
        self.static_root.join("animations")
    }

    pub fn driving_dir(&self) -> PathBuf {
        self.static_root.join("driving")
    }

    /// Absolute location of a stored relative path such as `avatars/x.png`.
    pub fn resolve_static(&self, relative: &str) -> PathBuf {
        self.static_root.join(Path::new(relative))
    }
}

fn random_secret() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}
