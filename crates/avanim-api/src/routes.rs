//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;

use crate::handlers::account::{
    get_profile, login, logout, signup, update_profile, update_subscription,
};
use crate::handlers::admin::{delete_user, list_users, update_user};
use crate::handlers::animations::{
    delete_animation, generate_animation, generate_custom_animation, list_animations,
};
use crate::handlers::avatars::{delete_avatar, list_avatars, upload_avatar};
use crate::handlers::expressions::get_expressions;
use crate::handlers::{health, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let account_routes = Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/subscription/update", post(update_subscription));

    let avatar_routes = Router::new()
        .route("/avatar/upload", post(upload_avatar))
        .route("/avatars", get(list_avatars))
        .route("/avatar/:avatar_id", delete(delete_avatar));

    let animation_routes = Router::new()
        .route("/expressions", get(get_expressions))
        .route("/animation/generate", post(generate_animation))
        .route("/animation/custom", post(generate_custom_animation))
        .route("/animations", get(list_animations))
        .route("/animation/:animation_id", delete(delete_animation));

    let admin_routes = Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/user/:user_id", put(update_user))
        .route("/admin/user/:user_id", delete(delete_user));

    let rate_limiter = Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .merge(account_routes)
        .merge(avatar_routes)
        .merge(animation_routes)
        .merge(admin_routes)
        // multipart extractors default to 2 MiB
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        // driving uploads stay private to the generator
        .nest_service("/static/avatars", ServeDir::new(state.config.avatars_dir()))
        .nest_service("/static/animations", ServeDir::new(state.config.animations_dir()))
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
