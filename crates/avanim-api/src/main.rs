//! Axum API server binary.

use std::net::SocketAddr;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use avanim_api::services::seed_expressions;
use avanim_api::{build_store, create_router, metrics, ApiConfig, AppState};
use avanim_media::{AnimatorConfig, AnimatorHandle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    init_tracing()?;

    info!("Starting avanim-api");

    let config = ApiConfig::from_env();
    info!(
        "API config: host={}, port={}, store={:?}, static_root={}",
        config.host,
        config.port,
        config.store_backend,
        config.static_root.display()
    );

    let store = build_store(&config)
        .await
        .context("Failed to initialize store")?;

    // Load the model off the runtime threads; failures leave the API up without generation
    let animator_config = AnimatorConfig::from_env();
    let catalog = animator_config.catalog.clone();
    let animator = tokio::task::spawn_blocking(move || AnimatorHandle::load(animator_config))
        .await
        .context("Model loading task failed")?;
    if let Some(reason) = animator.not_ready_reason() {
        warn!("Animation generation disabled: {}", reason);
    }

    let state = AppState::new(config.clone(), store, animator);
    state.files.ensure_dirs().await?;
    seed_expressions(&state.store, &catalog).await?;

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        state.user_service.ensure_admin(email, password).await?;
    }

    // Initialize metrics
    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    let metrics_handle = if metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("Failed to install metrics recorder")?)
    } else {
        None
    };

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid bind address")?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("avanim_api=info".parse()?)
        .add_directive("avanim_media=info".parse()?)
        .add_directive("avanim_store=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
