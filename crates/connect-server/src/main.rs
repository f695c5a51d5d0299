//! connect-server
//!
//! Axum server for a Connect storefront: lists connected accounts, opens
//! direct-charge Checkout sessions on them with a platform application fee,
//! and receives Stripe webhooks for fulfillment.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use anyhow::Context;
use axum::{routing::{get, post}, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use connect_payments::{LogFulfillment, StripeClient};

use crate::config::Config;
use crate::handlers::{
    create_checkout_session, express_dashboard_link, get_config, health_check,
    onboarding_link, stripe_webhook,
};
use crate::state::AppState;

/// Routes plus the static storefront as fallback
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/health", get(health_check))
        .route("/config", get(get_config))

        // Connected accounts
        .route("/express-dashboard-link", get(express_dashboard_link))
        .route("/onboarding-link", get(onboarding_link))

        // Payments
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/webhook", post(stripe_webhook))

        // index.html, success.html, canceled.html
        .fallback_service(static_files)

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment before the filter reads RUST_LOG
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    tracing::debug!(?config, "Configuration loaded");

    if !config.static_dir.is_dir() {
        tracing::warn!("⚠ Static directory {} not found", config.static_dir.display());
        tracing::warn!("  Set STATIC_DIR to the folder holding index.html");
    }

    let stripe = StripeClient::new(&config.secret_key).with_timeout(config.stripe_timeout);
    tracing::info!(
        "✓ Stripe configured (fee {}%, timeout {}s)",
        config.fees.percent(),
        config.stripe_timeout.as_secs()
    );

    let addr = config.bind_addr.clone();
    let state = AppState::new(config, Arc::new(stripe), Arc::new(LogFulfillment));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 connect-server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /                        - Storefront");
    tracing::info!("  GET  /health                  - Health check");
    tracing::info!("  GET  /config                  - Publishable key and accounts");
    tracing::info!("  GET  /express-dashboard-link  - Express dashboard login");
    tracing::info!("  GET  /onboarding-link         - Resume account onboarding");
    tracing::info!("  POST /create-checkout-session - Direct-charge checkout");
    tracing::info!("  POST /webhook                 - Stripe events");
    tracing::info!("");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
