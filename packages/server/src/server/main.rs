// Main entry point for the call distribution server

use std::sync::Arc;

use anyhow::{Context, Result};
use roundrobin_core::domains::distribution::urls::WebhookUrls;
use roundrobin_core::kernel::{PostgresCallStore, ServerDeps, TwilioAdapter};
use roundrobin_core::{server::build_app, Config};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use twilio::{TwilioOptions, TwilioService};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,roundrobin_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Round Robin Line");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let mut twilio_options = TwilioOptions::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
    );
    if let Some(api_base) = &config.twilio_api_base {
        twilio_options = twilio_options.with_api_base(api_base.clone());
    }
    let twilio = Arc::new(TwilioService::new(twilio_options));

    let urls = WebhookUrls::new(&config.public_base_url)?;
    let deps = Arc::new(ServerDeps::new(
        Arc::new(PostgresCallStore::new(pool)),
        Arc::new(TwilioAdapter::new(twilio)),
        urls,
        config.distribution.clone(),
    ));

    let app = build_app(deps.clone());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Voice webhook: {}/voice/inbound", config.public_base_url);
    tracing::info!(
        "Caller status callback (per line): {}",
        deps.urls.caller_leg_status("ACCOUNT_ID")
    );
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(deps.shutdown.clone()))
        .await
        .context("Server error")?;

    // Interrupt every in-flight distribution and wait for them to wind down
    deps.tasks.close();
    tracing::info!(running = deps.tasks.len(), "Waiting for distributions to stop");
    deps.tasks.wait().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
