// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bazaar-Auth identity gate
//!
//! Verifies the hosted provider's access tokens for the platform's
//! feature services.

use bazaar_auth::{config::Config, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Bazaar-Auth identity gate");

    let state = Arc::new(AppState {
        config: config.clone(),
    });

    // Build router
    let app = bazaar_auth::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(
                    "bazaar_auth=debug"
                        .parse()
                        .unwrap_or_else(|_| tracing::Level::DEBUG.into()),
                )
                .add_directive(tracing::Level::INFO.into()),
        )
        .with(format)
        .init();
}
