// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! WHOOP Dashboard API Server
//!
//! Holds the OAuth client credentials and performs the token endpoint calls
//! on behalf of the dashboard front end.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use whoop_dashboard::{config::Config, services::OAuthExchanger, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting WHOOP dashboard API");

    // Missing credentials only fail the requests that need them.
    for (name, present) in [
        ("CLIENT_ID", config.credentials.client_id().is_ok()),
        ("CLIENT_SECRET", config.credentials.client_secret().is_ok()),
        ("REDIRECT_URI", config.credentials.redirect_uri().is_ok()),
    ] {
        if !present {
            tracing::warn!(variable = name, "OAuth configuration missing");
        }
    }

    let oauth = OAuthExchanger::from_config(&config)?;

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        oauth,
    });

    // Build router
    let app = whoop_dashboard::routes::create_router(state);

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

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("whoop_dashboard=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
