// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Terminal front end for the WHOOP dashboard.
//!
//! Usage:
//!   whoop-cli login       authorize and store tokens
//!   whoop-cli dashboard   print the dashboard snapshot as JSON (default)
//!   whoop-cli logout      forget stored tokens
//!
//! Tokens live in `TOKEN_STORE_PATH`; OAuth calls go through the local
//! service at `LOCAL_API_URL`, which holds the client secret.

use anyhow::{bail, Context};
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use whoop_dashboard::config::DEFAULT_API_BASE_URL;
use whoop_dashboard::models::TokenPair;
use whoop_dashboard::services::{
    Dashboard, DashboardView, FileTokenStore, LocalAuthClient, TokenObserver, TokenStore,
    WhoopClient,
};

struct CliConfig {
    token_store_path: String,
    local_api_url: String,
    api_base_url: String,
    timeout: Duration,
}

impl CliConfig {
    fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            token_store_path: std::env::var("TOKEN_STORE_PATH")
                .unwrap_or_else(|_| ".whoop_tokens.json".to_string()),
            local_api_url: std::env::var("LOCAL_API_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            api_base_url: std::env::var("WHOOP_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("UPSTREAM_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}

/// Logs refreshes so the user can see the session was renewed.
struct RefreshLogger;

impl TokenObserver for RefreshLogger {
    fn on_tokens_refreshed(&self, _tokens: &TokenPair) {
        tracing::info!("Session renewed with a fresh access token");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("whoop_dashboard=info,warn")),
        )
        .init();

    let config = CliConfig::from_env();
    let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(&config.token_store_path));
    let local = LocalAuthClient::new(&config.local_api_url, config.timeout)?;

    let command = std::env::args().nth(1).unwrap_or_else(|| "dashboard".to_string());
    match command.as_str() {
        "login" => login(&local, store.as_ref()).await,
        "dashboard" => dashboard(&config, local, store).await,
        "logout" => {
            store.clear()?;
            eprintln!("Stored tokens removed.");
            Ok(())
        }
        other => bail!("unknown command `{}` (expected login, dashboard or logout)", other),
    }
}

async fn login(local: &LocalAuthClient, store: &dyn TokenStore) -> anyhow::Result<()> {
    let auth_url = local
        .auth_url()
        .await
        .context("Failed to get authorization URL")?;

    eprintln!("Open this URL and authorize access:\n\n  {}\n", auth_url);
    eprintln!("Then paste the URL you were redirected to (or just the code):");

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let (code, state) = parse_redirect(line.trim())?;

    let tokens = local
        .exchange_code(&code, state.as_deref())
        .await
        .context("Token exchange failed")?;
    store.save(&tokens)?;

    eprintln!("Connected. Run `whoop-cli dashboard` to see your data.");
    Ok(())
}

async fn dashboard(
    config: &CliConfig,
    local: LocalAuthClient,
    store: Arc<dyn TokenStore>,
) -> anyhow::Result<()> {
    let client = WhoopClient::new(&config.api_base_url, config.timeout, local, store)?
        .with_observer(Arc::new(RefreshLogger));

    match Dashboard::new(client).load().await? {
        DashboardView::Ready(data) => {
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(())
        }
        DashboardView::Unauthenticated => {
            eprintln!("Not signed in or session expired. Run `whoop-cli login`.");
            std::process::exit(2);
        }
    }
}

/// Pull `code` and `state` out of a pasted redirect URL, or accept a bare code.
fn parse_redirect(input: &str) -> anyhow::Result<(String, Option<String>)> {
    let Some((_, query)) = input.split_once('?') else {
        if input.is_empty() {
            bail!("No authorization code received");
        }
        return Ok((input.to_string(), None));
    };

    let mut code = None;
    let mut state = None;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(value)?.into_owned();
        match key {
            "code" => code = Some(value),
            "state" => state = Some(value),
            "error" => bail!("Authorization failed: {}", value),
            _ => {}
        }
    }

    let code = code
        .filter(|c| !c.is_empty())
        .context("No authorization code received")?;
    Ok((code, state))
}
