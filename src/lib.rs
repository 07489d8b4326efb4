// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! WHOOP dashboard: OAuth token lifecycle and resource fetching for the
//! WHOOP developer API.
//!
//! The server half exposes the OAuth endpoints that need the client secret.
//! The client half ([`services::WhoopClient`], [`services::Dashboard`])
//! fetches resources and refreshes expired access tokens transparently.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use services::OAuthExchanger;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub oauth: OAuthExchanger,
}
