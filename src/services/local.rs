// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client for this application's own auth endpoints.
//!
//! Front ends never hold the OAuth client secret, so they exchange codes and
//! refresh tokens through the local service instead of calling WHOOP.

use crate::error::{AppError, Result};
use crate::models::TokenPair;
use crate::services::oauth::TokenRefresher;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use std::time::Duration;

/// Error code the local service uses for a rejected refresh token.
pub const REFRESH_TOKEN_EXPIRED: &str = "refresh_token_expired";

#[derive(Deserialize)]
struct AuthUrlBody {
    #[serde(rename = "authUrl")]
    auth_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for `/auth-url`, `/auth-token` and `/auth-refresh`.
#[derive(Clone)]
pub struct LocalAuthClient {
    http: reqwest::Client,
    base_url: String,
}

impl LocalAuthClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Ask the service for the WHOOP consent URL.
    pub async fn auth_url(&self) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/auth-url", self.base_url))
            .send()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        let body: AuthUrlBody = read_body(response).await?;
        Ok(body.auth_url)
    }

    /// Exchange the code from the OAuth redirect.
    pub async fn exchange_code(&self, code: &str, state: Option<&str>) -> Result<TokenPair> {
        let response = self
            .http
            .post(format!("{}/auth-token", self.base_url))
            .json(&json!({ "code": code, "state": state }))
            .send()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        read_body(response).await
    }
}

impl TokenRefresher for LocalAuthClient {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let response = self
            .http
            .post(format!("{}/auth-refresh", self.base_url))
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        read_body(response).await
    }
}

/// Parse a local service response.
///
/// Every body is JSON, including errors, so anything else is malformed.
async fn read_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let text = response.text().await?;

    if status.is_success() {
        return serde_json::from_str(&text)
            .map_err(|e| AppError::MalformedResponse(format!("Invalid response from server: {}", e)));
    }

    let error: ErrorBody = serde_json::from_str(&text).map_err(|_| {
        AppError::MalformedResponse(format!("Invalid response from server ({})", status))
    })?;

    if status.as_u16() == 401 && error.error == REFRESH_TOKEN_EXPIRED {
        return Err(AppError::RefreshTokenExpired);
    }

    Err(AppError::Upstream {
        status: status.as_u16(),
        message: error.error,
    })
}
