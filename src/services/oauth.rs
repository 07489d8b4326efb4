// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! WHOOP OAuth token endpoint client.
//!
//! Handles:
//! - Authorization URL construction
//! - Authorization-code exchange
//! - Refresh-token exchange, with upstream 401 reported as an expired
//!   refresh token
//!
//! The exchanger never touches the token store; persisting the returned pair
//! is the caller's job.

use crate::config::{ClientCredentials, Config};
use crate::error::{AppError, Result};
use crate::models::{TokenPair, TokenResponse};
use std::future::Future;
use std::time::Duration;

/// Scopes requested at authorization. `offline` is what makes WHOOP issue
/// a refresh token.
pub const OAUTH_SCOPES: &str =
    "offline read:recovery read:cycles read:workout read:sleep read:profile read:body_measurement";

/// Anything that can trade a refresh token for a new token pair.
///
/// Implementations must report an upstream rejection of the refresh token as
/// [`AppError::RefreshTokenExpired`] and every other failure as-is.
pub trait TokenRefresher: Send + Sync {
    fn refresh(&self, refresh_token: &str) -> impl Future<Output = Result<TokenPair>> + Send;
}

/// OAuth client for the WHOOP token endpoint.
#[derive(Clone)]
pub struct OAuthExchanger {
    http: reqwest::Client,
    base_url: String,
    credentials: ClientCredentials,
}

impl OAuthExchanger {
    pub fn new(
        credentials: ClientCredentials,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            credentials,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.credentials.clone(),
            config.api_base_url.clone(),
            config.upstream_timeout,
        )
    }

    fn token_url(&self) -> String {
        format!("{}/oauth/oauth2/token", self.base_url)
    }

    /// Build the URL the user is sent to for consent.
    pub fn authorization_url(&self, state: &str) -> Result<String> {
        let client_id = self.credentials.client_id()?;
        let redirect_uri = self.credentials.redirect_uri()?;

        Ok(format!(
            "{}/oauth/oauth2/auth?\
             response_type=code&\
             client_id={}&\
             redirect_uri={}&\
             scope={}&\
             state={}",
            self.base_url,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(OAUTH_SCOPES),
            urlencoding::encode(state),
        ))
    }

    /// Exchange an authorization code for a token pair.
    pub async fn exchange_authorization_code(&self, code: &str) -> Result<TokenPair> {
        // All three are checked before anything goes on the wire.
        let client_id = self.credentials.client_id()?;
        let client_secret = self.credentials.client_secret()?;
        let redirect_uri = self.credentials.redirect_uri()?;

        let response = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("Token exchange request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "WHOOP token exchange failed");
            return Err(AppError::Upstream {
                status: status.as_u16(),
                message: body,
            });
        }

        let tokens = parse_token_response(response)
            .await?
            .into_pair(None)
            .ok_or_else(|| {
                AppError::MalformedResponse("token response has no refresh_token".to_string())
            })?;

        tracing::info!("Authorization code exchanged for tokens");
        Ok(tokens)
    }

    /// Trade a refresh token for a new pair.
    ///
    /// A 401 from the token endpoint means the refresh token itself is dead
    /// and is reported as [`AppError::RefreshTokenExpired`].
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenPair> {
        let client_id = self.credentials.client_id()?;
        let client_secret = self.credentials.client_secret()?;

        let response = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("Token refresh request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 401 {
            tracing::warn!("WHOOP rejected refresh token (401)");
            return Err(AppError::RefreshTokenExpired);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "WHOOP token refresh failed");
            return Err(AppError::Upstream {
                status: status.as_u16(),
                message: body,
            });
        }

        let tokens = parse_token_response(response)
            .await?
            .into_pair(Some(refresh_token))
            .ok_or_else(|| AppError::MalformedResponse("empty token response".to_string()))?;

        tracing::info!("Access token refreshed");
        Ok(tokens)
    }
}

impl TokenRefresher for OAuthExchanger {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        self.refresh_access_token(refresh_token).await
    }
}

async fn parse_token_response(response: reqwest::Response) -> Result<TokenResponse> {
    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| AppError::MalformedResponse(format!("Failed to parse token response: {}", e)))
}
