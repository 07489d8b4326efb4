// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! WHOOP OAuth routes consumed by the front end.

use axum::{extract::State, routing::get, routing::post, Json, Router};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::models::TokenPair;
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// How long a signed state stays valid (10 minutes).
const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

/// Tolerated clock skew for states issued "in the future".
const STATE_CLOCK_SKEW_MS: u128 = 30 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth-url", get(auth_url))
        .route("/auth-token", post(auth_token))
        .route("/auth-refresh", post(auth_refresh))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthUrlResponse {
    #[serde(rename = "authUrl")]
    pub auth_url: String,
}

/// Build the WHOOP consent URL with a signed state.
async fn auth_url(State(state): State<Arc<AppState>>) -> Result<Json<AuthUrlResponse>> {
    let now = now_millis()?;
    let nonce = random_nonce()?;
    let oauth_state = sign_state(&nonce, now, &state.config.oauth_state_key)?;

    let auth_url = state.oauth.authorization_url(&oauth_state)?;

    tracing::info!("Issued WHOOP authorization URL");
    Ok(Json(AuthUrlResponse { auth_url }))
}

#[derive(Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    code: Option<String>,
    /// `state` echoed back by the OAuth redirect.
    #[serde(default)]
    state: Option<String>,
}

/// Exchange an authorization code for a token pair.
async fn auth_token(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<TokenPair>> {
    let code = request
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("No code provided".to_string()))?;

    match request.state.as_deref() {
        Some(oauth_state) => {
            verify_state(oauth_state, &state.config.oauth_state_key, now_millis()?)
                .ok_or(AppError::InvalidState)?;
        }
        None => tracing::warn!("Token exchange without OAuth state; CSRF check skipped"),
    }

    let tokens = state.oauth.exchange_authorization_code(&code).await?;
    Ok(Json(tokens))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Refresh an access token. A dead refresh token answers 401
/// `refresh_token_expired`.
async fn auth_refresh(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPair>> {
    let refresh_token = request
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("No refresh token provided".to_string()))?;

    let tokens = state.oauth.refresh_access_token(&refresh_token).await?;
    Ok(Json(tokens))
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

fn random_nonce() -> Result<String> {
    let mut nonce = [0u8; 16];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate state nonce")))?;
    Ok(hex::encode(nonce))
}

/// Encode `nonce|timestamp_hex|signature_hex` as URL-safe base64.
fn sign_state(nonce: &str, timestamp_ms: u128, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", nonce, timestamp_ms);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Check signature and age of a state. Returns the nonce when valid.
fn verify_state(state: &str, secret: &[u8], now_ms: u128) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    if parts.len() != 3 {
        return None;
    }
    let (nonce, timestamp_hex, signature_hex) = (parts[0], parts[1], parts[2]);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(format!("{}|{}", nonce, timestamp_hex).as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if !bool::from(expected.as_bytes().ct_eq(signature_hex.as_bytes())) {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let issued = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if issued > now_ms + STATE_CLOCK_SKEW_MS || now_ms.saturating_sub(issued) > STATE_MAX_AGE_MS {
        tracing::warn!("OAuth state expired");
        return None;
    }

    Some(nonce.to_string())
}
