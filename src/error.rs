// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Missing Whoop API configuration: {0}")]
    Configuration(#[from] ConfigError),

    /// Upstream answered with a non-2xx status.
    #[error("Whoop API error: {status} {message}")]
    Upstream { status: u16, message: String },

    /// The token endpoint rejected the refresh token (HTTP 401).
    #[error("Refresh token is invalid or expired")]
    RefreshTokenExpired,

    /// The session cannot be renewed; the user must authorize again.
    #[error("Authentication expired")]
    AuthenticationExpired,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Request to Whoop failed: {0}")]
    Transport(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Invalid or expired OAuth state")]
    InvalidState,

    #[error("Token store error: {0}")]
    TokenStore(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True when the only way forward is a fresh authorization.
    pub fn is_authentication_expired(&self) -> bool {
        matches!(self, AppError::AuthenticationExpired)
    }

    /// HTTP status carried by an upstream failure.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            AppError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::MalformedResponse(err.to_string())
        } else {
            AppError::Transport(err.to_string())
        }
    }
}

// A refresh result is handed to every request waiting on it, so errors
// must be cloneable. `anyhow::Error` is not; it is re-wrapped from its
// rendered chain.
impl Clone for AppError {
    fn clone(&self) -> Self {
        match self {
            AppError::Configuration(err) => AppError::Configuration(err.clone()),
            AppError::Upstream { status, message } => AppError::Upstream {
                status: *status,
                message: message.clone(),
            },
            AppError::RefreshTokenExpired => AppError::RefreshTokenExpired,
            AppError::AuthenticationExpired => AppError::AuthenticationExpired,
            AppError::MalformedResponse(msg) => AppError::MalformedResponse(msg.clone()),
            AppError::Transport(msg) => AppError::Transport(msg.clone()),
            AppError::BadRequest(msg) => AppError::BadRequest(msg.clone()),
            AppError::InvalidState => AppError::InvalidState,
            AppError::TokenStore(msg) => AppError::TokenStore(msg.clone()),
            AppError::Internal(err) => AppError::Internal(anyhow::anyhow!("{:#}", err)),
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Configuration(err) => {
                tracing::error!(error = %err, "Missing configuration");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Missing Whoop API configuration".to_string(),
                    None,
                )
            }
            AppError::Upstream { status, message } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                format!("Whoop request failed: {} {}", status, message),
                None,
            ),
            AppError::RefreshTokenExpired => (
                StatusCode::UNAUTHORIZED,
                "refresh_token_expired".to_string(),
                Some("Refresh token is invalid or expired".to_string()),
            ),
            AppError::AuthenticationExpired => (
                StatusCode::UNAUTHORIZED,
                "authentication_expired".to_string(),
                None,
            ),
            AppError::MalformedResponse(msg) => (
                StatusCode::BAD_GATEWAY,
                "malformed_response".to_string(),
                Some(msg.clone()),
            ),
            AppError::Transport(msg) => (
                StatusCode::BAD_GATEWAY,
                "upstream_unreachable".to_string(),
                Some(msg.clone()),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::InvalidState => {
                (StatusCode::BAD_REQUEST, "invalid_state".to_string(), None)
            }
            AppError::TokenStore(msg) => {
                tracing::error!(error = %msg, "Token store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "token_store_error".to_string(),
                    None,
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error".to_string(),
                    None,
                )
            }
        };

        (status, Json(ErrorResponse { error, message })).into_response()
    }
}

/// Result type alias for handlers and services
pub type Result<T> = std::result::Result<T, AppError>;
