// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! OAuth client credentials are optional at startup: a missing value fails
//! the operation that needs it with a configuration error instead of
//! preventing the server from starting.

use ring::rand::{SecureRandom, SystemRandom};
use std::env;
use std::time::Duration;

/// Default WHOOP API host.
pub const DEFAULT_API_BASE_URL: &str = "https://api.prod.whoop.com";

/// OAuth client credentials, held only by the server.
#[derive(Clone, Default)]
pub struct ClientCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

impl ClientCredentials {
    pub fn client_id(&self) -> Result<&str, ConfigError> {
        required(&self.client_id, "CLIENT_ID")
    }

    pub fn client_secret(&self) -> Result<&str, ConfigError> {
        required(&self.client_secret, "CLIENT_SECRET")
    }

    pub fn redirect_uri(&self) -> Result<&str, ConfigError> {
        required(&self.redirect_uri, "REDIRECT_URI")
    }
}

// Never print the secret.
impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// WHOOP OAuth client credentials
    pub credentials: ClientCredentials,
    /// WHOOP API base URL (OAuth and resource endpoints share the host)
    pub api_base_url: String,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// HMAC key for signing the OAuth `state` parameter (raw bytes)
    pub oauth_state_key: Vec<u8>,
    /// Timeout applied to every upstream request
    pub upstream_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let oauth_state_key = match env::var("OAUTH_STATE_KEY") {
            Ok(key) if !key.trim().is_empty() => key.trim().as_bytes().to_vec(),
            _ => {
                tracing::warn!(
                    "OAUTH_STATE_KEY not set, generating an ephemeral key; \
                     pending authorizations will not survive a restart"
                );
                random_key()?
            }
        };

        Ok(Self {
            credentials: ClientCredentials {
                client_id: optional_var("CLIENT_ID"),
                client_secret: optional_var("CLIENT_SECRET"),
                redirect_uri: optional_var("REDIRECT_URI"),
            },
            api_base_url: env::var("WHOOP_API_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            oauth_state_key,
            upstream_timeout: Duration::from_secs(
                env::var("UPSTREAM_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }

    /// Fixed configuration for tests.
    pub fn test_default() -> Self {
        Self {
            credentials: ClientCredentials {
                client_id: Some("test_client_id".to_string()),
                client_secret: Some("test_secret".to_string()),
                redirect_uri: Some("http://localhost:3000/auth/callback".to_string()),
            },
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            port: 8080,
            oauth_state_key: b"test_state_key_32_bytes_minimum!".to_vec(),
            upstream_timeout: Duration::from_secs(5),
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn random_key() -> Result<Vec<u8>, ConfigError> {
    let mut key = vec![0u8; 32];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| ConfigError::Random)?;
    Ok(key)
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Failed to generate random key material")]
    Random,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_are_reported_by_name() {
        let creds = ClientCredentials {
            client_id: None,
            client_secret: Some(String::new()),
            redirect_uri: Some("http://localhost/cb".to_string()),
        };

        assert!(matches!(creds.client_id(), Err(ConfigError::Missing("CLIENT_ID"))));
        assert!(matches!(
            creds.client_secret(),
            Err(ConfigError::Missing("CLIENT_SECRET"))
        ));
        assert_eq!(creds.redirect_uri().unwrap(), "http://localhost/cb");
    }

    #[test]
    fn test_debug_hides_client_secret() {
        let config = Config::test_default();
        let printed = format!("{:?}", config.credentials);
        assert!(!printed.contains("test_secret"));
        assert!(printed.contains("test_client_id"));
    }

    #[test]
    fn test_config_from_env() {
        env::set_var("CLIENT_ID", "test_id");
        env::set_var("OAUTH_STATE_KEY", "env_state_key");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.credentials.client_id().unwrap(), "test_id");
        assert_eq!(config.oauth_state_key, b"env_state_key".to_vec());
        assert!(!config.api_base_url.ends_with('/'));
    }
}
