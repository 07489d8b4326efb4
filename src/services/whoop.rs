// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated WHOOP API client.
//!
//! Every fetch runs the same circuit:
//! 1. GET with the stored access token
//! 2. On 401, refresh (at most one refresh in flight per client)
//! 3. Persist the new pair, notify observers, retry exactly once
//!
//! The retry's outcome is final. A rejected refresh token clears the store
//! and surfaces as [`AppError::AuthenticationExpired`].
//!
//! The refresh itself runs on a spawned task. Once the token endpoint has
//! been called the rotated pair is persisted even if every request waiting
//! on it was dropped, and all waiters receive the same result.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{
    BodyMeasurement, Cycle, Paginated, Recovery, Sleep, TokenPair, User, Workout,
};
use crate::services::oauth::TokenRefresher;
use crate::services::token_store::TokenStore;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Page size used when the caller has no preference.
pub const DEFAULT_PAGE_LIMIT: u32 = 25;

const USER_PROFILE_PATH: &str = "/developer/v1/user/profile/basic";
const BODY_MEASUREMENT_PATH: &str = "/developer/v1/user/measurement/body";
const RECOVERY_PATH: &str = "/developer/v1/recovery";
const SLEEP_PATH: &str = "/developer/v1/activity/sleep";
const WORKOUT_PATH: &str = "/developer/v1/activity/workout";
const CYCLE_PATH: &str = "/developer/v1/cycle";

/// Receives the new pair after every successful refresh.
pub trait TokenObserver: Send + Sync {
    fn on_tokens_refreshed(&self, tokens: &TokenPair);
}

/// Result of one refresh, awaited by every request that hit the 401.
type SharedRefresh = Shared<BoxFuture<'static, Result<String>>>;

struct InFlight {
    id: u64,
    refresh: SharedRefresh,
}

/// Single slot for the refresh currently running, if any.
#[derive(Default)]
struct RefreshSlot {
    next_id: u64,
    in_flight: Option<InFlight>,
}

/// WHOOP resource client with transparent token refresh.
pub struct WhoopClient<R> {
    http: reqwest::Client,
    base_url: String,
    refresher: Arc<R>,
    store: Arc<dyn TokenStore>,
    observers: Vec<Arc<dyn TokenObserver>>,
    refresh_slot: Arc<Mutex<RefreshSlot>>,
}

impl<R: TokenRefresher + 'static> WhoopClient<R> {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        refresher: R,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            refresher: Arc::new(refresher),
            store,
            observers: Vec::new(),
            refresh_slot: Arc::new(Mutex::new(RefreshSlot::default())),
        })
    }

    pub fn from_config(config: &Config, refresher: R, store: Arc<dyn TokenStore>) -> Result<Self> {
        Self::new(
            config.api_base_url.clone(),
            config.upstream_timeout,
            refresher,
            store,
        )
    }

    /// Register an observer for refreshed tokens.
    pub fn with_observer(mut self, observer: Arc<dyn TokenObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    // ─── Resource Fetchers ───────────────────────────────────────────────────

    pub async fn get_user(&self) -> Result<User> {
        self.get_json(USER_PROFILE_PATH, None).await
    }

    pub async fn get_body_measurements(&self) -> Result<BodyMeasurement> {
        self.get_json(BODY_MEASUREMENT_PATH, None).await
    }

    pub async fn get_recoveries(&self, limit: u32) -> Result<Paginated<Recovery>> {
        self.get_json(RECOVERY_PATH, Some(limit)).await
    }

    pub async fn get_sleeps(&self, limit: u32) -> Result<Paginated<Sleep>> {
        self.get_json(SLEEP_PATH, Some(limit)).await
    }

    pub async fn get_workouts(&self, limit: u32) -> Result<Paginated<Workout>> {
        self.get_json(WORKOUT_PATH, Some(limit)).await
    }

    pub async fn get_cycles(&self, limit: u32) -> Result<Paginated<Cycle>> {
        self.get_json(CYCLE_PATH, Some(limit)).await
    }

    // ─── Request Circuit ─────────────────────────────────────────────────────

    /// GET with one refresh-and-retry on 401.
    async fn get_json<T: DeserializeOwned>(&self, path: &str, limit: Option<u32>) -> Result<T> {
        let tokens = self
            .store
            .load()?
            .ok_or(AppError::AuthenticationExpired)?;

        let response = self.send(path, limit, &tokens.access_token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return read_json(path, response).await;
        }

        tracing::info!(path, "Access token rejected, refreshing");
        let access_token = self.refresh_after_rejection(&tokens.access_token).await?;

        // Whatever comes back now is final, including another 401.
        let response = self.send(path, limit, &access_token).await?;
        read_json(path, response).await
    }

    async fn send(
        &self,
        path: &str,
        limit: Option<u32>,
        access_token: &str,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(access_token);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }

        request
            .send()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))
    }

    /// Obtain a usable access token after `rejected` got a 401.
    ///
    /// Joins the refresh already in flight, or starts one. A caller that
    /// finds a different token in the store reuses it.
    async fn refresh_after_rejection(&self, rejected: &str) -> Result<String> {
        let refresh = {
            let mut slot = self
                .refresh_slot
                .lock()
                .map_err(|_| AppError::Internal(anyhow::anyhow!("refresh slot poisoned")))?;

            match slot.in_flight.as_ref().map(|f| f.refresh.clone()) {
                Some(refresh) => {
                    tracing::debug!("Joining token refresh already in flight");
                    refresh
                }
                None => {
                    let current = self
                        .store
                        .load()?
                        .ok_or(AppError::AuthenticationExpired)?;

                    if current.access_token != rejected {
                        tracing::debug!("Token already refreshed by a concurrent request");
                        return Ok(current.access_token);
                    }

                    let id = slot.next_id;
                    slot.next_id += 1;
                    let refresh = self.spawn_refresh(id, current.refresh_token);
                    slot.in_flight = Some(InFlight {
                        id,
                        refresh: refresh.clone(),
                    });
                    refresh
                }
            }
        };

        refresh.await
    }

    /// Start the refresh on its own task so it completes and persists even
    /// if every caller goes away.
    fn spawn_refresh(&self, id: u64, refresh_token: String) -> SharedRefresh {
        let refresher = Arc::clone(&self.refresher);
        let store = Arc::clone(&self.store);
        let observers = self.observers.clone();
        let slot = Arc::clone(&self.refresh_slot);

        let handle = tokio::spawn(async move {
            let result =
                run_refresh(refresher.as_ref(), store.as_ref(), &observers, &refresh_token).await;

            // Store is already updated, so a later 401 sees the new token.
            if let Ok(mut slot) = slot.lock() {
                if slot.in_flight.as_ref().is_some_and(|f| f.id == id) {
                    slot.in_flight = None;
                }
            }
            result
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                Err(AppError::Internal(anyhow::anyhow!("token refresh task failed: {}", e)))
            })
        }
        .boxed()
        .shared()
    }
}

/// One refresh: persist and announce the new pair, or wipe a dead session.
async fn run_refresh<R: TokenRefresher>(
    refresher: &R,
    store: &dyn TokenStore,
    observers: &[Arc<dyn TokenObserver>],
    refresh_token: &str,
) -> Result<String> {
    match refresher.refresh(refresh_token).await {
        Ok(tokens) => {
            store.save(&tokens)?;
            for observer in observers {
                observer.on_tokens_refreshed(&tokens);
            }
            tracing::info!("Token refreshed and stored");
            Ok(tokens.access_token)
        }
        Err(AppError::RefreshTokenExpired) => {
            // The dead refresh token must never be presented again.
            store.clear()?;
            tracing::warn!("Refresh token expired, stored tokens cleared");
            Err(AppError::AuthenticationExpired)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Token refresh failed");
            Err(e)
        }
    }
}

/// Decode a 2xx body, or map the status to an upstream error.
async fn read_json<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        tracing::warn!(path, status = status.as_u16(), "WHOOP API request failed");
        return Err(AppError::Upstream {
            status: status.as_u16(),
            message: status.canonical_reason().unwrap_or_default().to_string(),
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| AppError::MalformedResponse(format!("{}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::token_store::MemoryTokenStore;

    struct PanickingRefresher;

    impl TokenRefresher for PanickingRefresher {
        async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair> {
            panic!("refresh must not be called");
        }
    }

    #[tokio::test]
    async fn test_empty_store_fails_without_network() {
        let client = WhoopClient::new(
            // Nothing listens here; the request must never be sent.
            "http://127.0.0.1:9",
            Duration::from_millis(100),
            PanickingRefresher,
            Arc::new(MemoryTokenStore::new()),
        )
        .unwrap();

        let err = client.get_user().await.unwrap_err();
        assert!(err.is_authentication_expired());
    }
}
