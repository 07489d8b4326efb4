// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard controller: loads every resource the dashboard shows.

use crate::error::{AppError, Result};
use crate::models::{BodyMeasurement, Cycle, Recovery, Sleep, User, Workout};
use crate::services::oauth::TokenRefresher;
use crate::services::whoop::WhoopClient;
use serde::Serialize;

/// Number of workouts listed on the dashboard.
pub const RECENT_WORKOUT_COUNT: u32 = 5;

/// Everything the dashboard renders.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub user: User,
    pub body_measurements: BodyMeasurement,
    pub latest_recovery: Option<Recovery>,
    pub latest_sleep: Option<Sleep>,
    pub recent_workouts: Vec<Workout>,
    pub latest_cycle: Option<Cycle>,
}

/// Outcome of a dashboard load.
#[derive(Debug)]
pub enum DashboardView {
    Ready(Box<DashboardData>),
    /// Session is gone; show the authorization entry point.
    Unauthenticated,
}

pub struct Dashboard<R> {
    client: WhoopClient<R>,
}

impl<R: TokenRefresher + 'static> Dashboard<R> {
    pub fn new(client: WhoopClient<R>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &WhoopClient<R> {
        &self.client
    }

    /// Fetch all six resources concurrently.
    ///
    /// The first failure fails the whole load. An expired session wipes the
    /// store and yields [`DashboardView::Unauthenticated`]; any other error is
    /// returned with the stored tokens left alone.
    pub async fn load(&self) -> Result<DashboardView> {
        let client = &self.client;
        let joined = tokio::try_join!(
            client.get_user(),
            client.get_body_measurements(),
            client.get_recoveries(1),
            client.get_sleeps(1),
            client.get_workouts(RECENT_WORKOUT_COUNT),
            client.get_cycles(1),
        );

        match joined {
            Ok((user, body_measurements, recoveries, sleeps, workouts, cycles)) => {
                tracing::debug!(
                    user_id = user.user_id,
                    workouts = workouts.records.len(),
                    "Dashboard data loaded"
                );
                Ok(DashboardView::Ready(Box::new(DashboardData {
                    user,
                    body_measurements,
                    latest_recovery: recoveries.into_first(),
                    latest_sleep: sleeps.into_first(),
                    recent_workouts: workouts.records,
                    latest_cycle: cycles.into_first(),
                })))
            }
            Err(AppError::AuthenticationExpired) => {
                tracing::info!("Authentication expired, returning to sign-in");
                self.client.store().clear()?;
                Ok(DashboardView::Unauthenticated)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dashboard load failed");
                Err(e)
            }
        }
    }
}
