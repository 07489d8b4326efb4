// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod dashboard;
pub mod local;
pub mod oauth;
pub mod token_store;
pub mod whoop;

pub use dashboard::{Dashboard, DashboardData, DashboardView};
pub use local::LocalAuthClient;
pub use oauth::{OAuthExchanger, TokenRefresher};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use whoop::{TokenObserver, WhoopClient};
