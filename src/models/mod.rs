// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod token;
pub mod whoop;

pub use token::{TokenPair, TokenResponse};
pub use whoop::{BodyMeasurement, Cycle, Paginated, Recovery, Sleep, User, Workout};
