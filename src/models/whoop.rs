// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! WHOOP resource records.
//!
//! Only the identifying fields are typed. Everything else, including the
//! `score` blocks, is kept in `extra` so records serialize back unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Basic user profile (`/user/profile/basic`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body measurements (`/user/measurement/body`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyMeasurement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_meter: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kilogram: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_heart_rate: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recovery {
    pub cycle_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_id: Option<Value>,
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sleep {
    pub id: Value,
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nap: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workout {
    pub id: Value,
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sport_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Physiological cycle. `end` is absent for the cycle in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cycle {
    pub id: u64,
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One page of a collection endpoint. Only the first page is ever read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    #[serde(default = "Vec::new")]
    pub records: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl<T> Paginated<T> {
    /// Most recent record (WHOOP returns newest first).
    pub fn into_first(self) -> Option<T> {
        self.records.into_iter().next()
    }
}
