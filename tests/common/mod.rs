// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared test fixtures: a scripted WHOOP upstream and app builders.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use whoop_dashboard::config::Config;
use whoop_dashboard::routes::create_router;
use whoop_dashboard::services::{MemoryTokenStore, OAuthExchanger, TokenStore, WhoopClient};
use whoop_dashboard::AppState;

/// What the fake token endpoint does with a refresh grant.
#[allow(dead_code)]
#[derive(Clone)]
pub enum RefreshBehavior {
    /// Issue this access token (and optionally a new refresh token).
    Issue {
        access: String,
        refresh: Option<String>,
    },
    /// Answer with this status and a JSON error body.
    Fail(u16),
    /// Answer 200 with a body that is not JSON.
    Garbage,
}

/// Mutable script and counters for the fake upstream.
pub struct FakeState {
    /// Access token the resource endpoints accept.
    pub valid_access: Mutex<String>,
    pub refresh_behavior: Mutex<RefreshBehavior>,
    /// Forces every resource response to this status.
    pub forced_resource_status: Mutex<Option<u16>>,
    /// Reject every bearer token, even freshly issued ones.
    pub reject_all_tokens: Mutex<bool>,
    pub refresh_delay: Mutex<Duration>,
    /// Per-path status, answered after the given delay.
    pub path_overrides: Mutex<HashMap<String, (u16, Duration)>>,
    /// Status for every resource request once a refresh has happened.
    pub status_after_refresh: Mutex<Option<u16>>,
    pub resource_gets: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub code_calls: AtomicUsize,
    pub token_forms: Mutex<Vec<HashMap<String, String>>>,
    pub requested_uris: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeState {
    pub fn set_refresh(&self, behavior: RefreshBehavior) {
        *self.refresh_behavior.lock().unwrap() = behavior;
    }

    pub fn force_resource_status(&self, status: u16) {
        *self.forced_resource_status.lock().unwrap() = Some(status);
    }

    pub fn reject_all_tokens(&self) {
        *self.reject_all_tokens.lock().unwrap() = true;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = delay;
    }

    pub fn override_path(&self, path: &str, status: u16, delay: Duration) {
        self.path_overrides
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, delay));
    }

    pub fn status_after_refresh(&self, status: u16) {
        *self.status_after_refresh.lock().unwrap() = Some(status);
    }

    pub fn resource_gets(&self) -> usize {
        self.resource_gets.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn code_calls(&self) -> usize {
        self.code_calls.load(Ordering::SeqCst)
    }

    pub fn last_token_form(&self) -> HashMap<String, String> {
        self.token_forms.lock().unwrap().last().cloned().unwrap_or_default()
    }

    pub fn requested_uris(&self) -> Vec<String> {
        self.requested_uris.lock().unwrap().clone()
    }
}

/// Running fake WHOOP server.
pub struct FakeWhoop {
    pub base_url: String,
    pub state: Arc<FakeState>,
}

/// Start a fake WHOOP API that accepts `valid_access` as bearer token.
#[allow(dead_code)]
pub async fn spawn_fake_whoop(valid_access: &str) -> FakeWhoop {
    let state = Arc::new(FakeState {
        valid_access: Mutex::new(valid_access.to_string()),
        refresh_behavior: Mutex::new(RefreshBehavior::Issue {
            access: "refreshed_access".to_string(),
            refresh: Some("refreshed_refresh".to_string()),
        }),
        forced_resource_status: Mutex::new(None),
        reject_all_tokens: Mutex::new(false),
        refresh_delay: Mutex::new(Duration::ZERO),
        path_overrides: Mutex::new(HashMap::new()),
        status_after_refresh: Mutex::new(None),
        resource_gets: AtomicUsize::new(0),
        refresh_calls: AtomicUsize::new(0),
        code_calls: AtomicUsize::new(0),
        token_forms: Mutex::new(Vec::new()),
        requested_uris: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/oauth/oauth2/token", post(token_endpoint))
        .route("/developer/v1/user/profile/basic", get(resource))
        .route("/developer/v1/user/measurement/body", get(resource))
        .route("/developer/v1/recovery", get(resource))
        .route("/developer/v1/activity/sleep", get(resource))
        .route("/developer/v1/activity/workout", get(resource))
        .route("/developer/v1/cycle", get(resource))
        .with_state(state.clone());

    FakeWhoop {
        base_url: serve(app).await,
        state,
    }
}

/// Serve a router on an ephemeral port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn token_endpoint(
    State(state): State<Arc<FakeState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.token_forms.lock().unwrap().push(form.clone());

    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") => {
            state.code_calls.fetch_add(1, Ordering::SeqCst);
            if form.get("code").map(String::as_str) != Some("good_code") {
                return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"})))
                    .into_response();
            }
            *state.valid_access.lock().unwrap() = "code_access".to_string();
            Json(json!({
                "access_token": "code_access",
                "refresh_token": "code_refresh",
                "expires_in": 3600,
                "token_type": "bearer"
            }))
            .into_response()
        }
        Some("refresh_token") => {
            state.refresh_calls.fetch_add(1, Ordering::SeqCst);
            let delay = *state.refresh_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let behavior = state.refresh_behavior.lock().unwrap().clone();
            match behavior {
                RefreshBehavior::Issue { access, refresh } => {
                    *state.valid_access.lock().unwrap() = access.clone();
                    let mut body = json!({ "access_token": access, "expires_in": 3600 });
                    if let Some(refresh) = refresh {
                        body["refresh_token"] = Value::String(refresh);
                    }
                    Json(body).into_response()
                }
                RefreshBehavior::Fail(status) => (
                    StatusCode::from_u16(status).unwrap(),
                    Json(json!({"error": "invalid_grant"})),
                )
                    .into_response(),
                RefreshBehavior::Garbage => "<html>oops</html>".into_response(),
            }
        }
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn resource(
    State(state): State<Arc<FakeState>>,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.resource_gets.fetch_add(1, Ordering::SeqCst);
    state.requested_uris.lock().unwrap().push(uri.to_string());

    if let Some(status) = *state.forced_resource_status.lock().unwrap() {
        return StatusCode::from_u16(status).unwrap().into_response();
    }

    let path_override = state.path_overrides.lock().unwrap().get(uri.path()).copied();
    if let Some((status, delay)) = path_override {
        tokio::time::sleep(delay).await;
        return StatusCode::from_u16(status).unwrap().into_response();
    }

    if state.refresh_calls.load(Ordering::SeqCst) > 0 {
        if let Some(status) = *state.status_after_refresh.lock().unwrap() {
            return StatusCode::from_u16(status).unwrap().into_response();
        }
    }

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_string();
    let accepted = *state.valid_access.lock().unwrap() == bearer;
    if !accepted || *state.reject_all_tokens.lock().unwrap() {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let limit: usize = query
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(25);

    let body = match uri.path() {
        "/developer/v1/user/profile/basic" => json!({
            "user_id": 10129,
            "email": "jsmith123@whoop.com",
            "first_name": "John",
            "last_name": "Smith"
        }),
        "/developer/v1/user/measurement/body" => json!({
            "height_meter": 1.8288,
            "weight_kilogram": 90.7185,
            "max_heart_rate": 200
        }),
        "/developer/v1/recovery" => page(limit, |i| {
            json!({
                "cycle_id": 93845 + i,
                "sleep_id": format!("sleep-{}", i),
                "user_id": 10129,
                "created_at": "2022-04-24T11:25:44.774Z",
                "score_state": "SCORED",
                "score": { "recovery_score": 44, "resting_heart_rate": 64 }
            })
        }),
        "/developer/v1/activity/sleep" => page(limit, |i| {
            json!({
                "id": format!("sleep-{}", i),
                "user_id": 10129,
                "start": "2022-04-24T02:25:44.774Z",
                "end": "2022-04-24T10:25:44.774Z",
                "nap": false,
                "score_state": "SCORED"
            })
        }),
        "/developer/v1/activity/workout" => page(limit, |i| {
            json!({
                "id": format!("workout-{}", i),
                "user_id": 10129,
                "start": "2022-04-24T02:25:44.774Z",
                "end": "2022-04-24T03:25:44.774Z",
                "sport_id": 1,
                "score_state": "SCORED",
                "score": { "strain": 8.25 }
            })
        }),
        "/developer/v1/cycle" => page(limit, |i| {
            json!({
                "id": 93845 + i,
                "user_id": 10129,
                "start": "2022-04-24T02:25:44.774Z",
                "score_state": "SCORED"
            })
        }),
        _ => return StatusCode::NOT_FOUND.into_response(),
    };

    Json(body).into_response()
}

fn page(limit: usize, record: impl Fn(usize) -> Value) -> Value {
    let records: Vec<Value> = (0..limit).map(record).collect();
    json!({ "records": records, "next_token": "MTIzOjEyMzEyMw" })
}

/// Config pointing at `base_url`.
#[allow(dead_code)]
pub fn test_config(base_url: &str) -> Config {
    Config {
        api_base_url: base_url.to_string(),
        ..Config::test_default()
    }
}

/// Store and client wired to the fake upstream, refreshing directly.
#[allow(dead_code)]
pub fn direct_client(
    fake: &FakeWhoop,
    access: &str,
    refresh: &str,
) -> (WhoopClient<OAuthExchanger>, Arc<MemoryTokenStore>) {
    let config = test_config(&fake.base_url);
    let store = Arc::new(MemoryTokenStore::with_tokens(
        whoop_dashboard::models::TokenPair::new(access, refresh),
    ));
    let exchanger = OAuthExchanger::from_config(&config).unwrap();
    let client =
        WhoopClient::from_config(&config, exchanger, store.clone() as Arc<dyn TokenStore>).unwrap();
    (client, store)
}

/// App router whose OAuth calls go to `base_url`.
#[allow(dead_code)]
pub fn create_test_app(config: Config) -> (Router, Arc<AppState>) {
    let oauth = OAuthExchanger::from_config(&config).unwrap();
    let state = Arc::new(AppState { config, oauth });
    (create_router(state.clone()), state)
}
