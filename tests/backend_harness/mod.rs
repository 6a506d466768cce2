//! In-process OrgPilot backend for integration tests
//!
//! A real axum server bound on `127.0.0.1:0` that speaks the backend's
//! `{ success, message, data }` envelope, keeps organizations and locations
//! in memory and counts every request it serves.
//!
//! ```rust,ignore
//! mod backend_harness;
//! let backend = backend_harness::MockBackend::start().await;
//! let client = backend.client();
//! ```

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use orgpilot::prelude::*;
use orgpilot::session::token::{Claims, encode_unsigned};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ADMIN_LOGIN: &str = "admin@orgpilot.test";
pub const ADMIN_PASSWORD: &str = "correct-horse";
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// Token for `sub` expiring `ttl_secs` from now (negative for expired)
pub fn token_for(sub: &str, ttl_secs: i64) -> String {
    let now = Utc::now().timestamp();
    encode_unsigned(&Claims {
        sub: Some(sub.to_string()),
        exp: Some(now + ttl_secs),
        iat: Some(now),
        permissions: vec!["ORGANIZATION_ADMIN".to_string()],
    })
}

#[derive(Default)]
pub struct BackendState {
    pub organizations: Mutex<Vec<Value>>,
    pub locations: Mutex<Vec<Value>>,
    pub hits: Mutex<HashMap<String, usize>>,
    next_id: AtomicU64,
    /// Answer every authenticated call with 401
    pub reject_tokens: AtomicBool,
    /// Answer organization updates with 500
    pub fail_organization_update: AtomicBool,
    /// Delay applied to organization list reads
    pub list_delay_ms: AtomicU64,
    pub addr: Mutex<Option<SocketAddr>>,
}

impl BackendState {
    fn hit(&self, key: impl Into<String>) {
        *self.hits.lock().unwrap().entry(key.into()).or_default() += 1;
    }

    fn next_id(&self) -> i64 {
        (self.next_id.fetch_add(1, Ordering::SeqCst) + 100) as i64
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        if self.reject_tokens.load(Ordering::SeqCst) {
            return false;
        }
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("Bearer ") && value.len() > 7)
    }
}

pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<BackendState>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::default());
        state.organizations.lock().unwrap().extend([
            organization(1, "Acme Health", vec![]),
            organization(2, "Borealis Clinics", vec![]),
            organization(3, "Cedar Care", vec![]),
        ]);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        *state.addr.lock().unwrap() = Some(addr);

        let api = Router::new()
            .route("/authentication", post(login))
            .route("/authentication/logout", post(logout))
            .route("/register", post(register))
            .route("/organization", get(list_organizations).post(create_organization))
            .route("/organization/{id}", get(get_organization).put(update_organization))
            .route("/location", post(create_location))
            .route("/location/{id}", get(get_location))
            .route("/multimedia/preview-by-id/{id}", get(preview));

        let app = Router::new()
            .nest("/api/v1", api)
            .route("/images/{name}", get(image))
            .with_state(Arc::clone(&state));

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn config(&self) -> OrgPilotConfig {
        let mut config = OrgPilotConfig::default();
        config.api.url = format!("http://{}", self.addr);
        config.api.timeout_secs = 5;
        config
    }

    pub fn client(&self) -> OrgPilotClient {
        OrgPilotClient::builder()
            .with_config(self.config())
            .build()
            .unwrap()
    }

    /// Requests served for `"METHOD /path"`
    pub fn hits(&self, key: &str) -> usize {
        self.state.hits.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn set_list_delay(&self, delay: Duration) {
        self.state
            .list_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn organization_location_ids(&self, id: i64) -> Vec<i64> {
        self.state
            .organizations
            .lock()
            .unwrap()
            .iter()
            .find(|org| org["id"] == id)
            .map(|org| {
                org["locations"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .filter_map(|l| l["id"].as_i64())
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub fn organization(id: i64, name: &str, locations: Vec<Value>) -> Value {
    json!({
        "id": id,
        "name": name,
        "active": true,
        "locations": locations,
        "organizationAdmins": [{"email": ADMIN_LOGIN}],
        "clinicalStaffs": [],
        "multimediaFile": null
    })
}

fn envelope(data: Value) -> Response {
    Json(json!({ "success": true, "message": "Fetched successfully", "data": data })).into_response()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "message": "Unauthorized", "data": null })),
    )
        .into_response()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Not found", "data": null })),
    )
        .into_response()
}

async fn login(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    state.hit("POST /authentication");
    if body["login"] == ADMIN_LOGIN && body["password"] == ADMIN_PASSWORD {
        envelope(json!({ "token": token_for(ADMIN_LOGIN, 3600), "permissions": ["ORGANIZATION_ADMIN"] }))
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Invalid credentials", "data": null })),
        )
            .into_response()
    }
}

async fn register(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    state.hit("POST /register");
    let email = body["email"].as_str().unwrap_or_default();
    if email.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "Validation failed",
                "errors": [{"field": "email", "defaultMessage": "must not be blank"}]
            })),
        )
            .into_response();
    }
    envelope(json!({ "token": token_for(email, 3600), "permissions": [] }))
}

async fn logout(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.hit("POST /authentication/logout");
    if !state.authorized(&headers) {
        return unauthorized();
    }
    envelope(Value::Null)
}

#[derive(Deserialize)]
struct PageParams {
    #[serde(default)]
    page: usize,
    #[serde(default = "default_size")]
    size: usize,
}

fn default_size() -> usize {
    5
}

async fn list_organizations(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> Response {
    state.hit("GET /organization");
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let delay = state.list_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let all = state.organizations.lock().unwrap().clone();
    let total = all.len();
    let content: Vec<Value> = all
        .into_iter()
        .skip(params.page * params.size)
        .take(params.size)
        .collect();
    envelope(json!({
        "content": content,
        "totalElements": total,
        "totalPages": total.div_ceil(params.size.max(1)),
        "size": params.size,
        "number": params.page
    }))
}

async fn get_organization(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    state.hit(format!("GET /organization/{}", id));
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let found = state
        .organizations
        .lock()
        .unwrap()
        .iter()
        .find(|org| org["id"] == id)
        .cloned();
    match found {
        Some(org) => envelope(org),
        None => not_found(),
    }
}

async fn create_organization(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.hit("POST /organization");
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let name = body["name"].as_str().unwrap_or_default();
    if name.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "success": false, "message": "Invalid organization", "data": {"name": "must not be blank"} })),
        )
            .into_response();
    }
    let org = organization(state.next_id(), name, vec![]);
    state.organizations.lock().unwrap().push(org.clone());
    envelope(org)
}

async fn update_organization(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    state.hit(format!("PUT /organization/{}", id));
    if !state.authorized(&headers) {
        return unauthorized();
    }
    if state.fail_organization_update.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "database unavailable", "data": null })),
        )
            .into_response();
    }

    let mut organizations = state.organizations.lock().unwrap();
    let Some(org) = organizations.iter_mut().find(|org| org["id"] == id) else {
        return not_found();
    };
    let locations = state.locations.lock().unwrap();
    let full_locations: Vec<Value> = body["locations"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|l| {
            locations
                .iter()
                .find(|stored| stored["id"] == l["id"])
                .cloned()
                .unwrap_or(l)
        })
        .collect();
    org["name"] = body["name"].clone();
    org["active"] = body["active"].clone();
    org["locations"] = Value::Array(full_locations);
    envelope(org.clone())
}

async fn create_location(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    state.hit("POST /location");
    if !state.authorized(&headers) {
        return unauthorized();
    }
    if body["address"]["zip"].as_str().unwrap_or_default().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "Validation failed",
                "errors": [{"field": "address.zip", "message": "must not be blank"}]
            })),
        )
            .into_response();
    }
    body["id"] = json!(state.next_id());
    body["providers"] = json!([]);
    state.locations.lock().unwrap().push(body.clone());
    envelope(body)
}

async fn get_location(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    state.hit(format!("GET /location/{}", id));
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let found = state
        .locations
        .lock()
        .unwrap()
        .iter()
        .find(|l| l["id"] == id)
        .cloned();
    match found {
        Some(location) => envelope(location),
        None => not_found(),
    }
}

/// Preview ids: 1 image, 2 unknown, 3 no file, 4 image gone, 5 image forbidden, 6 backend error
async fn preview(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    state.hit(format!("GET /multimedia/preview-by-id/{}", id));
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let Some(addr) = *state.addr.lock().unwrap() else {
        return not_found();
    };
    match id {
        1 => envelope(json!(format!("http://{}/images/logo.png", addr))),
        3 => Json(json!({ "success": true, "message": "No file", "data": null })).into_response(),
        4 => envelope(json!(format!("http://{}/images/gone.png", addr))),
        5 => envelope(json!(format!("http://{}/images/private.png", addr))),
        6 => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "success": false, "message": "maintenance", "data": null })),
        )
            .into_response(),
        _ => not_found(),
    }
}

async fn image(State(state): State<Arc<BackendState>>, Path(name): Path<String>) -> Response {
    state.hit(format!("GET /images/{}", name));
    match name.as_str() {
        "logo.png" => ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES).into_response(),
        "private.png" => StatusCode::FORBIDDEN.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}
