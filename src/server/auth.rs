//! Login, registration and logout forwarding
//!
//! The backend is the authority on credentials. These routes relay the call
//! and mirror the issued token into an HTTP-only `auth-token` cookie so the
//! browser never has to handle it.

use crate::api::endpoints::Endpoint;
use crate::server::state::{
    EdgeState, auth_cookie, auth_cookie_header, expired_auth_cookie_header,
};
use axum::Json;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

/// `POST /api/auth/login`
pub async fn login(State(state): State<EdgeState>, Json(body): Json<Value>) -> Response {
    forward_credentials(&state, Endpoint::Login, body).await
}

/// `POST /api/auth/register`
pub async fn register(State(state): State<EdgeState>, Json(body): Json<Value>) -> Response {
    forward_credentials(&state, Endpoint::Register, body).await
}

/// `POST /api/auth/logout`
///
/// The cookie is expired whatever the backend answers.
pub async fn logout(State(state): State<EdgeState>, headers: HeaderMap) -> Response {
    let (status, envelope) = match auth_cookie(&headers) {
        Some(token) => {
            let url = state.backend_url(&Endpoint::Logout.path(None));
            match state.http.post(&url).bearer_auth(token).send().await {
                Ok(response) => relay(response).await,
                Err(e) => {
                    tracing::warn!(error = %e, "backend logout failed");
                    (StatusCode::OK, success_envelope("Logged out"))
                }
            }
        }
        None => (StatusCode::OK, success_envelope("Logged out")),
    };

    let mut response = (status, Json(envelope)).into_response();
    if let Ok(cookie) = expired_auth_cookie_header().parse() {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    response
}

async fn forward_credentials(state: &EdgeState, endpoint: Endpoint, body: Value) -> Response {
    let url = state.backend_url(&endpoint.path(None));
    let response = match state.http.post(&url).json(&body).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(endpoint = %endpoint, error = %e, "credential forwarding failed");
            return internal_error();
        }
    };

    let (status, envelope) = relay(response).await;
    let token = token_of(&envelope).map(str::to_string);
    let mut response = (status, Json(envelope)).into_response();
    if status.is_success() {
        if let Some(token) = token {
            match auth_cookie_header(&token).parse() {
                Ok(cookie) => {
                    response.headers_mut().insert(SET_COOKIE, cookie);
                    tracing::info!(endpoint = %endpoint, "session cookie issued");
                }
                Err(e) => tracing::warn!(error = %e, "token not usable as cookie value"),
            }
        }
    }
    response
}

/// Status and JSON body of a backend response
async fn relay(response: reqwest::Response) -> (StatusCode, Value) {
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let body = response.json::<Value>().await.unwrap_or_else(|_| {
        json!({
            "success": status.is_success(),
            "message": status.canonical_reason().unwrap_or_default(),
            "data": null
        })
    });
    (status, body)
}

/// Token of a successful `{ success, data: { token } }` envelope
fn token_of(envelope: &Value) -> Option<&str> {
    if envelope.get("success").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    envelope
        .get("data")?
        .get("token")?
        .as_str()
        .filter(|token| !token.is_empty())
}

fn success_envelope(message: &str) -> Value {
    json!({ "success": true, "message": message, "data": null })
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "message": "Internal server error", "data": null })),
    )
        .into_response()
}
