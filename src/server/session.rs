//! Server-side view of the session cookie

use crate::server::state::auth_cookie;
use crate::session::{Session, SessionUser};
use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: SessionUser,
}

/// `GET /api/session`
///
/// Decodes the `auth-token` cookie. A missing, undecodable or expired token
/// is answered with 401.
pub async fn current_session(headers: HeaderMap) -> Response {
    let session = auth_cookie(&headers).and_then(|token| Session::from_token(&token, Utc::now()).ok());
    match session {
        Some(session) => Json(SessionResponse { user: session.user }).into_response(),
        None => (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" }))).into_response(),
    }
}
