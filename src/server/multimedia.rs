//! Authenticated image proxy for stored multimedia
//!
//! Resolves a file id to its preview URL on the backend, then streams the
//! image back. Missing images degrade to a placeholder SVG rather than an
//! error so `<img>` tags never break.
//!
//! The id segment must parse as an [`EntityId`]; anything else is rejected
//! with 400 before the backend is contacted.

use crate::api::endpoints::Endpoint;
use crate::core::entity::EntityId;
use crate::server::state::{EdgeState, auth_cookie};
use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

pub const PLACEHOLDER_SVG: &str = r##"<svg width="40" height="40" viewBox="0 0 40 40" xmlns="http://www.w3.org/2000/svg"><rect width="40" height="40" fill="#f0f0f0"/><text x="50%" y="50%" font-family="Arial" font-size="6" fill="#888" text-anchor="middle" dominant-baseline="middle">No Image</text></svg>"##;

pub const IMAGE_CACHE_CONTROL: &str = "public, max-age=86400";

enum ImageFetch {
    Image { content_type: String, bytes: Vec<u8> },
    Missing,
    Upstream { status: StatusCode, error: String },
}

/// `GET /api/multimedia/{id}`
pub async fn multimedia_image(
    State(state): State<EdgeState>,
    Path(id): Path<EntityId>,
    headers: HeaderMap,
) -> Response {
    let Some(token) = auth_cookie(&headers) else {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" }))).into_response();
    };

    match fetch_image(&state, id, &token).await {
        Ok(ImageFetch::Image {
            content_type,
            bytes,
        }) => (
            [
                (CONTENT_TYPE, content_type),
                (CACHE_CONTROL, IMAGE_CACHE_CONTROL.to_string()),
            ],
            Body::from(bytes),
        )
            .into_response(),
        Ok(ImageFetch::Missing) => placeholder(),
        Ok(ImageFetch::Upstream { status, error }) => {
            (status, Json(json!({ "error": error }))).into_response()
        }
        Err(e) => {
            tracing::error!(multimedia_id = %id, error = %e, "error fetching multimedia");
            placeholder()
        }
    }
}

async fn fetch_image(
    state: &EdgeState,
    id: EntityId,
    token: &str,
) -> Result<ImageFetch, reqwest::Error> {
    let preview_url = state.backend_url(&Endpoint::MultimediaPreview.path(Some(id)));
    tracing::debug!(endpoint = %Endpoint::MultimediaPreview, url = %preview_url, "resolving preview");

    let preview = state.http.get(&preview_url).bearer_auth(token).send().await?;
    if !preview.status().is_success() {
        return Ok(missing_or_upstream(
            preview.status(),
            "Failed to fetch multimedia preview",
        ));
    }

    let envelope: Value = preview.json().await?;
    let succeeded = envelope.get("success").and_then(Value::as_bool).unwrap_or(false);
    let image_url = envelope
        .get("data")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty());
    let Some(image_url) = image_url.filter(|_| succeeded) else {
        return Ok(ImageFetch::Missing);
    };

    let image = state.http.get(image_url).send().await?;
    if !image.status().is_success() {
        return Ok(missing_or_upstream(image.status(), "Failed to fetch image from S3"));
    }

    let content_type = image
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = image.bytes().await?.to_vec();
    Ok(ImageFetch::Image {
        content_type,
        bytes,
    })
}

fn missing_or_upstream(status: reqwest::StatusCode, context: &str) -> ImageFetch {
    if status == reqwest::StatusCode::NOT_FOUND {
        return ImageFetch::Missing;
    }
    ImageFetch::Upstream {
        status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
        error: format!(
            "{}: {}",
            context,
            status.canonical_reason().unwrap_or_default()
        ),
    }
}

/// Placeholder image for files that cannot be shown
pub fn placeholder() -> Response {
    (
        [
            (CONTENT_TYPE, "image/svg+xml"),
            (CACHE_CONTROL, IMAGE_CACHE_CONTROL),
        ],
        PLACEHOLDER_SVG,
    )
        .into_response()
}
