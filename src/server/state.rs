//! Shared state of the edge server and `auth-token` cookie helpers

use crate::core::error::ApiError;
use crate::session::AUTH_TOKEN_KEY;
use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use std::sync::Arc;
use std::time::Duration;

/// State handed to every edge route
#[derive(Clone, Debug)]
pub struct EdgeState {
    pub http: reqwest::Client,
    api_base: Arc<str>,
}

impl EdgeState {
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network {
                message: e.to_string(),
            })?;
        Ok(Self::with_client(http, api_base))
    }

    pub fn with_client(http: reqwest::Client, api_base: &str) -> Self {
        Self {
            http,
            api_base: Arc::from(api_base.trim_end_matches('/')),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Absolute backend URL for `path` (leading slash included)
    pub fn backend_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }
}

/// Value of the `auth-token` cookie, if the request carries a non-empty one
pub fn auth_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == AUTH_TOKEN_KEY)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value storing `token`
pub fn auth_cookie_header(token: &str) -> String {
    format!("{}={}; HttpOnly; Path=/", AUTH_TOKEN_KEY, token)
}

/// `Set-Cookie` value removing the token
pub fn expired_auth_cookie_header() -> String {
    format!("{}=; HttpOnly; Path=/; Max-Age=0", AUTH_TOKEN_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_auth_cookie_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(auth_cookie(&headers), None);

        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; auth-token=abc.def.ghi"));
        assert_eq!(auth_cookie(&headers).as_deref(), Some("abc.def.ghi"));

        headers.insert(COOKIE, HeaderValue::from_static("auth-token="));
        assert_eq!(auth_cookie(&headers), None);
    }

    #[test]
    fn test_backend_url() {
        let state = EdgeState::with_client(reqwest::Client::new(), "http://backend/api/v1/");
        assert_eq!(
            state.backend_url("/multimedia/preview-by-id/3"),
            "http://backend/api/v1/multimedia/preview-by-id/3"
        );
    }

    #[test]
    fn test_cookie_headers() {
        assert_eq!(auth_cookie_header("t"), "auth-token=t; HttpOnly; Path=/");
        assert!(expired_auth_cookie_header().contains("Max-Age=0"));
    }
}
