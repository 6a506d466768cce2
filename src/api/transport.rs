//! HTTP transport seam
//!
//! The executor builds an [`ApiRequest`] and hands it to a [`Transport`].
//! [`ReqwestTransport`] is the production implementation; tests substitute
//! a scripted transport to count and shape backend calls.

use crate::core::error::ApiError;
use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;

/// A file sent as one multipart form field
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartFile {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(MultipartFile),
}

/// A request relative to the API base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    /// Bearer token, attached by the executor
    pub bearer: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            bearer: None,
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn with_multipart(mut self, file: MultipartFile) -> Self {
        self.body = RequestBody::Multipart(file);
        self
    }

    /// `path?query` form used in logs and not-found errors
    pub fn target(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{}?{}", self.path, query.join("&"))
    }
}

/// Raw response before envelope decoding
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: body.to_string().into_bytes(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and returns whatever the backend answered
///
/// Only failures to obtain a response are errors here; status handling
/// belongs to the executor.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, ApiError>;
}

/// Transport over a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network {
                message: e.to_string(),
            })?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Multipart(file) => {
                let mut part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.file_name);
                if let Some(mime) = &file.content_type {
                    part = part.mime_str(mime).map_err(|e| ApiError::Network {
                        message: format!("invalid content type '{}': {}", mime, e),
                    })?;
                }
                builder.multipart(reqwest::multipart::Form::new().part(file.field, part))
            }
        };

        let response = builder.send().await.map_err(|e| ApiError::Network {
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| ApiError::Network {
            message: e.to_string(),
        })?;

        Ok(RawResponse {
            status,
            content_type,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_target() {
        let request = ApiRequest::new(Method::GET, "/organization").with_query(vec![
            ("page".to_string(), "0".to_string()),
            ("size".to_string(), "5".to_string()),
        ]);
        assert_eq!(request.target(), "/organization?page=0&size=5");
        assert_eq!(ApiRequest::new(Method::GET, "/location/3").target(), "/location/3");
    }

    #[test]
    fn test_raw_json_response() {
        let response = RawResponse::json(200, &json!({"success": true}));
        assert!(response.is_success());
        assert_eq!(response.content_type.as_deref(), Some("application/json"));
        assert!(!RawResponse::json(404, &json!({})).is_success());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let transport =
            ReqwestTransport::with_client(reqwest::Client::new(), "http://localhost:8080/api/v1/");
        assert_eq!(transport.base_url(), "http://localhost:8080/api/v1");
    }
}
