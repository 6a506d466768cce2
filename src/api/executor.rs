//! Query/mutation executor
//!
//! Sends one request through the [`Transport`], attaching the bearer token
//! of the current session, and turns the raw response into either the
//! decoded `{ success, message, data }` envelope or a typed [`ApiError`].
//!
//! | Status | Result |
//! |---|---|
//! | 2xx | envelope (must carry a boolean `success`) |
//! | 400, 422 | [`ApiError::Validation`] with field errors when present |
//! | 401 | [`ApiError::Unauthorized`], session cleared |
//! | 404 | [`ApiError::NotFound`] |
//! | other | [`ApiError::Server`] |

use crate::api::endpoints::Endpoint;
use crate::api::transport::{ApiRequest, RawResponse, Transport};
use crate::core::error::{ApiError, FieldValidationError};
use crate::core::events::ClearReason;
use crate::session::SessionGate;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct ApiExecutor {
    transport: Arc<dyn Transport>,
    session: Arc<SessionGate>,
}

impl ApiExecutor {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<SessionGate>) -> Self {
        Self { transport, session }
    }

    /// Execute `request` as a call of `endpoint`
    ///
    /// A 401 on an endpoint that requires a session clears the session
    /// before the error is returned. A 401 on login or registration is just
    /// a rejected credential.
    pub async fn execute(&self, endpoint: Endpoint, mut request: ApiRequest) -> Result<Value, ApiError> {
        request.bearer = self.session.bearer_token();
        let target = request.target();
        let method = request.method.clone();
        let started = Instant::now();

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(endpoint = %endpoint, %method, %target, error = %e, "backend call failed");
                return Err(e);
            }
        };

        tracing::debug!(
            endpoint = %endpoint,
            %method,
            %target,
            status = response.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "backend call"
        );

        let result = classify(&response, &target);
        if matches!(result, Err(ApiError::Unauthorized { .. })) && endpoint.requires_session() {
            self.session.clear(ClearReason::Unauthorized).await;
        }
        result
    }
}

impl std::fmt::Debug for ApiExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiExecutor")
            .field("session", &self.session)
            .finish()
    }
}

/// Map a raw response to the envelope or an error
pub fn classify(response: &RawResponse, target: &str) -> Result<Value, ApiError> {
    let body: Option<Value> = if response.body.is_empty() {
        None
    } else {
        serde_json::from_slice(&response.body).ok()
    };
    let message = body
        .as_ref()
        .and_then(|b| b.get("message").or_else(|| b.get("error")))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match response.status {
        200..=299 => match body {
            Some(envelope) if envelope.get("success").is_some_and(Value::is_boolean) => Ok(envelope),
            // Bodiless success (logout)
            None if response.body.is_empty() => {
                Ok(json!({ "success": true, "message": "", "data": null }))
            }
            _ => Err(ApiError::InvalidResponse {
                message: format!("{} did not return a response envelope", target),
            }),
        },
        401 => Err(ApiError::Unauthorized {
            message: if message.is_empty() {
                "Unauthorized".to_string()
            } else {
                message
            },
        }),
        400 | 422 => Err(ApiError::Validation {
            status: response.status,
            message,
            fields: body.as_ref().map(field_errors).unwrap_or_default(),
        }),
        404 => Err(ApiError::NotFound {
            path: target.to_string(),
        }),
        status => Err(ApiError::Server { status, message }),
    }
}

/// Field errors from a validation failure body
///
/// Accepts `errors` or `data` holding either a list of
/// `{ field, message | defaultMessage }` or a `field -> message` map.
fn field_errors(body: &Value) -> Vec<FieldValidationError> {
    let Some(source) = body.get("errors").or_else(|| body.get("data")) else {
        return Vec::new();
    };

    match source {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let field = item.get("field")?.as_str()?;
                let message = item
                    .get("message")
                    .or_else(|| item.get("defaultMessage"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Some(FieldValidationError {
                    field: field.to_string(),
                    message: message.to_string(),
                })
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .filter_map(|(field, message)| {
                Some(FieldValidationError {
                    field: field.clone(),
                    message: message.as_str()?.to_string(),
                })
            })
            .collect(),
        _ => Vec::new(),
    }
}
