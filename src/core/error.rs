//! Typed error handling for the OrgPilot client
//!
//! Every failure the client can surface is one of a small set of typed
//! categories so callers can react to the category (re-authenticate, show
//! field errors, show a notification) instead of matching on strings.
//!
//! # Error Categories
//!
//! - [`ApiError`]: failures of a call against the OrgPilot backend
//! - [`SessionError`]: a protected call was attempted without a usable session
//! - [`ConfigError`]: configuration parsing and validation
//!
//! # Example
//!
//! ```rust,ignore
//! use orgpilot::prelude::*;
//!
//! match client.organizations(PageRequest::new(0, 10)).await {
//!     Ok(page) => println!("{} organizations", page.total_elements),
//!     Err(OrgPilotError::Api(err)) if err.disposition() == ErrorDisposition::Reauthenticate => {
//!         // session was cleared, send the user back to the login screen
//!     }
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Generic message shown for server and network failures.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

/// Missing previews are shown as a placeholder instead of an error
const MULTIMEDIA_PREVIEW_PREFIX: &str = "/multimedia/preview-by-id/";

/// The main error type of the crate
#[derive(Debug, Clone)]
pub enum OrgPilotError {
    /// Backend call failures
    Api(ApiError),

    /// Missing, expired or unreadable session
    Session(SessionError),

    /// Configuration errors
    Config(ConfigError),

    /// A payload could not be (de)serialized into the expected shape
    Decode { context: String, message: String },

    /// Internal errors (should not happen in normal operation)
    Internal(String),
}

impl fmt::Display for OrgPilotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrgPilotError::Api(e) => write!(f, "{}", e),
            OrgPilotError::Session(e) => write!(f, "{}", e),
            OrgPilotError::Config(e) => write!(f, "{}", e),
            OrgPilotError::Decode { context, message } => {
                write!(f, "Failed to decode {}: {}", context, message)
            }
            OrgPilotError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for OrgPilotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OrgPilotError::Api(e) => Some(e),
            OrgPilotError::Session(e) => Some(e),
            OrgPilotError::Config(e) => Some(e),
            OrgPilotError::Decode { .. } | OrgPilotError::Internal(_) => None,
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl OrgPilotError {
    /// Build a decode error for the given payload description
    pub fn decode(context: impl Into<String>, err: impl fmt::Display) -> Self {
        OrgPilotError::Decode {
            context: context.into(),
            message: err.to_string(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            OrgPilotError::Api(e) => e.status_code(),
            OrgPilotError::Session(_) => StatusCode::UNAUTHORIZED,
            OrgPilotError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            OrgPilotError::Decode { .. } => StatusCode::BAD_GATEWAY,
            OrgPilotError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            OrgPilotError::Api(e) => e.error_code(),
            OrgPilotError::Session(e) => e.error_code(),
            OrgPilotError::Config(_) => "CONFIG_ERROR",
            OrgPilotError::Decode { .. } => "DECODE_ERROR",
            OrgPilotError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// How a caller is expected to react to this error
    pub fn disposition(&self) -> ErrorDisposition {
        match self {
            OrgPilotError::Api(e) => e.disposition(),
            OrgPilotError::Session(_) => ErrorDisposition::Reauthenticate,
            _ => ErrorDisposition::Notify,
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            OrgPilotError::Api(ApiError::Validation { fields, .. }) if !fields.is_empty() => {
                Some(serde_json::json!({ "fields": fields }))
            }
            OrgPilotError::Api(ApiError::Server { status, .. }) => {
                Some(serde_json::json!({ "upstream_status": status }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for OrgPilotError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

/// What the caller should do with a failure
///
/// None of these imply a retry: recovery is always user initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// The session is gone; route the user to login
    Reauthenticate,
    /// Show the attached field errors next to the form inputs
    FieldErrors,
    /// Show a dismissable notification with a generic message
    Notify,
    /// Substitute a placeholder asset
    Placeholder,
}

// =============================================================================
// Api Errors
// =============================================================================

/// Errors produced by a call against the OrgPilot backend
///
/// `Clone` so that every waiter on a coalesced request receives the same failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The backend answered 401
    Unauthorized { message: String },

    /// The backend rejected the payload (400 / 422)
    Validation {
        status: u16,
        message: String,
        fields: Vec<FieldValidationError>,
    },

    /// The requested resource does not exist
    NotFound { path: String },

    /// Any other non-success status
    Server { status: u16, message: String },

    /// The request never produced a response
    Network { message: String },

    /// A 2xx response whose body is not the expected envelope
    InvalidResponse { message: String },

    /// A well-formed envelope with `success: false`
    Rejected { message: String },
}

/// A single field validation error reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized { message } => write!(f, "Unauthorized: {}", message),
            ApiError::Validation {
                status,
                message,
                fields,
            } => {
                if fields.is_empty() {
                    write!(f, "Validation failed ({}): {}", status, message)
                } else {
                    let msgs: Vec<String> = fields
                        .iter()
                        .map(|e| format!("{}: {}", e.field, e.message))
                        .collect();
                    write!(
                        f,
                        "Validation failed ({}): {} [{}]",
                        status,
                        message,
                        msgs.join(", ")
                    )
                }
            }
            ApiError::NotFound { path } => write!(f, "Resource not found: {}", path),
            ApiError::Server { status, message } => {
                write!(f, "Server error ({}): {}", status, message)
            }
            ApiError::Network { message } => write!(f, "Network error: {}", message),
            ApiError::InvalidResponse { message } => {
                write!(f, "Invalid response from server: {}", message)
            }
            ApiError::Rejected { message } => write!(f, "Request rejected: {}", message),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Validation { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
            }
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Server { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::Network { .. } => StatusCode::BAD_GATEWAY,
            ApiError::InvalidResponse { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized { .. } => "UNAUTHORIZED",
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::Server { .. } => "SERVER_ERROR",
            ApiError::Network { .. } => "NETWORK_ERROR",
            ApiError::InvalidResponse { .. } => "INVALID_RESPONSE",
            ApiError::Rejected { .. } => "REQUEST_REJECTED",
        }
    }

    pub fn disposition(&self) -> ErrorDisposition {
        match self {
            ApiError::Unauthorized { .. } => ErrorDisposition::Reauthenticate,
            ApiError::Validation { .. } => ErrorDisposition::FieldErrors,
            ApiError::NotFound { path } if path.starts_with(MULTIMEDIA_PREVIEW_PREFIX) => {
                ErrorDisposition::Placeholder
            }
            _ => ErrorDisposition::Notify,
        }
    }

    /// Message suitable for display to an end user
    ///
    /// Backend-provided messages are kept for validation and rejections,
    /// everything else collapses to [`GENERIC_ERROR_MESSAGE`].
    pub fn user_message(&self) -> &str {
        match self {
            ApiError::Unauthorized { .. } => "Your session has expired. Please log in again.",
            ApiError::Validation { message, .. } | ApiError::Rejected { message }
                if !message.is_empty() =>
            {
                message.as_str()
            }
            _ => GENERIC_ERROR_MESSAGE,
        }
    }

    /// Field errors attached to a validation failure
    pub fn field_errors(&self) -> &[FieldValidationError] {
        match self {
            ApiError::Validation { fields, .. } => fields,
            _ => &[],
        }
    }
}

impl From<ApiError> for OrgPilotError {
    fn from(err: ApiError) -> Self {
        OrgPilotError::Api(err)
    }
}

// =============================================================================
// Session Errors
// =============================================================================

/// Errors related to the client session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No usable session: absent, expired or undecodable token
    NotAuthenticated,

    /// The persisted session could not be read or written
    Storage { message: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotAuthenticated => write!(f, "Not authenticated"),
            SessionError::Storage { message } => write!(f, "Session storage error: {}", message),
        }
    }
}

impl std::error::Error for SessionError {}

impl SessionError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::NotAuthenticated => "NOT_AUTHENTICATED",
            SessionError::Storage { .. } => "SESSION_STORAGE_ERROR",
        }
    }
}

impl From<SessionError> for OrgPilotError {
    fn from(err: SessionError) -> Self {
        OrgPilotError::Session(err)
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Failed to parse configuration file
    ParseError {
        file: Option<String>,
        message: String,
    },

    /// Invalid value in configuration
    InvalidValue {
        field: String,
        value: String,
        message: String,
    },

    /// Configuration file not found
    FileNotFound { path: String },

    /// IO error while reading configuration
    IoError { message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError { file, message } => {
                if let Some(file) = file {
                    write!(f, "Failed to parse config file '{}': {}", file, message)
                } else {
                    write!(f, "Failed to parse config: {}", message)
                }
            }
            ConfigError::InvalidValue {
                field,
                value,
                message,
            } => {
                write!(
                    f,
                    "Invalid value '{}' for field '{}': {}",
                    value, field, message
                )
            }
            ConfigError::FileNotFound { path } => {
                write!(f, "Configuration file not found: {}", path)
            }
            ConfigError::IoError { message } => {
                write!(f, "IO error: {}", message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for OrgPilotError {
    fn from(err: ConfigError) -> Self {
        OrgPilotError::Config(err)
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for OrgPilotError {
    fn from(err: serde_json::Error) -> Self {
        OrgPilotError::decode("JSON payload", err)
    }
}

impl From<serde_yaml::Error> for OrgPilotError {
    fn from(err: serde_yaml::Error) -> Self {
        OrgPilotError::Config(ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        })
    }
}

impl From<std::io::Error> for OrgPilotError {
    fn from(err: std::io::Error) -> Self {
        OrgPilotError::Config(ConfigError::IoError {
            message: err.to_string(),
        })
    }
}

// =============================================================================
// Result type alias
// =============================================================================

/// A specialized Result type for OrgPilot operations
pub type OrgPilotResult<T> = Result<T, OrgPilotError>;

// =============================================================================
// Tests
// =============================================================================
