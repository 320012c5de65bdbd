// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity error taxonomy with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Error type shared by every identity provider.
///
/// Operations return it as a value; nothing in the crate panics or unwinds
/// across a provider boundary.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Malformed input, rejected before any I/O.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Identifier already registered: {0}")]
    DuplicateIdentifier(String),

    /// Bad credentials, an expired session, or a provider rejection.
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport failure talking to the hosted provider.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Ad quota reached ({used} of {quota})")]
    QuotaExceeded { used: u32, quota: u32 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Identity provider not configured: {0}")]
    ProviderUnavailable(&'static str),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Message used for every failed local login, so unknown identifiers and
    /// wrong passwords are indistinguishable.
    pub const INVALID_CREDENTIALS: &'static str = "Invalid credentials";
    /// Message used when the provider no longer accepts the session.
    pub const SESSION_EXPIRED: &'static str = "Session expired";

    /// Check whether this error means the remote session is no longer usable.
    pub fn is_session_expired(&self) -> bool {
        match self {
            AuthError::Auth(msg) => {
                msg == Self::SESSION_EXPIRED
                    || msg.contains("refresh_token")
                    || msg.contains("invalid_grant")
                    || msg.to_lowercase().contains("expired")
            }
            _ => false,
        }
    }

    /// Short, user-facing description for notifications.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Validation(msg) => msg.clone(),
            AuthError::DuplicateIdentifier(id) => format!("\"{}\" is already taken", id),
            AuthError::Auth(msg) => msg.clone(),
            AuthError::NotFound(what) => format!("{} not found", what),
            AuthError::Network(_) => "Could not reach the sign-in service".to_string(),
            AuthError::QuotaExceeded { quota, .. } => {
                format!("You have used all {} ads in your plan", quota)
            }
            AuthError::Storage(_) | AuthError::Internal(_) => {
                "Something went wrong, please try again".to_string()
            }
            AuthError::ProviderUnavailable(name) => {
                format!("Sign-in for {} is not available", name)
            }
        }
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|k| k.to_string())
            .collect();
        fields.sort();
        AuthError::Validation(format!("invalid {}", fields.join(", ")))
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AuthError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", Some(msg.clone()))
            }
            AuthError::DuplicateIdentifier(id) => {
                (StatusCode::CONFLICT, "duplicate_identifier", Some(id.clone()))
            }
            AuthError::Auth(_) => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AuthError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AuthError::Network(msg) => {
                tracing::warn!(error = %msg, "Identity provider unreachable");
                (StatusCode::BAD_GATEWAY, "provider_unreachable", None)
            }
            AuthError::QuotaExceeded { .. } => (
                StatusCode::FORBIDDEN,
                "quota_exceeded",
                Some(self.to_string()),
            ),
            AuthError::ProviderUnavailable(name) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "provider_unavailable",
                Some(name.to_string()),
            ),
            AuthError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }
            AuthError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for the identity gate
pub type Result<T> = std::result::Result<T, AuthError>;
