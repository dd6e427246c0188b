//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Every error renders as `{"detail": "<message>"}`.

use axum::{
    Json,
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;

use lessonhub_core::PdfAssetError;

use crate::services::admin_auth::AdminAuthError;
use crate::supabase::SupabaseError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Required configuration is missing.
    #[error("{0}")]
    Config(String),

    /// Supabase operation failed unexpectedly.
    #[error("Supabase error: {0}")]
    Supabase(#[from] SupabaseError),

    /// Admin authentication failed.
    #[error("Admin auth error: {0}")]
    AdminAuth(#[from] AdminAuthError),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Caller is not authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// Caller is authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Method not supported on this path.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Request conflicts with existing state.
    #[error("{0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Config(_) | Self::Supabase(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::AdminAuth(err) => match err {
                AdminAuthError::MissingCredentials | AdminAuthError::WeakPassword(_) => {
                    StatusCode::BAD_REQUEST
                }
                AdminAuthError::InvalidCredentials
                | AdminAuthError::NotAuthenticated
                | AdminAuthError::InvalidSession(_)
                | AdminAuthError::InvalidResetToken
                | AdminAuthError::MissingProof => StatusCode::UNAUTHORIZED,
                AdminAuthError::NotAllowed
                | AdminAuthError::Inactive
                | AdminAuthError::LegacyCredential
                | AdminAuthError::PasswordChangeRequired => StatusCode::FORBIDDEN,
                AdminAuthError::Token(_)
                | AdminAuthError::PasswordHash(_)
                | AdminAuthError::Supabase(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    /// Client-facing message. Server-side detail is only logged.
    fn detail(&self) -> String {
        match self {
            Self::Supabase(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::AdminAuth(err) => match err {
                AdminAuthError::MissingCredentials => "Email and password are required".to_string(),
                AdminAuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AdminAuthError::NotAllowed => "Not authorized".to_string(),
                AdminAuthError::Inactive => "Admin account is disabled".to_string(),
                AdminAuthError::LegacyCredential | AdminAuthError::PasswordChangeRequired => {
                    "Password reset required".to_string()
                }
                AdminAuthError::NotAuthenticated => "Not authenticated".to_string(),
                AdminAuthError::InvalidSession(_) => "Invalid session".to_string(),
                AdminAuthError::InvalidResetToken => "Invalid or expired reset token".to_string(),
                AdminAuthError::MissingProof => {
                    "Reset token or current password required".to_string()
                }
                AdminAuthError::WeakPassword(msg) => msg.clone(),
                AdminAuthError::Token(_)
                | AdminAuthError::PasswordHash(_)
                | AdminAuthError::Supabase(_) => "Internal server error".to_string(),
            },
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status(), Json(json!({ "detail": self.detail() }))).into_response()
    }
}

impl From<PdfAssetError> for AppError {
    fn from(err: PdfAssetError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Parse a JSON request body, mapping any failure to 400 "Invalid JSON body".
///
/// # Errors
///
/// Returns `AppError::BadRequest` if the body is not valid JSON for `T`.
pub fn parse_json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected request body");
        AppError::BadRequest("Invalid JSON body".to_string())
    })
}

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
