//! Supabase REST client.
//!
//! # Architecture
//!
//! - One pooled `reqwest::Client` shared by every request handler
//! - Supabase is the source of truth: no local copies, no caching
//! - The anon key is used for end-user calls (sign-in, sign-up, get-user);
//!   the service-role key for everything elevated (admin user lookup, tables,
//!   storage)
//!
//! # APIs
//!
//! ## Auth (GoTrue, `/auth/v1`)
//! - Password sign-in and sign-up, access token validation
//! - Admin user lookup by email
//!
//! ## Tables (PostgREST, `/rest/v1`)
//! - `profiles`, `admin_users`, `pdf_assets`
//!
//! ## Storage (`/storage/v1`)
//! - Signed read URLs, signed upload URLs, direct uploads
//!
//! # Example
//!
//! ```rust,ignore
//! use lessonhub_api::supabase::SupabaseClient;
//!
//! let client = SupabaseClient::new(&supabase_config)?;
//!
//! let session = client.sign_in_with_password("jane@example.com", "hunter22").await?;
//! let url = client.create_signed_url("pdfs", "algebra/intro.pdf", 1800).await?;
//! ```

mod auth;
mod storage;
mod tables;
pub mod types;

pub use storage::SignedUpload;
pub use types::*;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::SupabaseConfig;

/// Overall timeout for provider calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when interacting with Supabase.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The operation needs the service-role key.
    #[error("Supabase service role key required for this operation")]
    MissingServiceKey,
}

impl SupabaseError {
    /// HTTP status returned by the provider, if it answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The provider rejected the request itself (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|status| (400..500).contains(&status))
    }

    /// The provider says the email is already registered.
    #[must_use]
    pub fn is_duplicate_user(&self) -> bool {
        let Self::Api { status, message } = self else {
            return false;
        };
        let message = message.to_lowercase();
        *status == 422 && message.contains("already")
            || [
                "already registered",
                "user exists",
                "duplicate",
                "email already in use",
                "email_exists",
            ]
            .iter()
            .any(|needle| message.contains(needle))
    }
}

/// Which key a request is authorized with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyRole {
    /// Anon key (falls back to the service key when no anon key is set).
    Public,
    /// Service-role key, falling back to the anon key (tables, storage).
    Data,
    /// Service-role key only.
    Service,
}

// =============================================================================
// SupabaseClient
// =============================================================================

/// Client for a Supabase project.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<SupabaseClientInner>,
}

struct SupabaseClientInner {
    http: reqwest::Client,
    base_url: String,
    anon_key: Option<SecretString>,
    service_key: Option<SecretString>,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.inner.base_url)
            .field("has_anon_key", &self.inner.anon_key.is_some())
            .field("has_service_key", &self.inner.service_key.is_some())
            .finish()
    }
}

impl SupabaseClient {
    /// Create a new Supabase client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &SupabaseConfig) -> Result<Self, SupabaseError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(concat!("lessonhub-api/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(SupabaseClientInner {
                http,
                base_url: config.url.trim_end_matches('/').to_string(),
                anon_key: config.anon_key.clone(),
                service_key: config.service_role_key.clone(),
            }),
        })
    }

    /// Project URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Whether elevated operations are possible.
    #[must_use]
    pub fn has_service_key(&self) -> bool {
        self.inner.service_key.is_some()
    }

    fn key(&self, role: KeyRole) -> Result<&SecretString, SupabaseError> {
        let key = match role {
            KeyRole::Public => self
                .inner
                .anon_key
                .as_ref()
                .or(self.inner.service_key.as_ref()),
            KeyRole::Data => self
                .inner
                .service_key
                .as_ref()
                .or(self.inner.anon_key.as_ref()),
            KeyRole::Service => self.inner.service_key.as_ref(),
        };
        key.ok_or(SupabaseError::MissingServiceKey)
    }

    /// Start a request against `path` (relative to the project URL),
    /// authorized with the key for `role`.
    fn request(
        &self,
        method: Method,
        path: &str,
        role: KeyRole,
    ) -> Result<RequestBuilder, SupabaseError> {
        self.request_to(method, &format!("{}{path}", self.inner.base_url), role)
    }

    /// Start a request against an absolute URL, authorized for `role`.
    fn request_to(
        &self,
        method: Method,
        url: &str,
        role: KeyRole,
    ) -> Result<RequestBuilder, SupabaseError> {
        let key = self.key(role)?.expose_secret();
        Ok(self
            .request_url(method, url)
            .header("apikey", key)
            .bearer_auth(key))
    }

    fn request_url(&self, method: Method, url: &str) -> RequestBuilder {
        self.inner.http.request(method, url)
    }

    /// Start a request authorized by an end-user access token.
    fn user_request(
        &self,
        method: Method,
        path: &str,
        access_token: &str,
    ) -> Result<RequestBuilder, SupabaseError> {
        let key = self.key(KeyRole::Public)?.expose_secret();
        Ok(self
            .request_url(method, &format!("{}{path}", self.inner.base_url))
            .header("apikey", key)
            .bearer_auth(access_token))
    }
}

/// Turn a non-success response into [`SupabaseError::Api`].
async fn check(response: Response) -> Result<Response, SupabaseError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!(
        status = %status,
        body = %body.chars().take(500).collect::<String>(),
        "Supabase returned non-success status"
    );
    Err(SupabaseError::Api {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Send, check status, and decode a JSON body.
async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, SupabaseError> {
    let response = check(request.send().await?).await?;
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        tracing::warn!(
            error = %e,
            body = %text.chars().take(500).collect::<String>(),
            "Failed to parse Supabase response"
        );
        SupabaseError::Parse(e.to_string())
    })
}

/// Pull a human-readable message out of a GoTrue/PostgREST/Storage error body.
fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|value| {
            ["msg", "message", "error_description", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(serde_json::Value::as_str))
        })
        .map_or_else(
            || body.chars().take(200).collect(),
            ToString::to_string,
        )
}
