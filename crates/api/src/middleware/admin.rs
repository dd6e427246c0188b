//! Admin guard extractor.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;

use lessonhub_core::Email;

use crate::error::{AppError, set_sentry_user};
use crate::models::ADMIN_SESSION_COOKIE;
use crate::services::admin_auth::AdminAuthError;
use crate::state::AppState;

/// Extractor that requires a valid admin session.
///
/// Reads the `admin_session` cookie and re-checks the admin row on every
/// request, so deactivating an admin or rotating their password takes
/// effect immediately.
///
/// # Example
///
/// ```rust,ignore
/// async fn admin_only(RequireAdmin(email): RequireAdmin) -> impl IntoResponse {
///     format!("Hello, {email}!")
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Email);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(ADMIN_SESSION_COOKIE)
            .map(|cookie| cookie.value().to_owned())
            .filter(|value| !value.is_empty())
            .ok_or(AdminAuthError::NotAuthenticated)?;

        let email = state.admin_auth()?.authorize_session(&token).await?;
        set_sentry_user(&email.masked(), None);
        Ok(Self(email))
    }
}
