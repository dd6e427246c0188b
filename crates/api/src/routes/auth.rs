//! End-user login and signup.
//!
//! `POST /` and `POST /auth` accept `{mode, email, password, first_name,
//! last_name}` in plaintext or as an RSA-OAEP encrypted `enc` blob. Fields
//! from the decrypted blob win over plaintext ones.

use axum::{Json, body::Bytes, extract::State};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::{Value, json};

use lessonhub_core::{AuthMode, mask_email, normalize_email};

use crate::crypto::{AuthPayload, encrypt_profile};
use crate::error::{AppError, Result, parse_json_body, set_sentry_user};
use crate::models::{ProfilePii, user_session_cookie};
use crate::state::AppState;
use crate::supabase::{AuthSession, NewAccount, ProfileRow, SupabaseClient, SupabaseError};

// =============================================================================
// Request Types
// =============================================================================

/// Login / signup request body.
///
/// No `Debug` derive: the body may carry a plaintext password.
#[derive(Default, Deserialize)]
pub struct AuthRequest {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// Base64 RSA-OAEP ciphertext of an [`AuthPayload`].
    #[serde(default)]
    pub enc: Option<String>,
}

/// Credentials after merging the decrypted payload over plaintext fields.
struct Credentials {
    email: String,
    password: String,
    first_name: Option<String>,
    last_name: Option<String>,
    return_key: Option<String>,
}

impl Credentials {
    fn merge(request: AuthRequest, decrypted: Option<AuthPayload>) -> Self {
        let decrypted = decrypted.unwrap_or_default();
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Self {
            email: normalize_email(
                &non_empty(decrypted.email)
                    .or(request.email)
                    .unwrap_or_default(),
            ),
            password: non_empty(decrypted.password)
                .or(request.password)
                .unwrap_or_default(),
            first_name: non_empty(decrypted.first_name)
                .or_else(|| non_empty(request.first_name))
                .map(|name| name.trim().to_string()),
            last_name: non_empty(decrypted.last_name)
                .or_else(|| non_empty(request.last_name))
                .map(|name| name.trim().to_string()),
            return_key: non_empty(decrypted.rtk),
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /auth` (and `POST /`).
pub async fn auth(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Json<Value>)> {
    let request: AuthRequest = parse_json_body(&body)?;
    handle_auth(&state, jar, request).await
}

/// Shared by the `/auth` route and the catch-all POST handler.
///
/// # Errors
///
/// See the route table in [`crate::routes`].
pub async fn handle_auth(
    state: &AppState,
    jar: CookieJar,
    request: AuthRequest,
) -> Result<(CookieJar, Json<Value>)> {
    let raw_mode = request.mode.clone().unwrap_or_default();

    let decrypted = match request.enc.as_deref().filter(|enc| !enc.trim().is_empty()) {
        Some(enc) => Some(state.keyring().decrypt(enc).map_err(|e| {
            tracing::warn!(error = %e, "Encrypted auth payload rejected");
            AppError::BadRequest("Invalid encrypted payload".to_string())
        })?),
        None => None,
    };
    let credentials = Credentials::merge(request, decrypted);

    let mode: AuthMode = raw_mode
        .parse()
        .map_err(|e: lessonhub_core::AuthModeError| AppError::BadRequest(e.to_string()))?;
    tracing::info!(mode = %mode, email = %mask_email(&credentials.email), "Auth request");

    if credentials.email.is_empty() || credentials.password.is_empty() {
        return Err(AppError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    let supabase = state.supabase()?;
    match mode {
        AuthMode::Login => login(state, supabase, jar, credentials).await,
        AuthMode::Signup => signup(supabase, credentials)
            .await
            .map(|body| (jar, body)),
    }
}

async fn login(
    state: &AppState,
    supabase: &SupabaseClient,
    jar: CookieJar,
    credentials: Credentials,
) -> Result<(CookieJar, Json<Value>)> {
    let session = supabase
        .sign_in_with_password(&credentials.email, &credentials.password)
        .await
        .map_err(|e| {
            if e.is_client_error() {
                tracing::info!(email = %mask_email(&credentials.email), error = %e, "Login rejected");
                AppError::Unauthorized("Invalid login credentials".to_string())
            } else {
                AppError::Supabase(e)
            }
        })?;
    let user = &session.user;
    set_sentry_user(&user.id, None);

    let profile = supabase
        .fetch_profile(
            Some(&user.id),
            user.email.as_deref().or(Some(credentials.email.as_str())),
        )
        .await;
    let pii = ProfilePii::resolve(profile.as_ref(), user);

    let mut body = json!({
        "mode": AuthMode::Login.as_str(),
        "user": { "id": user.id },
        "session": session_json(&session),
        "message": "Login successful",
    });

    if let Some(return_key) = credentials.return_key.as_deref() {
        match encrypt_profile(Some(return_key), &pii) {
            Ok(encrypted) => {
                body["enc_profile"] = json!(encrypted.enc_profile);
                body["iv"] = json!(encrypted.iv);
                body["alg"] = json!(encrypted.alg);
            }
            Err(e) => tracing::warn!(error = %e, "Profile encryption skipped"),
        }
    }

    let cookie = user_session_cookie(
        &session.access_token,
        session.expires_in,
        state.config().web.cookie_secure,
    );
    Ok((jar.add(cookie), Json(body)))
}

async fn signup(supabase: &SupabaseClient, credentials: Credentials) -> Result<Json<Value>> {
    if supabase.has_service_key() && supabase.user_exists_by_email(&credentials.email).await {
        return Err(AppError::Conflict(
            "Email already registered. Please log in instead.".to_string(),
        ));
    }

    let (Some(first_name), Some(last_name)) = (&credentials.first_name, &credentials.last_name)
    else {
        return Err(AppError::BadRequest(
            "first_name and last_name are required for signup".to_string(),
        ));
    };

    let account = NewAccount {
        email: &credentials.email,
        password: &credentials.password,
        first_name,
        last_name,
    };
    let outcome = supabase.sign_up(&account).await.map_err(signup_error)?;
    let user = outcome.user();

    if supabase.has_service_key() && !user.id.is_empty() {
        create_profile(supabase, &user.id, &account).await;
    }

    Ok(Json(json!({
        "mode": AuthMode::Signup.as_str(),
        "user": { "id": user.id, "email": user.email },
        "session": outcome.session().map(session_json),
        "message": "Signup initiated",
    })))
}

/// Best-effort `profiles` row; retried with fewer columns for older schemas.
async fn create_profile(supabase: &SupabaseClient, user_id: &str, account: &NewAccount<'_>) {
    let full = ProfileRow {
        id: Some(user_id.to_string()),
        first_name: Some(account.first_name.to_string()),
        last_name: Some(account.last_name.to_string()),
        full_name: Some(account.full_name()),
        ..ProfileRow::default()
    };
    let Err(e) = supabase.upsert_profile(&full).await else {
        return;
    };
    tracing::debug!(error = %e, "Full profile upsert failed, retrying with full_name only");

    let minimal = ProfileRow {
        id: Some(user_id.to_string()),
        full_name: Some(account.full_name()),
        ..ProfileRow::default()
    };
    if let Err(e) = supabase.upsert_profile(&minimal).await {
        tracing::warn!(error = %e, "Profile creation skipped");
    }
}

fn signup_error(e: SupabaseError) -> AppError {
    if e.is_duplicate_user() {
        return AppError::Conflict("Email already registered. Please log in instead.".to_string());
    }
    match e {
        SupabaseError::Api { status, message } if (400..500).contains(&status) => {
            AppError::BadRequest(message)
        }
        other => AppError::Supabase(other),
    }
}

fn session_json(session: &AuthSession) -> Value {
    json!({
        "access_token": session.access_token,
        "token_type": session.token_type,
        "expires_in": session.expires_in,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decrypted_fields_win() {
        let request = AuthRequest {
            mode: Some("login".into()),
            email: Some("plain@example.com".into()),
            password: Some("plain-pass".into()),
            first_name: Some("Plain".into()),
            ..AuthRequest::default()
        };
        let decrypted = AuthPayload {
            email: Some(" Secret@Example.com ".into()),
            password: Some("secret-pass".into()),
            rtk: Some("a2V5".into()),
            ..AuthPayload::default()
        };

        let merged = Credentials::merge(request, Some(decrypted));
        assert_eq!(merged.email, "secret@example.com");
        assert_eq!(merged.password, "secret-pass");
        assert_eq!(merged.first_name.as_deref(), Some("Plain"));
        assert_eq!(merged.return_key.as_deref(), Some("a2V5"));
    }

    #[test]
    fn test_blank_names_are_missing() {
        let request = AuthRequest {
            first_name: Some("  ".into()),
            last_name: Some(" Doe ".into()),
            ..AuthRequest::default()
        };
        let merged = Credentials::merge(request, None);
        assert_eq!(merged.first_name, None);
        assert_eq!(merged.last_name.as_deref(), Some("Doe"));
    }

    #[test]
    fn test_signup_error_mapping() {
        let duplicate = signup_error(SupabaseError::Api {
            status: 422,
            message: "User already registered".into(),
        });
        assert!(matches!(duplicate, AppError::Conflict(_)));

        let weak = signup_error(SupabaseError::Api {
            status: 422,
            message: "Password should be at least 6 characters.".into(),
        });
        assert!(
            matches!(weak, AppError::BadRequest(ref m) if m == "Password should be at least 6 characters.")
        );

        let outage = signup_error(SupabaseError::Api {
            status: 503,
            message: "unavailable".into(),
        });
        assert!(matches!(outage, AppError::Supabase(_)));
    }
}
