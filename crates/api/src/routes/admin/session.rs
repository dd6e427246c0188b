//! Admin session lifecycle: login, password rotation, logout, whoami.

use axum::{Json, body::Bytes, extract::State};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{Result, clear_sentry_user, parse_json_body};
use crate::middleware::RequireAdmin;
use crate::models::{admin_session_cookie, clear_admin_session_cookie};
use crate::services::admin_auth::{AdminLogin, PasswordChange};
use crate::state::AppState;

/// `POST /admin/login` body.
#[derive(Default, Deserialize)]
pub struct AdminLoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// `POST /admin/password` body.
#[derive(Default, Deserialize)]
pub struct AdminPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub reset_token: Option<String>,
    #[serde(default)]
    pub current_password: Option<String>,
}

/// `POST /admin/login`
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Json<Value>)> {
    let request: AdminLoginRequest = parse_json_body(&body)?;
    let outcome = state
        .admin_auth()?
        .login(&request.email, &request.password)
        .await?;

    match outcome {
        AdminLogin::Session { email, token } => {
            let cookie = admin_session_cookie(&token, state.config().web.cookie_secure);
            Ok((
                jar.add(cookie),
                Json(json!({ "email": email, "reset_required": false })),
            ))
        }
        AdminLogin::ResetRequired { email, reset_token } => Ok((
            jar,
            Json(json!({
                "email": email,
                "reset_required": true,
                "reset_token": reset_token,
            })),
        )),
    }
}

/// `POST /admin/password`
pub async fn change_password(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Json<Value>)> {
    let request: AdminPasswordRequest = parse_json_body(&body)?;
    let changed = state
        .admin_auth()?
        .change_password(PasswordChange {
            email: &request.email,
            new_password: &request.new_password,
            reset_token: request.reset_token.as_deref(),
            current_password: request.current_password.as_deref(),
        })
        .await?;

    let cookie = admin_session_cookie(&changed.token, state.config().web.cookie_secure);
    Ok((
        jar.add(cookie),
        Json(json!({ "email": changed.email, "updated": true })),
    ))
}

/// `POST /admin/logout`
pub async fn logout(
    State(state): State<AppState>,
    RequireAdmin(email): RequireAdmin,
    jar: CookieJar,
) -> (CookieJar, Json<Value>) {
    tracing::info!(email = %email.masked(), "Admin logged out");
    clear_sentry_user();
    (
        jar.add(clear_admin_session_cookie(state.config().web.cookie_secure)),
        Json(json!({ "ok": true })),
    )
}

/// `GET /admin/me`
pub async fn me(RequireAdmin(email): RequireAdmin) -> Json<Value> {
    Json(json!({ "email": email, "is_admin": true }))
}
