//! Encrypted profile retrieval.

use axum::{Json, body::Bytes, extract::State};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use crate::crypto::{EncryptedProfile, encrypt_profile};
use crate::error::{AppError, Result, parse_json_body};
use crate::models::{ProfilePii, USER_SESSION_COOKIE};
use crate::state::AppState;

/// `POST /profile` body.
#[derive(Default, Deserialize)]
pub struct ProfileRequest {
    /// Base64 AES key (16, 24 or 32 bytes) to encrypt the response under.
    #[serde(default)]
    pub rtk: Option<String>,
}

/// `POST /profile`: the signed-in user's profile, AES-GCM encrypted under the
/// caller's return key.
pub async fn profile(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Result<Json<EncryptedProfile>> {
    let token = jar
        .get(USER_SESSION_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

    let request: ProfileRequest = if body.is_empty() {
        ProfileRequest::default()
    } else {
        parse_json_body(&body)?
    };

    let supabase = state.supabase()?;
    let user = supabase.get_user(&token).await.map_err(|e| {
        if e.is_client_error() {
            tracing::info!(error = %e, "Profile request with rejected session");
            AppError::Unauthorized("Invalid session".to_string())
        } else {
            AppError::Supabase(e)
        }
    })?;

    let row = supabase
        .fetch_profile(Some(&user.id), user.email.as_deref())
        .await;
    let pii = ProfilePii::resolve(row.as_ref(), &user);

    let encrypted = encrypt_profile(request.rtk.as_deref(), &pii).map_err(|e| {
        tracing::info!(error = %e, "Profile encryption failed");
        AppError::BadRequest("Encryption unavailable".to_string())
    })?;
    Ok(Json(encrypted))
}
