//! Liveness and diagnostics.

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::config::secret_len;
use crate::state::AppState;

/// Message returned by the liveness endpoints.
pub const ALIVE_MESSAGE: &str = "lessonhub api alive";

/// `GET /`
pub async fn root() -> Json<Value> {
    Json(json!({ "message": ALIVE_MESSAGE }))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// `GET /ping`
pub async fn ping() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// `GET /env-check`: which settings are present, never their values.
pub async fn env_check(State(state): State<AppState>) -> Json<Value> {
    let config = state.config();
    let supabase = config.supabase.as_ref();
    Json(json!({
        "supabase_url_set": supabase.is_some_and(|s| !s.url.is_empty()),
        "anon_key_len": secret_len(supabase.and_then(|s| s.anon_key.as_ref())),
        "service_role_key_len": secret_len(supabase.and_then(|s| s.service_role_key.as_ref())),
        "admin_session_secret_set": config.admin.session_secret.is_some(),
        "admin_allow_list_len": config.admin.allowed_emails.len(),
        "payload_key_loaded": state.keyring().is_available(),
    }))
}
