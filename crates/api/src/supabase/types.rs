//! Supabase response and request shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A GoTrue user.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<Map<String, Value>>,
}

impl AuthUser {
    /// A string value from `user_metadata`.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata
            .as_ref()
            .and_then(|meta| meta.get(key))
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
    }
}

/// A GoTrue session (token grant response).
///
/// Implements `Debug` manually to redact tokens.
#[derive(Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("user", &self.user.id)
            .finish_non_exhaustive()
    }
}

/// Result of a sign-up.
///
/// Projects with email confirmation enabled answer with a bare user; others
/// answer with a full session.
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    Session(Box<AuthSession>),
    PendingConfirmation(AuthUser),
}

impl SignUpOutcome {
    #[must_use]
    pub fn user(&self) -> &AuthUser {
        match self {
            Self::Session(session) => &session.user,
            Self::PendingConfirmation(user) => user,
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            Self::Session(session) => Some(session),
            Self::PendingConfirmation(_) => None,
        }
    }
}

/// Sign-up request.
#[derive(Clone)]
pub struct NewAccount<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

impl NewAccount<'_> {
    /// `"first last"`, trimmed.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

/// A `profiles` row. Which columns exist varies between projects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProfileRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ProfileRow {
    /// `full_name`, falling back to `name`.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.full_name
            .as_deref()
            .or(self.name.as_deref())
            .filter(|value| !value.trim().is_empty())
    }
}
