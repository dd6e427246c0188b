//! Session cookies.
//!
//! Both sessions are stateless: the user cookie carries the provider's
//! access token, the admin cookie a locally signed token.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::services::admin_auth::SESSION_TTL_SECONDS;

/// Cookie holding the Supabase access token.
pub const USER_SESSION_COOKIE: &str = "sb_access_token";

/// Cookie holding the signed admin session token.
pub const ADMIN_SESSION_COOKIE: &str = "admin_session";

fn base_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Cookie for the end-user access token; expires with the provider session.
#[must_use]
pub fn user_session_cookie(token: &str, expires_in: Option<i64>, secure: bool) -> Cookie<'static> {
    let mut cookie = base_cookie(USER_SESSION_COOKIE, token.to_string(), secure);
    if let Some(seconds) = expires_in.filter(|seconds| *seconds > 0) {
        cookie.set_max_age(Duration::seconds(seconds));
    }
    cookie
}

/// Cookie for the admin session token (12 hours).
#[must_use]
pub fn admin_session_cookie(token: &str, secure: bool) -> Cookie<'static> {
    let mut cookie = base_cookie(ADMIN_SESSION_COOKIE, token.to_string(), secure);
    cookie.set_max_age(Duration::seconds(SESSION_TTL_SECONDS));
    cookie
}

/// Expired admin cookie (`Max-Age=0`).
#[must_use]
pub fn clear_admin_session_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = base_cookie(ADMIN_SESSION_COOKIE, String::new(), secure);
    cookie.set_max_age(Duration::ZERO);
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_cookie_attributes() {
        let rendered = admin_session_cookie("tok", true).to_string();
        assert!(rendered.starts_with("admin_session=tok"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("SameSite=Lax"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("Max-Age=43200"));
    }

    #[test]
    fn test_clear_cookie() {
        let rendered = clear_admin_session_cookie(false).to_string();
        assert!(rendered.contains("Max-Age=0"));
        assert!(!rendered.contains("Secure"));
    }

    #[test]
    fn test_user_cookie_without_expiry() {
        let rendered = user_session_cookie("at", None, true).to_string();
        assert!(rendered.starts_with("sb_access_token=at"));
        assert!(!rendered.contains("Max-Age"));
    }
}
