//! GoTrue endpoints (`/auth/v1`).

use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use lessonhub_core::{mask_email, normalize_email};

use super::{
    AuthSession, AuthUser, KeyRole, NewAccount, SignUpOutcome, SupabaseClient, SupabaseError,
    check, send_json,
};

/// Timeout for the admin user lookup.
const ADMIN_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Page size for the listing fallback of the admin user lookup.
const ADMIN_LOOKUP_PAGE_SIZE: u32 = 200;

/// `/admin/users` answers with either a bare list or `{"users": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum UserList {
    Bare(Vec<AuthUser>),
    Wrapped { users: Vec<AuthUser> },
}

impl UserList {
    fn into_users(self) -> Vec<AuthUser> {
        match self {
            Self::Bare(users) | Self::Wrapped { users } => users,
        }
    }
}

impl SupabaseClient {
    // =========================================================================
    // End-user auth
    // =========================================================================

    /// Exchange email and password for a session.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Api` with a 4xx status when the provider
    /// rejects the credentials.
    #[instrument(skip(self, password), fields(email = %mask_email(email)))]
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, SupabaseError> {
        let request = self
            .request(Method::POST, "/auth/v1/token", KeyRole::Public)?
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        send_json(request).await
    }

    /// Register a new account with name metadata.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Api` when the provider rejects the sign-up
    /// (duplicate email, weak password, ...).
    #[instrument(skip(self, account), fields(email = %mask_email(account.email)))]
    pub async fn sign_up(&self, account: &NewAccount<'_>) -> Result<SignUpOutcome, SupabaseError> {
        let request = self
            .request(Method::POST, "/auth/v1/signup", KeyRole::Public)?
            .json(&json!({
                "email": account.email,
                "password": account.password,
                "data": {
                    "first_name": account.first_name,
                    "last_name": account.last_name,
                    "name": account.full_name(),
                },
            }));
        let body: Value = send_json(request).await?;
        parse_sign_up(body)
    }

    /// Resolve the user behind an access token.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Api` with a 401/403 when the token is invalid
    /// or expired.
    #[instrument(skip_all)]
    pub async fn get_user(&self, access_token: &str) -> Result<AuthUser, SupabaseError> {
        let request = self.user_request(Method::GET, "/auth/v1/user", access_token)?;
        send_json(request).await
    }

    // =========================================================================
    // Admin user lookup
    // =========================================================================

    /// Whether an account with this email exists (case-insensitive).
    ///
    /// Lookup failures are logged and reported as "not found"; the provider's
    /// own duplicate check still applies at sign-up.
    #[instrument(skip(self), fields(email = %mask_email(email)))]
    pub async fn user_exists_by_email(&self, email: &str) -> bool {
        let wanted = normalize_email(email);

        match self.list_users(&[("email", wanted.clone())]).await {
            Ok(users) if contains_email(&users, &wanted) => return true,
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Admin user lookup by email failed"),
        }

        // Older GoTrue versions ignore the email filter; scan the first page.
        match self
            .list_users(&[
                ("page", "1".to_string()),
                ("per_page", ADMIN_LOOKUP_PAGE_SIZE.to_string()),
            ])
            .await
        {
            Ok(users) => contains_email(&users, &wanted),
            Err(e) => {
                tracing::warn!(error = %e, "Admin user listing failed");
                false
            }
        }
    }

    async fn list_users(&self, query: &[(&str, String)]) -> Result<Vec<AuthUser>, SupabaseError> {
        let request = self
            .request(Method::GET, "/auth/v1/admin/users", KeyRole::Service)?
            .query(query)
            .timeout(ADMIN_LOOKUP_TIMEOUT);
        let response = check(request.send().await?).await?;
        let list: UserList = response
            .json()
            .await
            .map_err(|e| SupabaseError::Parse(e.to_string()))?;
        Ok(list.into_users())
    }
}

fn contains_email(users: &[AuthUser], wanted: &str) -> bool {
    users
        .iter()
        .filter_map(|user| user.email.as_deref())
        .any(|email| normalize_email(email) == wanted)
}

fn parse_sign_up(body: Value) -> Result<SignUpOutcome, SupabaseError> {
    if body.get("access_token").is_some() {
        let session: AuthSession =
            serde_json::from_value(body).map_err(|e| SupabaseError::Parse(e.to_string()))?;
        return Ok(SignUpOutcome::Session(Box::new(session)));
    }
    if body.get("id").is_some() {
        let user: AuthUser =
            serde_json::from_value(body).map_err(|e| SupabaseError::Parse(e.to_string()))?;
        return Ok(SignUpOutcome::PendingConfirmation(user));
    }
    if let Some(user) = body.get("user").filter(|user| user.is_object()) {
        let user: AuthUser = serde_json::from_value(user.clone())
            .map_err(|e| SupabaseError::Parse(e.to_string()))?;
        return Ok(SignUpOutcome::PendingConfirmation(user));
    }
    Err(SupabaseError::Parse(
        "sign-up response has neither a session nor a user".to_string(),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::config::SupabaseConfig;

    fn client(server: &mockito::Server, service: bool) -> SupabaseClient {
        SupabaseClient::new(&SupabaseConfig {
            url: server.url(),
            anon_key: Some(SecretString::from("anon-key")),
            service_role_key: service.then(|| SecretString::from("service-key")),
        })
        .unwrap()
    }

    #[test]
    fn test_parse_sign_up_shapes() {
        let session = parse_sign_up(json!({
            "access_token": "at",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": {"id": "u1", "email": "a@b.co"}
        }))
        .unwrap();
        assert!(session.session().is_some());
        assert_eq!(session.user().id, "u1");

        let pending = parse_sign_up(json!({"id": "u2", "email": "c@d.co"})).unwrap();
        assert!(pending.session().is_none());
        assert_eq!(pending.user().id, "u2");

        assert!(parse_sign_up(json!({"nothing": true})).is_err());
    }

    #[tokio::test]
    async fn test_sign_in_sends_anon_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/v1/token")
            .match_query(mockito::Matcher::UrlEncoded(
                "grant_type".into(),
                "password".into(),
            ))
            .match_header("apikey", "anon-key")
            .with_status(200)
            .with_body(
                r#"{"access_token":"tok","token_type":"bearer","expires_in":3600,"user":{"id":"u1"}}"#,
            )
            .create_async()
            .await;

        let session = client(&server, false)
            .sign_in_with_password("a@b.co", "pw")
            .await
            .unwrap();
        assert_eq!(session.access_token, "tok");
        assert_eq!(session.expires_in, Some(3600));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sign_in_rejection_is_client_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/v1/token")
            .match_query(mockito::Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
            .create_async()
            .await;

        let err = client(&server, false)
            .sign_in_with_password("a@b.co", "wrong")
            .await
            .unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("Invalid login credentials"));
    }

    #[tokio::test]
    async fn test_user_exists_matches_case_insensitively() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/auth/v1/admin/users")
            .match_query(mockito::Matcher::UrlEncoded(
                "email".into(),
                "jane@example.com".into(),
            ))
            .match_header("apikey", "service-key")
            .with_status(200)
            .with_body(r#"{"users":[{"id":"u1","email":"Jane@Example.com"}]}"#)
            .create_async()
            .await;

        assert!(
            client(&server, true)
                .user_exists_by_email("  JANE@example.com ")
                .await
        );
    }

    #[tokio::test]
    async fn test_user_exists_falls_back_to_listing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/auth/v1/admin/users")
            .match_query(mockito::Matcher::UrlEncoded(
                "email".into(),
                "jane@example.com".into(),
            ))
            .with_status(200)
            .with_body(r#"[{"id":"u9","email":"someone@else.com"}]"#)
            .create_async()
            .await;
        server
            .mock("GET", "/auth/v1/admin/users")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("page".into(), "1".into()),
                mockito::Matcher::UrlEncoded("per_page".into(), "200".into()),
            ]))
            .with_status(200)
            .with_body(r#"[{"id":"u9","email":"someone@else.com"},{"id":"u1","email":"jane@example.com"}]"#)
            .create_async()
            .await;

        assert!(client(&server, true).user_exists_by_email("jane@example.com").await);
    }

    #[tokio::test]
    async fn test_user_exists_without_service_key_is_false() {
        let server = mockito::Server::new_async().await;
        assert!(!client(&server, false).user_exists_by_email("jane@example.com").await);
    }
}
