//! Admin authentication service.
//!
//! Admins live in the `admin_users` table, separate from end-user accounts.
//! Sessions are stateless HMAC tokens bound to the admin's current password
//! hash (see [`token`]).

mod error;
mod password;
mod token;

pub use error::AdminAuthError;
pub use password::{
    MIN_PASSWORD_LENGTH, PasswordCheck, hash_password, hash_password_with_cost, is_password_hash,
    validate_new_password, verify_password,
};
pub use token::{
    RESET_TTL_SECONDS, SESSION_TTL_SECONDS, TokenClaims, TokenError, TokenPurpose, TokenSigner,
    decode_unverified,
};

use chrono::Utc;

use lessonhub_core::{AdminRecord, Email};

use crate::config::AdminConfig;
use crate::supabase::SupabaseClient;

/// Outcome of an admin sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminLogin {
    /// Credentials accepted; `token` goes into the session cookie.
    Session { email: Email, token: String },
    /// Credentials accepted but the password must be rotated first.
    ResetRequired { email: Email, reset_token: String },
}

/// A password rotation request.
#[derive(Debug, Clone, Copy)]
pub struct PasswordChange<'a> {
    pub email: &'a str,
    pub new_password: &'a str,
    pub reset_token: Option<&'a str>,
    pub current_password: Option<&'a str>,
}

/// Outcome of a password rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordChanged {
    pub email: Email,
    /// Fresh session token bound to the new hash.
    pub token: String,
}

/// Admin authentication service.
pub struct AdminAuthService<'a> {
    supabase: &'a SupabaseClient,
    signer: &'a TokenSigner,
    config: &'a AdminConfig,
}

impl<'a> AdminAuthService<'a> {
    #[must_use]
    pub const fn new(
        supabase: &'a SupabaseClient,
        signer: &'a TokenSigner,
        config: &'a AdminConfig,
    ) -> Self {
        Self {
            supabase,
            signer,
            config,
        }
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Sign an admin in.
    ///
    /// # Errors
    ///
    /// Returns `AdminAuthError::NotAllowed` if the email is not allow-listed,
    /// `InvalidCredentials` for an unknown admin or wrong password, and
    /// `Inactive` for a deactivated row.
    pub async fn login(&self, email: &str, password: &str) -> Result<AdminLogin, AdminAuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AdminAuthError::MissingCredentials);
        }
        let normalized = Email::parse(email).map_err(|_| AdminAuthError::InvalidCredentials)?;
        self.check_allowed(&normalized)?;

        let record = self
            .supabase
            .fetch_admin_user(email)
            .await?
            .ok_or(AdminAuthError::InvalidCredentials)?;
        if !record.is_active() {
            return Err(AdminAuthError::Inactive);
        }

        let stored = record.stored_credential();
        let check = verify_password(password, stored);
        if !check.matched {
            tracing::info!(email = %normalized.masked(), "Admin login rejected");
            return Err(AdminAuthError::InvalidCredentials);
        }

        if record.requires_password_change(check.hashed) {
            tracing::info!(
                email = %normalized.masked(),
                legacy = !check.hashed,
                "Admin login requires password rotation"
            );
            let reset_token = self
                .signer
                .issue(normalized.as_str(), stored, TokenPurpose::Reset)?;
            return Ok(AdminLogin::ResetRequired {
                email: normalized,
                reset_token,
            });
        }

        let token = self
            .signer
            .issue(normalized.as_str(), stored, TokenPurpose::Session)?;
        tracing::info!(email = %normalized.masked(), "Admin logged in");
        Ok(AdminLogin::Session {
            email: normalized,
            token,
        })
    }

    // =========================================================================
    // Password rotation
    // =========================================================================

    /// Rotate an admin's password and issue a fresh session.
    ///
    /// The caller proves identity with a reset token from [`login`](Self::login)
    /// or with the current password.
    ///
    /// # Errors
    ///
    /// Returns `AdminAuthError::InvalidResetToken` / `InvalidCredentials` when
    /// the proof fails, `MissingProof` when none is given, and `WeakPassword`
    /// when the new password is too short.
    pub async fn change_password(
        &self,
        request: PasswordChange<'_>,
    ) -> Result<PasswordChanged, AdminAuthError> {
        if request.email.trim().is_empty() {
            return Err(AdminAuthError::MissingCredentials);
        }
        let email =
            Email::parse(request.email).map_err(|_| AdminAuthError::InvalidCredentials)?;
        self.check_allowed(&email)?;

        let record = self
            .supabase
            .fetch_admin_user(request.email)
            .await?
            .ok_or(AdminAuthError::InvalidCredentials)?;
        if !record.is_active() {
            return Err(AdminAuthError::Inactive);
        }

        self.prove_identity(&email, &record, &request)?;

        validate_new_password(request.new_password)?;
        let new_hash = hash_password(request.new_password)?;

        let update = record.password_update(&new_hash, Utc::now());
        let stored_email = record.email().unwrap_or_else(|| email.as_str());
        self.supabase.update_admin_user(stored_email, &update).await?;

        let token = self
            .signer
            .issue(email.as_str(), Some(&new_hash), TokenPurpose::Session)?;
        tracing::info!(email = %email.masked(), "Admin password rotated");
        Ok(PasswordChanged { email, token })
    }

    fn prove_identity(
        &self,
        email: &Email,
        record: &AdminRecord,
        request: &PasswordChange<'_>,
    ) -> Result<(), AdminAuthError> {
        let stored = record.stored_credential();

        if let Some(reset_token) = request.reset_token.filter(|token| !token.is_empty()) {
            let claims = self
                .signer
                .verify(reset_token, stored, TokenPurpose::Reset)
                .map_err(|e| {
                    tracing::info!(email = %email.masked(), error = %e, "Reset token rejected");
                    AdminAuthError::InvalidResetToken
                })?;
            if !email.matches(&claims.email) {
                return Err(AdminAuthError::InvalidResetToken);
            }
            return Ok(());
        }

        if let Some(current) = request.current_password.filter(|pw| !pw.is_empty()) {
            if verify_password(current, stored).matched {
                return Ok(());
            }
            return Err(AdminAuthError::InvalidCredentials);
        }

        Err(AdminAuthError::MissingProof)
    }

    // =========================================================================
    // Session guard
    // =========================================================================

    /// Validate an `admin_session` token against the live admin row.
    ///
    /// # Errors
    ///
    /// Returns `AdminAuthError::InvalidSession` for a bad or expired token,
    /// `NotAllowed` / `Inactive` when the admin lost access,
    /// `LegacyCredential` when the row holds a plaintext password, and
    /// `PasswordChangeRequired` when a reset flag is set.
    pub async fn authorize_session(&self, token: &str) -> Result<Email, AdminAuthError> {
        let claims = decode_unverified(token).map_err(AdminAuthError::InvalidSession)?;
        if claims.purpose != TokenPurpose::Session.as_str() {
            return Err(AdminAuthError::InvalidSession(TokenError::WrongPurpose));
        }
        let email = Email::parse(&claims.email)
            .map_err(|_| AdminAuthError::InvalidSession(TokenError::Malformed))?;
        self.check_allowed(&email)?;

        let record = self
            .supabase
            .fetch_admin_user(email.as_str())
            .await?
            .ok_or(AdminAuthError::NotAllowed)?;
        if !record.is_active() {
            return Err(AdminAuthError::Inactive);
        }

        let stored = record.stored_credential();
        if !stored.is_some_and(is_password_hash) {
            tracing::warn!(
                email = %email.masked(),
                "Admin session rejected: credential is not hashed"
            );
            return Err(AdminAuthError::LegacyCredential);
        }

        self.signer
            .verify(token, stored, TokenPurpose::Session)
            .map_err(AdminAuthError::InvalidSession)?;

        if record.requires_password_change(true) {
            return Err(AdminAuthError::PasswordChangeRequired);
        }
        Ok(email)
    }

    fn check_allowed(&self, email: &Email) -> Result<(), AdminAuthError> {
        if self.config.is_allowed(email.as_str()) {
            return Ok(());
        }
        tracing::warn!(email = %email.masked(), "Email not on admin allow-list");
        Err(AdminAuthError::NotAllowed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mockito::Matcher;
    use secrecy::SecretString;

    use super::*;
    use crate::config::SupabaseConfig;

    const TEST_COST: u32 = 4;

    fn signer() -> TokenSigner {
        TokenSigner::new(SecretString::from("unit-test-signing-key-7f3a9c2e1b0d"))
    }

    fn supabase(server: &mockito::Server) -> SupabaseClient {
        SupabaseClient::new(&SupabaseConfig {
            url: server.url(),
            anon_key: None,
            service_role_key: Some(SecretString::from("service-key")),
        })
        .unwrap()
    }

    fn open_config() -> AdminConfig {
        AdminConfig {
            session_secret: None,
            allowed_emails: Vec::new(),
        }
    }

    async fn mock_admin(server: &mut mockito::Server, row: serde_json::Value) -> mockito::Mock {
        server
            .mock("GET", "/rest/v1/admin_users")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(serde_json::json!([row]).to_string())
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_login_issues_session_for_hashed_admin() {
        let mut server = mockito::Server::new_async().await;
        let hash = hash_password_with_cost("s3cure-pass", TEST_COST).unwrap();
        mock_admin(
            &mut server,
            serde_json::json!({"email": "admin@example.com", "password_hash": hash, "active": true}),
        )
        .await;

        let (client, signer, config) = (supabase(&server), signer(), open_config());
        let service = AdminAuthService::new(&client, &signer, &config);

        let AdminLogin::Session { email, token } =
            service.login("Admin@Example.com", "s3cure-pass").await.unwrap()
        else {
            panic!("expected a session");
        };
        assert_eq!(email.as_str(), "admin@example.com");
        assert!(signer.verify(&token, Some(&hash), TokenPurpose::Session).is_ok());
    }

    #[tokio::test]
    async fn test_login_with_plaintext_requires_reset() {
        let mut server = mockito::Server::new_async().await;
        mock_admin(
            &mut server,
            serde_json::json!({"email": "admin@example.com", "password": "legacy-pass"}),
        )
        .await;

        let (client, signer, config) = (supabase(&server), signer(), open_config());
        let service = AdminAuthService::new(&client, &signer, &config);

        let login = service.login("admin@example.com", "legacy-pass").await.unwrap();
        let AdminLogin::ResetRequired { reset_token, .. } = login else {
            panic!("expected a reset");
        };
        assert!(
            signer
                .verify(&reset_token, Some("legacy-pass"), TokenPurpose::Reset)
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let mut server = mockito::Server::new_async().await;
        let hash = hash_password_with_cost("s3cure-pass", TEST_COST).unwrap();
        mock_admin(
            &mut server,
            serde_json::json!({"email": "admin@example.com", "password_hash": hash}),
        )
        .await;

        let (client, signer, config) = (supabase(&server), signer(), open_config());
        let service = AdminAuthService::new(&client, &signer, &config);

        assert!(matches!(
            service.login("admin@example.com", "nope-nope").await,
            Err(AdminAuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_login_blocked_by_allow_list() {
        let server = mockito::Server::new_async().await;
        let (client, signer) = (supabase(&server), signer());
        let config = AdminConfig {
            session_secret: None,
            allowed_emails: vec!["boss@example.com".to_string()],
        };
        let service = AdminAuthService::new(&client, &signer, &config);

        assert!(matches!(
            service.login("intruder@example.com", "whatever1").await,
            Err(AdminAuthError::NotAllowed)
        ));
    }

    #[tokio::test]
    async fn test_inactive_admin() {
        let mut server = mockito::Server::new_async().await;
        let hash = hash_password_with_cost("s3cure-pass", TEST_COST).unwrap();
        mock_admin(
            &mut server,
            serde_json::json!({"email": "admin@example.com", "password_hash": hash, "active": false}),
        )
        .await;

        let (client, signer, config) = (supabase(&server), signer(), open_config());
        let service = AdminAuthService::new(&client, &signer, &config);

        assert!(matches!(
            service.login("admin@example.com", "s3cure-pass").await,
            Err(AdminAuthError::Inactive)
        ));
    }

    #[tokio::test]
    async fn test_guard_rejects_plaintext_credential() {
        let mut server = mockito::Server::new_async().await;
        mock_admin(
            &mut server,
            serde_json::json!({"email": "admin@example.com", "password": "legacy-pass"}),
        )
        .await;

        let (client, signer, config) = (supabase(&server), signer(), open_config());
        let token = signer
            .issue("admin@example.com", Some("legacy-pass"), TokenPurpose::Session)
            .unwrap();
        let service = AdminAuthService::new(&client, &signer, &config);

        assert!(matches!(
            service.authorize_session(&token).await,
            Err(AdminAuthError::LegacyCredential)
        ));
    }

    #[tokio::test]
    async fn test_guard_accepts_valid_session() {
        let mut server = mockito::Server::new_async().await;
        let hash = hash_password_with_cost("s3cure-pass", TEST_COST).unwrap();
        mock_admin(
            &mut server,
            serde_json::json!({"email": "admin@example.com", "password_hash": hash}),
        )
        .await;

        let (client, signer, config) = (supabase(&server), signer(), open_config());
        let token = signer
            .issue("admin@example.com", Some(&hash), TokenPurpose::Session)
            .unwrap();
        let service = AdminAuthService::new(&client, &signer, &config);

        let email = service.authorize_session(&token).await.unwrap();
        assert_eq!(email.as_str(), "admin@example.com");
    }

    #[tokio::test]
    async fn test_guard_rejects_reset_token() {
        let server = mockito::Server::new_async().await;
        let (client, signer, config) = (supabase(&server), signer(), open_config());
        let token = signer
            .issue("admin@example.com", Some("$2b$04$abc"), TokenPurpose::Reset)
            .unwrap();
        let service = AdminAuthService::new(&client, &signer, &config);

        assert!(matches!(
            service.authorize_session(&token).await,
            Err(AdminAuthError::InvalidSession(TokenError::WrongPurpose))
        ));
    }

    #[tokio::test]
    async fn test_change_password_with_reset_token() {
        let mut server = mockito::Server::new_async().await;
        mock_admin(
            &mut server,
            serde_json::json!({
                "email": "admin@example.com",
                "password": "legacy-pass",
                "force_password_change": true
            }),
        )
        .await;
        let update = server
            .mock("PATCH", "/rest/v1/admin_users")
            .match_query(Matcher::UrlEncoded("email".into(), "eq.admin@example.com".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "force_password_change": false,
                "password": null
            })))
            .with_status(204)
            .create_async()
            .await;

        let (client, signer, config) = (supabase(&server), signer(), open_config());
        let reset_token = signer
            .issue("admin@example.com", Some("legacy-pass"), TokenPurpose::Reset)
            .unwrap();
        let service = AdminAuthService::new(&client, &signer, &config);

        let changed = service
            .change_password(PasswordChange {
                email: "admin@example.com",
                new_password: "brand-new-pass",
                reset_token: Some(&reset_token),
                current_password: None,
            })
            .await
            .unwrap();
        assert_eq!(changed.email.as_str(), "admin@example.com");
        assert_eq!(
            decode_unverified(&changed.token).unwrap().purpose,
            TokenPurpose::Session.as_str()
        );
        update.assert_async().await;
    }

    #[tokio::test]
    async fn test_change_password_requires_proof() {
        let mut server = mockito::Server::new_async().await;
        mock_admin(
            &mut server,
            serde_json::json!({"email": "admin@example.com", "password": "legacy-pass"}),
        )
        .await;

        let (client, signer, config) = (supabase(&server), signer(), open_config());
        let service = AdminAuthService::new(&client, &signer, &config);

        assert!(matches!(
            service
                .change_password(PasswordChange {
                    email: "admin@example.com",
                    new_password: "brand-new-pass",
                    reset_token: None,
                    current_password: None,
                })
                .await,
            Err(AdminAuthError::MissingProof)
        ));
    }
}
