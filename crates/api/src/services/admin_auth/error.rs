//! Admin authentication error types.

use thiserror::Error;

use super::TokenError;
use crate::supabase::SupabaseError;

/// Errors that can occur during admin authentication.
#[derive(Debug, Error)]
pub enum AdminAuthError {
    /// Email or password missing from the request.
    #[error("email and password are required")]
    MissingCredentials,

    /// Unknown admin or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Email not on the `ADMIN_EMAILS` allow-list, or no admin row.
    #[error("admin access denied")]
    NotAllowed,

    /// The admin row is deactivated.
    #[error("admin account is inactive")]
    Inactive,

    /// The admin row still stores a plaintext credential.
    #[error("admin credential must be rotated")]
    LegacyCredential,

    /// A reset flag is set; the session is not honoured until rotation.
    #[error("password change required")]
    PasswordChangeRequired,

    /// No session cookie.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Session token failed verification.
    #[error("invalid session: {0}")]
    InvalidSession(TokenError),

    /// Reset token failed verification or names another admin.
    #[error("invalid or expired reset token")]
    InvalidResetToken,

    /// Neither a reset token nor the current password was supplied.
    #[error("reset token or current password required")]
    MissingProof,

    /// New password rejected.
    #[error("{0}")]
    WeakPassword(String),

    /// Token could not be issued.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Hashing failed.
    #[error("password hash error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    /// Supabase call failed.
    #[error("supabase error: {0}")]
    Supabase(#[from] SupabaseError),
}
