//! Admin credential commands.
//!
//! # Usage
//!
//! ```bash
//! # Hash a password (cost 12)
//! lh-cli admin hash-password 'new password'
//!
//! # Verify a session token
//! lh-cli admin check-token -e admin@example.com --hash '$2b$12$...' <token>
//! ```
//!
//! # Environment Variables
//!
//! - `ADMIN_SESSION_SECRET` - HMAC secret the API signs admin tokens with

use lessonhub_api::services::admin_auth::{
    AdminAuthError, TokenClaims, TokenError, TokenPurpose, TokenSigner, hash_password_with_cost,
    is_password_hash, validate_new_password,
};
use lessonhub_core::normalize_email;
use secrecy::SecretString;
use thiserror::Error;

/// Cost used by the API when it hashes rotated passwords.
pub const DEFAULT_COST: u32 = 12;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Password rejected or hashing failed.
    #[error(transparent)]
    Password(#[from] AdminAuthError),

    /// The stored value is not a bcrypt hash.
    #[error("--hash is not a bcrypt hash")]
    NotAHash,

    /// Token failed verification.
    #[error("Token rejected: {0}")]
    Token(#[from] TokenError),

    /// Token is valid but names someone else.
    #[error("Token was issued for {0}")]
    EmailMismatch(String),
}

/// Hash a password the way `/admin/password` stores it.
///
/// # Errors
///
/// Returns `AdminError::Password` if the password is too short or the cost
/// is out of range.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AdminError> {
    validate_new_password(password)?;
    Ok(hash_password_with_cost(password, cost)?)
}

/// Verify a session token for `email` bound to `stored_hash`.
///
/// # Errors
///
/// Returns `AdminError` if the hash is not bcrypt, the token fails
/// verification, or it was issued for another admin.
pub fn check_token(
    token: &str,
    email: &str,
    stored_hash: &str,
    secret: String,
) -> Result<TokenClaims, AdminError> {
    if !is_password_hash(stored_hash) {
        return Err(AdminError::NotAHash);
    }

    let signer = TokenSigner::new(SecretString::from(secret));
    let claims = signer.verify(token, Some(stored_hash), TokenPurpose::Session)?;
    if normalize_email(&claims.email) != normalize_email(email) {
        return Err(AdminError::EmailMismatch(claims.email));
    }
    Ok(claims)
}
