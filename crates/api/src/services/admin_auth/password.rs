//! Admin password hashing and verification.
//!
//! New passwords are always stored as bcrypt hashes. Rows migrated from the
//! old panel may still hold plaintext; those are compared in constant time
//! and flagged so the caller can force a rotation.

use subtle::ConstantTimeEq;

use super::AdminAuthError;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Prefix shared by all bcrypt variants (`$2a$`, `$2b$`, `$2y$`).
const BCRYPT_PREFIX: &str = "$2";

/// Outcome of [`verify_password`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordCheck {
    /// The password matched the stored value.
    pub matched: bool,
    /// The stored value was a bcrypt hash (not legacy plaintext).
    pub hashed: bool,
}

impl PasswordCheck {
    const FAILED: Self = Self {
        matched: false,
        hashed: false,
    };
}

/// Whether a stored credential is a bcrypt hash.
#[must_use]
pub fn is_password_hash(stored: &str) -> bool {
    stored.starts_with(BCRYPT_PREFIX) && stored.len() >= 4
}

/// Hash a password with bcrypt at the default cost.
///
/// # Errors
///
/// Returns `AdminAuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AdminAuthError> {
    hash_password_with_cost(password, bcrypt::DEFAULT_COST)
}

/// Hash a password with an explicit bcrypt cost.
///
/// # Errors
///
/// Returns `AdminAuthError::PasswordHash` if the cost is out of range or
/// hashing fails.
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, AdminAuthError> {
    Ok(bcrypt::hash(password, cost)?)
}

/// Check `password` against a stored bcrypt hash or legacy plaintext value.
#[must_use]
pub fn verify_password(password: &str, stored: Option<&str>) -> PasswordCheck {
    let Some(stored) = stored.filter(|value| !value.is_empty()) else {
        return PasswordCheck::FAILED;
    };

    if is_password_hash(stored) {
        return match bcrypt::verify(password, stored) {
            Ok(matched) => PasswordCheck {
                matched,
                hashed: true,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Stored admin password hash is malformed");
                PasswordCheck::FAILED
            }
        };
    }

    PasswordCheck {
        matched: password.as_bytes().ct_eq(stored.as_bytes()).into(),
        hashed: false,
    }
}

/// Validate a new admin password.
///
/// # Errors
///
/// Returns `AdminAuthError::WeakPassword` if the password is too short.
pub fn validate_new_password(password: &str) -> Result<(), AdminAuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AdminAuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}
