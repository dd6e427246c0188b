//! HMAC-signed admin session and reset tokens.
//!
//! Format: `base64url(json{email,exp,nonce,purpose}) + "." + base64url(sig)`,
//! both unpadded. The signature covers `"{body}|{purpose}|{password_hash}"`,
//! so rotating an admin's password invalidates every outstanding token
//! without a revocation list.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Session token lifetime (12 hours).
pub const SESSION_TTL_SECONDS: i64 = 60 * 60 * 12;

/// Reset token lifetime (10 minutes).
pub const RESET_TTL_SECONDS: i64 = 60 * 10;

/// What a token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    /// Full admin session (cookie).
    Session,
    /// One-shot password rotation.
    Reset,
}

impl TokenPurpose {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Reset => "reset",
        }
    }

    #[must_use]
    pub const fn ttl_seconds(self) -> i64 {
        match self {
            Self::Session => SESSION_TTL_SECONDS,
            Self::Reset => RESET_TTL_SECONDS,
        }
    }
}

/// Token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub email: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    pub nonce: String,
    pub purpose: String,
}

/// Why a token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token purpose mismatch")]
    WrongPurpose,
    #[error("token expired")]
    Expired,
    #[error("token signing key rejected")]
    Key,
}

/// Issues and verifies admin tokens.
#[derive(Clone)]
pub struct TokenSigner {
    secret: SecretString,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl TokenSigner {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Issue a token bound to `password_hash`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` if the claims cannot be encoded or signed.
    pub fn issue(
        &self,
        email: &str,
        password_hash: Option<&str>,
        purpose: TokenPurpose,
    ) -> Result<String, TokenError> {
        self.issue_at(email, password_hash, purpose, chrono::Utc::now().timestamp())
    }

    /// [`issue`](Self::issue) with an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` if the claims cannot be encoded or signed.
    pub fn issue_at(
        &self,
        email: &str,
        password_hash: Option<&str>,
        purpose: TokenPurpose,
        now: i64,
    ) -> Result<String, TokenError> {
        let mut nonce = [0u8; 12];
        rand::rng().fill_bytes(&mut nonce);

        let claims = TokenClaims {
            email: email.to_string(),
            exp: now + purpose.ttl_seconds(),
            nonce: URL_SAFE_NO_PAD.encode(nonce),
            purpose: purpose.as_str().to_string(),
        };
        let json = serde_json::to_vec(&claims).map_err(|_| TokenError::Malformed)?;
        let body = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.mac(&body, password_hash, purpose)?.finalize().into_bytes());

        Ok(format!("{body}.{signature}"))
    }

    /// Verify signature, purpose and expiry.
    ///
    /// # Errors
    ///
    /// Returns the first check that failed.
    pub fn verify(
        &self,
        token: &str,
        password_hash: Option<&str>,
        purpose: TokenPurpose,
    ) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, password_hash, purpose, chrono::Utc::now().timestamp())
    }

    /// [`verify`](Self::verify) with an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns the first check that failed.
    pub fn verify_at(
        &self,
        token: &str,
        password_hash: Option<&str>,
        purpose: TokenPurpose,
        now: i64,
    ) -> Result<TokenClaims, TokenError> {
        let (body, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::BadSignature)?;
        self.mac(body, password_hash, purpose)?
            .verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims = decode_body(body)?;
        if claims.purpose != purpose.as_str() {
            return Err(TokenError::WrongPurpose);
        }
        if claims.exp < now {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn mac(
        &self,
        body: &str,
        password_hash: Option<&str>,
        purpose: TokenPurpose,
    ) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| TokenError::Key)?;
        mac.update(body.as_bytes());
        mac.update(b"|");
        mac.update(purpose.as_str().as_bytes());
        mac.update(b"|");
        mac.update(password_hash.unwrap_or_default().as_bytes());
        Ok(mac)
    }
}

/// Read the claims without checking the signature.
///
/// Only used to find out which admin a token names; every authorization
/// decision goes through [`TokenSigner::verify`].
///
/// # Errors
///
/// Returns `TokenError::Malformed` if the body is not base64url JSON claims.
pub fn decode_unverified(token: &str) -> Result<TokenClaims, TokenError> {
    let body = token.split_once('.').map_or(token, |(body, _)| body);
    decode_body(body)
}

fn decode_body(body: &str) -> Result<TokenClaims, TokenError> {
    let json = URL_SAFE_NO_PAD
        .decode(body)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)
}
