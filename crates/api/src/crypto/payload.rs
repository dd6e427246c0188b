//! Encrypted auth payloads.
//!
//! Browser clients encrypt `{email, password, first_name, last_name, rtk}`
//! with the server's RSA public key (OAEP, SHA-256) and send the base64
//! ciphertext as `enc`. The private key comes from `AUTH_PRIVATE_KEY_PEM`
//! or a key file; without one, encrypted payloads are rejected and clients
//! fall back to plaintext fields.

use std::path::Path;

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, RsaPrivateKey};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{info, warn};

use super::decode_client_base64;

/// Reasons an encrypted payload could not be opened.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("auth payload key is not configured")]
    KeyUnavailable,
    #[error("auth payload key could not be parsed")]
    KeyParse,
    #[error("payload is not valid base64")]
    Base64,
    #[error("payload decryption failed")]
    Decrypt,
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// Fields carried inside an encrypted auth payload.
#[derive(Clone, Default, Deserialize)]
pub struct AuthPayload {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// Base64 AES key the response profile should be encrypted under.
    #[serde(default, alias = "return_key")]
    pub rtk: Option<String>,
}

impl std::fmt::Debug for AuthPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthPayload")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("rtk", &self.rtk.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Holder for the RSA private key used to open auth payloads.
#[derive(Clone, Default)]
pub struct AuthKeyring {
    key: Option<RsaPrivateKey>,
}

impl std::fmt::Debug for AuthKeyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthKeyring")
            .field("available", &self.is_available())
            .finish()
    }
}

impl AuthKeyring {
    /// Resolve the key from the inline PEM, then from `key_path`.
    ///
    /// Never fails: a missing or unparseable key is logged and the keyring
    /// is left empty.
    #[must_use]
    pub fn load(inline_pem: Option<&SecretString>, key_path: &Path) -> Self {
        if let Some(pem) = inline_pem {
            match parse_private_key(&unescape_pem(pem.expose_secret())) {
                Ok(key) => {
                    info!("Loaded auth payload key from AUTH_PRIVATE_KEY_PEM");
                    return Self::from_key(key);
                }
                Err(e) => warn!(error = %e, "AUTH_PRIVATE_KEY_PEM is not a usable RSA key"),
            }
        }

        match std::fs::read_to_string(key_path) {
            Ok(pem) => match parse_private_key(&pem) {
                Ok(key) => {
                    info!(path = %key_path.display(), "Loaded auth payload key from file");
                    return Self::from_key(key);
                }
                Err(e) => {
                    warn!(path = %key_path.display(), error = %e, "Auth payload key file is not a usable RSA key");
                }
            },
            Err(e) => {
                warn!(path = %key_path.display(), error = %e, "Auth payload key file unavailable");
            }
        }

        warn!("No auth payload key loaded; encrypted auth payloads will be rejected");
        Self::default()
    }

    /// Wrap an already-parsed key.
    #[must_use]
    pub const fn from_key(key: RsaPrivateKey) -> Self {
        Self { key: Some(key) }
    }

    /// Parse a PKCS#8 or PKCS#1 PEM.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::KeyParse`] if neither encoding parses.
    pub fn from_pem(pem: &str) -> Result<Self, PayloadError> {
        parse_private_key(&unescape_pem(pem)).map(Self::from_key)
    }

    /// Whether a key is loaded.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.key.is_some()
    }

    /// Open a base64 RSA-OAEP(SHA-256) payload and parse the JSON object inside.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] when no key is loaded, the input is not
    /// base64, decryption fails, or the plaintext is not a JSON object.
    pub fn decrypt(&self, enc_b64: &str) -> Result<AuthPayload, PayloadError> {
        let key = self.key.as_ref().ok_or(PayloadError::KeyUnavailable)?;
        let ciphertext = decode_client_base64(enc_b64).ok_or(PayloadError::Base64)?;
        let plaintext = key
            .decrypt(Oaep::new::<Sha256>(), &ciphertext)
            .map_err(|_| PayloadError::Decrypt)?;

        let value: serde_json::Value = serde_json::from_slice(&plaintext)?;
        if !value.is_object() {
            return Err(PayloadError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Environment values often carry the PEM on one line with `\n` escapes.
fn unescape_pem(pem: &str) -> String {
    pem.trim().replace("\\n", "\n")
}

fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, PayloadError> {
    if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(pem) {
        return Ok(key);
    }
    RsaPrivateKey::from_pkcs1_pem(pem).map_err(|_| PayloadError::KeyParse)
}
