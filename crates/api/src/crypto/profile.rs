//! AES-GCM encryption of profile data returned to the browser.
//!
//! The client generates a fresh AES key, sends it base64-encoded (inside the
//! RSA payload or the `/profile` body), and receives the profile JSON
//! encrypted under it so PII never travels as plaintext JSON.

use aes_gcm::aead::Aead;
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aes::Aes192;
use aes_gcm::{AeadCore, Aes128Gcm, Aes256Gcm, AesGcm, KeyInit};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::decode_client_base64;

/// Nonce size for AES-GCM (12 bytes).
const NONCE_SIZE: usize = 12;

/// Algorithm tag included in every encrypted block.
pub const PROFILE_ALG: &str = "AES-GCM";

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Errors from profile encryption.
#[derive(Debug, thiserror::Error)]
pub enum ProfileCipherError {
    #[error("return key is missing")]
    MissingKey,
    #[error("return key is not valid base64")]
    KeyEncoding,
    #[error("return key must be 16, 24 or 32 bytes (got {0})")]
    KeyLength(usize),
    #[error("nonce must be {NONCE_SIZE} bytes")]
    Nonce,
    #[error("profile serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("ciphertext is not valid base64")]
    CiphertextEncoding,
    #[error("AES-GCM operation failed")]
    Cipher,
}

/// Encrypted profile block: `{enc_profile, iv, alg}`, base64 fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedProfile {
    /// Ciphertext with the GCM tag appended.
    pub enc_profile: String,
    /// 12-byte nonce.
    pub iv: String,
    pub alg: String,
}

/// Encrypt `profile` as JSON under the base64 AES key `return_key_b64`.
///
/// # Errors
///
/// Returns [`ProfileCipherError`] if the key is missing, not base64, not
/// 16/24/32 bytes long, or serialization fails.
pub fn encrypt_profile<T: Serialize>(
    return_key_b64: Option<&str>,
    profile: &T,
) -> Result<EncryptedProfile, ProfileCipherError> {
    let key = decode_key(return_key_b64)?;
    let plaintext = serde_json::to_vec(profile)?;

    let mut nonce = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce);

    let ciphertext = match key.len() {
        16 => seal::<Aes128Gcm>(&key, &nonce, &plaintext),
        24 => seal::<Aes192Gcm>(&key, &nonce, &plaintext),
        32 => seal::<Aes256Gcm>(&key, &nonce, &plaintext),
        other => Err(ProfileCipherError::KeyLength(other)),
    }?;

    Ok(EncryptedProfile {
        enc_profile: STANDARD.encode(ciphertext),
        iv: STANDARD.encode(nonce),
        alg: PROFILE_ALG.to_string(),
    })
}

/// Inverse of [`encrypt_profile`]; returns the exact JSON bytes.
///
/// # Errors
///
/// Returns [`ProfileCipherError`] on bad key/nonce/ciphertext encoding or a
/// failed authentication tag.
pub fn decrypt_profile(
    return_key_b64: &str,
    block: &EncryptedProfile,
) -> Result<Vec<u8>, ProfileCipherError> {
    let key = decode_key(Some(return_key_b64))?;
    let nonce = decode_client_base64(&block.iv).ok_or(ProfileCipherError::Nonce)?;
    let nonce: [u8; NONCE_SIZE] = nonce
        .try_into()
        .map_err(|_| ProfileCipherError::Nonce)?;
    let ciphertext =
        decode_client_base64(&block.enc_profile).ok_or(ProfileCipherError::CiphertextEncoding)?;

    match key.len() {
        16 => open::<Aes128Gcm>(&key, &nonce, &ciphertext),
        24 => open::<Aes192Gcm>(&key, &nonce, &ciphertext),
        32 => open::<Aes256Gcm>(&key, &nonce, &ciphertext),
        other => Err(ProfileCipherError::KeyLength(other)),
    }
}

fn decode_key(return_key_b64: Option<&str>) -> Result<Vec<u8>, ProfileCipherError> {
    let encoded = return_key_b64
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(ProfileCipherError::MissingKey)?;
    let key = decode_client_base64(encoded).ok_or(ProfileCipherError::KeyEncoding)?;
    match key.len() {
        16 | 24 | 32 => Ok(key),
        other => Err(ProfileCipherError::KeyLength(other)),
    }
}

fn seal<C>(key: &[u8], nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>, ProfileCipherError>
where
    C: KeyInit + Aead + AeadCore<NonceSize = U12>,
{
    let cipher = C::new_from_slice(key).map_err(|_| ProfileCipherError::KeyLength(key.len()))?;
    cipher
        .encrypt(GenericArray::from_slice(nonce), plaintext)
        .map_err(|_| ProfileCipherError::Cipher)
}

fn open<C>(key: &[u8], nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>, ProfileCipherError>
where
    C: KeyInit + Aead + AeadCore<NonceSize = U12>,
{
    let cipher = C::new_from_slice(key).map_err(|_| ProfileCipherError::KeyLength(key.len()))?;
    cipher
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| ProfileCipherError::Cipher)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn key_b64(len: usize) -> String {
        let key: Vec<u8> = (0..len).map(|i| u8::try_from(i * 7 % 256).unwrap()).collect();
        STANDARD.encode(key)
    }

    #[test]
    fn test_round_trip_all_key_sizes() {
        let profile = json!({
            "first_name": "Jane",
            "last_name": "Doe",
            "name": "Jane Doe",
            "email": "jane@example.com",
        });
        let expected = serde_json::to_vec(&profile).unwrap();

        for len in [16, 24, 32] {
            let key = key_b64(len);
            let block = encrypt_profile(Some(&key), &profile).unwrap();

            assert_eq!(block.alg, "AES-GCM");
            assert_eq!(STANDARD.decode(&block.iv).unwrap().len(), 12);
            assert_eq!(decrypt_profile(&key, &block).unwrap(), expected, "key len {len}");
        }
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let key = key_b64(32);
        let first = encrypt_profile(Some(&key), &json!({"a": 1})).unwrap();
        let second = encrypt_profile(Some(&key), &json!({"a": 1})).unwrap();
        assert_ne!(first.iv, second.iv);
        assert_ne!(first.enc_profile, second.enc_profile);
    }

    #[test]
    fn test_rejects_bad_keys() {
        let profile = json!({});
        assert!(matches!(
            encrypt_profile(None, &profile),
            Err(ProfileCipherError::MissingKey)
        ));
        assert!(matches!(
            encrypt_profile(Some("  "), &profile),
            Err(ProfileCipherError::MissingKey)
        ));
        assert!(matches!(
            encrypt_profile(Some("***"), &profile),
            Err(ProfileCipherError::KeyEncoding)
        ));
        assert!(matches!(
            encrypt_profile(Some(&key_b64(20)), &profile),
            Err(ProfileCipherError::KeyLength(20))
        ));
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let block = encrypt_profile(Some(&key_b64(32)), &json!({"a": 1})).unwrap();
        let other = STANDARD.encode([9u8; 32]);
        assert!(matches!(
            decrypt_profile(&other, &block),
            Err(ProfileCipherError::Cipher)
        ));
    }
}
