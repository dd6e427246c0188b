//! Request and response payload encryption.
//!
//! - [`payload`] - RSA-OAEP decryption of encrypted login/signup payloads
//! - [`profile`] - AES-GCM encryption of profile data under a client-supplied key

pub mod payload;
pub mod profile;

pub use payload::{AuthKeyring, AuthPayload, PayloadError};
pub use profile::{EncryptedProfile, ProfileCipherError, decrypt_profile, encrypt_profile};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};

/// Decode base64 from a browser client, accepting the standard and URL-safe
/// alphabets with or without padding.
pub(crate) fn decode_client_base64(value: &str) -> Option<Vec<u8>> {
    let value = value.trim();
    [STANDARD, URL_SAFE, STANDARD_NO_PAD, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(value).ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_client_base64_variants() {
        let bytes = [0xfb_u8, 0xff, 0x01];
        assert_eq!(decode_client_base64("+/8B").unwrap(), bytes);
        assert_eq!(decode_client_base64("-_8B").unwrap(), bytes);
        assert_eq!(decode_client_base64(" aGk= ").unwrap(), b"hi");
        assert_eq!(decode_client_base64("aGk").unwrap(), b"hi");
        assert!(decode_client_base64("not base64!").is_none());
    }
}
