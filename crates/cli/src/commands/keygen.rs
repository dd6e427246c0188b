//! RSA keypair generation for encrypted auth payloads.
//!
//! The API loads `private_key.pem` (from `AUTH_PRIVATE_KEY_PATH` or inline via
//! `AUTH_PRIVATE_KEY_PEM`); browser clients embed `public_key.pem`.

use std::path::{Path, PathBuf};

use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::{RsaPrivateKey, RsaPublicKey};
use thiserror::Error;

/// Default modulus size.
pub const DEFAULT_BITS: usize = 2048;

/// Smallest modulus accepted.
const MIN_BITS: usize = 1024;

/// Errors that can occur while generating keys.
#[derive(Debug, Error)]
pub enum KeygenError {
    #[error("Key size must be at least {MIN_BITS} bits, got {0}")]
    TooSmall(usize),

    #[error("Key generation failed: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("Private key encoding failed: {0}")]
    PrivateEncoding(#[from] rsa::pkcs8::Error),

    #[error("Public key encoding failed: {0}")]
    PublicEncoding(#[from] rsa::pkcs8::spki::Error),

    #[error("Could not write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Paths of the written key files.
#[derive(Debug, Clone)]
pub struct WrittenKeys {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

/// Generate a keypair and write both PEM files into `out_dir`.
///
/// # Errors
///
/// Returns `KeygenError` if the size is too small, generation or encoding
/// fails, or a file cannot be written.
pub fn generate(out_dir: &Path, bits: usize) -> Result<WrittenKeys, KeygenError> {
    if bits < MIN_BITS {
        return Err(KeygenError::TooSmall(bits));
    }

    tracing::info!(bits, "Generating RSA keypair");
    let private = RsaPrivateKey::new(&mut OsRng, bits)?;
    let public = RsaPublicKey::from(&private);

    let private_pem = private.to_pkcs8_pem(LineEnding::LF)?;
    let public_pem = public.to_public_key_pem(LineEnding::LF)?;

    std::fs::create_dir_all(out_dir).map_err(|source| KeygenError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;
    let written = WrittenKeys {
        private_key: out_dir.join("private_key.pem"),
        public_key: out_dir.join("public_key.pem"),
    };
    write_file(&written.private_key, private_pem.as_bytes(), true)?;
    write_file(&written.public_key, public_pem.as_bytes(), false)?;
    Ok(written)
}

fn write_file(path: &Path, contents: &[u8], private: bool) -> Result<(), KeygenError> {
    let io_error = |source| KeygenError::Io {
        path: path.to_path_buf(),
        source,
    };
    std::fs::write(path, contents).map_err(io_error)?;

    #[cfg(unix)]
    if private {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(io_error)?;
    }
    #[cfg(not(unix))]
    let _ = private;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lessonhub_api::crypto::AuthKeyring;

    use super::*;

    #[test]
    fn test_generated_key_loads_in_api_keyring() {
        let dir = std::env::temp_dir().join(format!("lh-cli-keygen-{}", std::process::id()));
        let written = generate(&dir, MIN_BITS).unwrap();

        let pem = std::fs::read_to_string(&written.private_key).unwrap();
        assert!(AuthKeyring::from_pem(&pem).unwrap().is_available());

        let public = std::fs::read_to_string(&written.public_key).unwrap();
        assert!(public.starts_with("-----BEGIN PUBLIC KEY-----"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_rejects_small_keys() {
        assert!(matches!(
            generate(Path::new("unused"), 512),
            Err(KeygenError::TooSmall(512))
        ));
    }
}
