//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Supabase (requests needing the provider fail with 500 when unset)
//! - `SUPABASE_URL` - Project URL (e.g., <https://abc.supabase.co>)
//! - `SUPABASE_ANON_KEY` - Public anon key (least-privilege calls)
//! - `SUPABASE_SERVICE_ROLE_KEY` - Service-role key (admin lookups, tables, storage)
//!
//! ## Optional
//! - `API_HOST` - Bind address (default: 0.0.0.0)
//! - `API_PORT` - Listen port (default: 8000)
//! - `ADMIN_SESSION_SECRET` - HMAC key for admin tokens (min 32 chars, high entropy);
//!   falls back to the service-role key, then the anon key
//! - `ADMIN_EMAILS` - Comma-separated allow-list of admin emails (empty: no restriction)
//! - `AUTH_PRIVATE_KEY_PEM` - RSA private key for encrypted auth payloads (`\n` escapes allowed)
//! - `AUTH_PRIVATE_KEY_PATH` - Key file tried when the inline PEM is absent
//!   (default: keys/private_key.pem)
//! - `COOKIE_SECURE` - Set the `Secure` attribute on cookies (default: true)
//! - `PDF_BUCKET` - Default storage bucket for admin uploads (default: pdfs)
//! - `PDF_SIGNED_URL_TTL` - Signed read URL lifetime in seconds (default: 1800)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use lessonhub_core::normalize_email;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Supabase project settings; `None` when the URL or both keys are missing
    pub supabase: Option<SupabaseConfig>,
    /// Admin session signing configuration
    pub admin: AdminConfig,
    /// Encrypted auth payload key sources
    pub payload_key: PayloadKeyConfig,
    /// Cookie and storage settings
    pub web: WebConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Supabase project configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project URL without trailing slash
    pub url: String,
    /// Public anon key
    pub anon_key: Option<SecretString>,
    /// Service-role key (elevated)
    pub service_role_key: Option<SecretString>,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &self.anon_key.as_ref().map(|_| "[REDACTED]"))
            .field(
                "service_role_key",
                &self.service_role_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Admin authentication configuration.
#[derive(Clone, Default)]
pub struct AdminConfig {
    /// HMAC secret for session and reset tokens
    pub session_secret: Option<SecretString>,
    /// Normalized allow-list; empty means every `admin_users` row may sign in
    pub allowed_emails: Vec<String>,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field(
                "session_secret",
                &self.session_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("allowed_emails", &self.allowed_emails)
            .finish()
    }
}

impl AdminConfig {
    /// Whether `email` (already normalized) passes the allow-list.
    #[must_use]
    pub fn is_allowed(&self, email: &str) -> bool {
        self.allowed_emails.is_empty() || self.allowed_emails.iter().any(|e| e == email)
    }
}

/// Where the RSA private key for encrypted auth payloads comes from.
#[derive(Clone)]
pub struct PayloadKeyConfig {
    /// Inline PEM (may contain literal `\n` sequences)
    pub inline_pem: Option<SecretString>,
    /// Key file path tried when the inline PEM is absent or unusable
    pub key_path: PathBuf,
}

impl std::fmt::Debug for PayloadKeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadKeyConfig")
            .field("inline_pem", &self.inline_pem.as_ref().map(|_| "[REDACTED]"))
            .field("key_path", &self.key_path)
            .finish()
    }
}

/// Cookie and storage settings.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Whether cookies carry the `Secure` attribute
    pub cookie_secure: bool,
    /// Default bucket for admin uploads
    pub pdf_bucket: String,
    /// Lifetime of signed read URLs in seconds
    pub signed_url_ttl: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            cookie_secure: true,
            pdf_bucket: "pdfs".to_string(),
            signed_url_ttl: 1800,
        }
    }
}

impl Default for PayloadKeyConfig {
    fn default() -> Self {
        Self {
            inline_pem: None,
            key_path: PathBuf::from("keys/private_key.pem"),
        }
    }
}

/// Loopback on port 8000 with nothing external configured.
impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 8000,
            supabase: None,
            admin: AdminConfig::default(),
            payload_key: PayloadKeyConfig::default(),
            web: WebConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is malformed or an explicit
    /// `ADMIN_SESSION_SECRET` fails validation (length, placeholder, entropy).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("API_HOST", "0.0.0.0")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("API_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("API_PORT", "8000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("API_PORT".to_string(), e.to_string()))?;

        let supabase = SupabaseConfig::from_env();
        let admin = AdminConfig::from_env()?;
        let payload_key = PayloadKeyConfig {
            inline_pem: get_optional_secret("AUTH_PRIVATE_KEY_PEM"),
            key_path: PathBuf::from(get_env_or_default(
                "AUTH_PRIVATE_KEY_PATH",
                "keys/private_key.pem",
            )),
        };
        let web = WebConfig::from_env()?;

        Ok(Self {
            host,
            port,
            supabase,
            admin,
            payload_key,
            web,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl SupabaseConfig {
    fn from_env() -> Option<Self> {
        let url = get_optional_env("SUPABASE_URL")?;
        let anon_key = get_optional_secret("SUPABASE_ANON_KEY");
        let service_role_key = get_optional_secret("SUPABASE_SERVICE_ROLE_KEY");
        if anon_key.is_none() && service_role_key.is_none() {
            return None;
        }
        Some(Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key,
            service_role_key,
        })
    }
}

impl AdminConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let explicit = get_optional_env("ADMIN_SESSION_SECRET");
        if let Some(secret) = &explicit {
            validate_session_secret(secret, "ADMIN_SESSION_SECRET")?;
            validate_secret_strength(secret, "ADMIN_SESSION_SECRET")?;
        }
        let session_secret = resolve_session_secret(
            explicit,
            get_optional_env("SUPABASE_SERVICE_ROLE_KEY"),
            get_optional_env("SUPABASE_ANON_KEY"),
        )
        .map(|(secret, source)| {
            match source {
                SessionSecretSource::Explicit => {}
                SessionSecretSource::ServiceRoleKey => tracing::warn!(
                    "ADMIN_SESSION_SECRET not set; signing admin tokens with SUPABASE_SERVICE_ROLE_KEY"
                ),
                SessionSecretSource::AnonKey => tracing::warn!(
                    "ADMIN_SESSION_SECRET not set; signing admin tokens with the public SUPABASE_ANON_KEY"
                ),
            }
            secret
        });
        let allowed_emails = get_optional_env("ADMIN_EMAILS")
            .map(|raw| parse_email_list(&raw))
            .unwrap_or_default();

        Ok(Self {
            session_secret,
            allowed_emails,
        })
    }
}

impl WebConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let cookie_secure = match get_optional_env("COOKIE_SECURE") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidEnvVar("COOKIE_SECURE".to_string(), raw.clone())
            })?,
            None => defaults.cookie_secure,
        };
        let signed_url_ttl = match get_optional_env("PDF_SIGNED_URL_TTL") {
            Some(raw) => raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidEnvVar("PDF_SIGNED_URL_TTL".to_string(), e.to_string())
            })?,
            None => defaults.signed_url_ttl,
        };

        Ok(Self {
            cookie_secure,
            pdf_bucket: get_env_or_default("PDF_BUCKET", &defaults.pdf_bucket),
            signed_url_ttl,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Get an optional environment variable as a secret.
fn get_optional_secret(key: &str) -> Option<SecretString> {
    get_optional_env(key).map(SecretString::from)
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Admin secret precedence: explicit secret, service-role key, anon key.
/// Where the admin token secret came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionSecretSource {
    Explicit,
    ServiceRoleKey,
    AnonKey,
}

fn resolve_session_secret(
    explicit: Option<String>,
    service_role_key: Option<String>,
    anon_key: Option<String>,
) -> Option<(SecretString, SessionSecretSource)> {
    explicit
        .map(|secret| (secret, SessionSecretSource::Explicit))
        .or_else(|| service_role_key.map(|key| (key, SessionSecretSource::ServiceRoleKey)))
        .or_else(|| anon_key.map(|key| (key, SessionSecretSource::AnonKey)))
        .map(|(secret, source)| (SecretString::from(secret), source))
}

/// Split a comma-separated email list, normalizing and dropping blanks.
fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(normalize_email)
        .filter(|email| !email.is_empty())
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(value: &str, var_name: &str) -> Result<(), ConfigError> {
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Expose a secret's length without exposing the value (for `/env-check`).
#[must_use]
pub fn secret_len(secret: Option<&SecretString>) -> usize {
    secret.map_or(0, |s| s.expose_secret().len())
}
