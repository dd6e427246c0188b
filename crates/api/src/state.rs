//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ApiConfig;
use crate::crypto::AuthKeyring;
use crate::error::AppError;
use crate::services::admin_auth::{AdminAuthService, TokenSigner};
use crate::supabase::{SupabaseClient, SupabaseError};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// configuration, the Supabase client and key material. Missing Supabase or
/// admin settings do not prevent startup; the handlers that need them fail
/// with a configuration error instead.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    supabase: Option<SupabaseClient>,
    keyring: AuthKeyring,
    signer: Option<TokenSigner>,
}

impl AppState {
    /// Create a new application state, loading the payload key.
    ///
    /// # Errors
    ///
    /// Returns an error if the Supabase HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, SupabaseError> {
        let keyring = AuthKeyring::load(
            config.payload_key.inline_pem.as_ref(),
            &config.payload_key.key_path,
        );
        Self::with_keyring(config, keyring)
    }

    /// Create a new application state with an already loaded keyring.
    ///
    /// # Errors
    ///
    /// Returns an error if the Supabase HTTP client cannot be built.
    pub fn with_keyring(config: ApiConfig, keyring: AuthKeyring) -> Result<Self, SupabaseError> {
        let supabase = config
            .supabase
            .as_ref()
            .map(SupabaseClient::new)
            .transpose()?;
        if supabase.is_none() {
            tracing::warn!("Supabase is not configured; auth and manifest routes will fail");
        }

        let signer = config.admin.session_secret.clone().map(TokenSigner::new);
        if signer.is_none() {
            tracing::warn!("Admin session secret is not configured; admin routes will fail");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                supabase,
                keyring,
                signer,
            }),
        })
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get the Supabase client.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when Supabase is not configured.
    pub fn supabase(&self) -> Result<&SupabaseClient, AppError> {
        self.inner
            .supabase
            .as_ref()
            .ok_or_else(|| AppError::Config("Supabase environment not configured".to_string()))
    }

    /// Get the RSA keyring for encrypted auth payloads.
    #[must_use]
    pub fn keyring(&self) -> &AuthKeyring {
        &self.inner.keyring
    }

    /// Get the admin token signer.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when no session secret is available.
    pub fn token_signer(&self) -> Result<&TokenSigner, AppError> {
        self.inner
            .signer
            .as_ref()
            .ok_or_else(|| AppError::Config("Admin session secret not configured".to_string()))
    }

    /// Build the admin auth service.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when Supabase or the session secret is
    /// missing.
    pub fn admin_auth(&self) -> Result<AdminAuthService<'_>, AppError> {
        Ok(AdminAuthService::new(
            self.supabase()?,
            self.token_signer()?,
            &self.inner.config.admin,
        ))
    }
}
