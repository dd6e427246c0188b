//! Integration tests for the LessonHub API.
//!
//! The full application (path rewrite, middleware, routes) runs in-process
//! against a `mockito` server standing in for Supabase, so no network access
//! or credentials are needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p lessonhub-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `auth_flow` - Login, signup and encrypted profiles
//! - `admin_flow` - Admin sessions, password rotation and manifest CRUD
//! - `manifest` - Public PDF listing and path rewriting

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use rsa::pkcs8::DecodePrivateKey;
use rsa::rand_core::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use secrecy::SecretString;
use serde_json::Value;
use sha2::Sha256;
use tower::ServiceExt;

use lessonhub_api::config::{AdminConfig, ApiConfig, SupabaseConfig, WebConfig};
use lessonhub_api::crypto::AuthKeyring;
use lessonhub_api::routes::{App, app};
use lessonhub_api::services::admin_auth::{TokenPurpose, TokenSigner};
use lessonhub_api::state::AppState;

/// RSA key the test server decrypts auth payloads with.
pub const PAYLOAD_KEY_PEM: &str = include_str!("../../api/tests/fixtures/payload_key.pem");

/// Admin signing secret used by every test context.
pub const ADMIN_SECRET: &str = "integration-s3cret-7f6e5d4c3b2a1908";

/// A running mock Supabase plus the app wired to it.
pub struct TestContext {
    pub server: mockito::ServerGuard,
    app: App,
}

/// Status, headers and parsed JSON body of a response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Value of the `name` cookie from `Set-Cookie`, if set.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.set_cookie(name).and_then(|raw| {
            raw.split(';')
                .next()
                .and_then(|pair| pair.split_once('='))
                .map(|(_, value)| value.to_string())
        })
    }

    /// The raw `Set-Cookie` header for `name`.
    #[must_use]
    pub fn set_cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{name}=");
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|value| value.starts_with(&prefix))
            .map(ToString::to_string)
    }
}

impl TestContext {
    /// Context with both Supabase keys, an admin secret and the payload key.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Context with a config adjusted by `customize`.
    pub async fn with_config(customize: impl FnOnce(&mut ApiConfig)) -> Self {
        let server = mockito::Server::new_async().await;
        let mut config = ApiConfig {
            supabase: Some(SupabaseConfig {
                url: server.url(),
                anon_key: Some(SecretString::from("anon-key")),
                service_role_key: Some(SecretString::from("service-key")),
            }),
            admin: AdminConfig {
                session_secret: Some(SecretString::from(ADMIN_SECRET)),
                allowed_emails: Vec::new(),
            },
            web: WebConfig {
                cookie_secure: false,
                ..WebConfig::default()
            },
            ..ApiConfig::default()
        };
        customize(&mut config);

        let keyring = AuthKeyring::from_pem(PAYLOAD_KEY_PEM).unwrap();
        let state = AppState::with_keyring(config, keyring).unwrap();
        Self {
            server,
            app: app(state),
        }
    }

    /// Send a request through the whole application.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            headers,
            body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.send(request(Method::GET, uri, None, cookie)).await
    }

    pub async fn post(&self, uri: &str, body: &Value, cookie: Option<&str>) -> TestResponse {
        self.send(request(Method::POST, uri, Some(body), cookie)).await
    }
}

/// Build a request with an optional JSON body and `Cookie` header.
#[must_use]
pub fn request(method: Method, uri: &str, body: Option<&Value>, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Encrypt `payload` for the test server the way browser clients do.
#[must_use]
pub fn encrypt_payload(payload: &Value) -> String {
    let private = RsaPrivateKey::from_pkcs8_pem(PAYLOAD_KEY_PEM).unwrap();
    let public = RsaPublicKey::from(&private);
    let ciphertext = public
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), payload.to_string().as_bytes())
        .unwrap();
    STANDARD.encode(ciphertext)
}

/// A fresh base64 AES-256 return key.
#[must_use]
pub fn return_key() -> String {
    let mut key = [0u8; 32];
    rand::rng().fill_bytes(&mut key);
    STANDARD.encode(key)
}

/// An admin session cookie header bound to `password_hash`.
#[must_use]
pub fn admin_cookie(email: &str, password_hash: &str) -> String {
    let token = TokenSigner::new(SecretString::from(ADMIN_SECRET))
        .issue(email, Some(password_hash), TokenPurpose::Session)
        .unwrap();
    format!("admin_session={token}")
}
