//! Integration tests for end-user login, signup and encrypted profiles.
//!
//! Supabase Auth and PostgREST are mocked with `mockito`; requests run
//! through the full application, including the path rewrite.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use mockito::Matcher;
use serde_json::{Value, json};

use lessonhub_api::crypto::{EncryptedProfile, decrypt_profile};
use lessonhub_integration_tests::{TestContext, encrypt_payload, return_key};

fn session_body() -> String {
    json!({
        "access_token": "at-1",
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": "rt-1",
        "user": {
            "id": "u-1",
            "email": "jane@example.com",
            "user_metadata": {"first_name": "Jane", "last_name": "Doe"}
        }
    })
    .to_string()
}

fn open_profile(rtk: &str, body: &Value) -> Value {
    let block: EncryptedProfile = serde_json::from_value(json!({
        "enc_profile": body["enc_profile"],
        "iv": body["iv"],
        "alg": body["alg"],
    }))
    .unwrap();
    serde_json::from_slice(&decrypt_profile(rtk, &block).unwrap()).unwrap()
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_encrypted_login_sets_cookie_and_encrypts_profile() {
    let mut ctx = TestContext::new().await;
    let token = ctx
        .server
        .mock("POST", "/auth/v1/token")
        .match_query(Matcher::UrlEncoded("grant_type".into(), "password".into()))
        .match_body(Matcher::PartialJson(json!({"email": "jane@example.com"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(session_body())
        .create_async()
        .await;
    let _profiles = ctx
        .server
        .mock("GET", "/rest/v1/profiles")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id":"u-1","first_name":"Janet","last_name":"Doe","full_name":"Janet Doe"}]"#)
        .create_async()
        .await;

    let rtk = return_key();
    let enc = encrypt_payload(&json!({
        "email": "  Jane@Example.com ",
        "password": "hunter22",
        "rtk": rtk,
    }));
    let response = ctx.post("/auth", &json!({"mode": "login", "enc": enc}), None).await;

    token.assert_async().await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["mode"], "login");
    assert_eq!(response.body["user"]["id"], "u-1");
    assert_eq!(response.body["session"]["access_token"], "at-1");
    assert_eq!(response.body["session"]["expires_in"], 3600);
    assert_eq!(response.body["alg"], "AES-GCM");

    assert_eq!(response.cookie("sb_access_token").as_deref(), Some("at-1"));
    let raw_cookie = response.set_cookie("sb_access_token").unwrap();
    assert!(raw_cookie.contains("HttpOnly"));
    assert!(raw_cookie.contains("SameSite=Lax"));
    assert!(raw_cookie.contains("Path=/"));

    let profile = open_profile(&rtk, &response.body);
    assert_eq!(profile["first_name"], "Janet");
    assert_eq!(profile["name"], "Janet Doe");
    assert_eq!(profile["email"], "jane@example.com");
}

#[tokio::test]
async fn test_plaintext_login_through_rewritten_path() {
    let mut ctx = TestContext::new().await;
    let _token = ctx
        .server
        .mock("POST", "/auth/v1/token")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(session_body())
        .create_async()
        .await;
    let _profiles = ctx
        .server
        .mock("GET", "/rest/v1/profiles")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let response = ctx
        .post(
            "/api/index.py",
            &json!({"mode": "LOGIN", "email": "jane@example.com", "password": "hunter22"}),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Login successful");
    assert!(response.body.get("enc_profile").is_none());
}

#[tokio::test]
async fn test_login_rejected_by_provider() {
    let mut ctx = TestContext::new().await;
    let _token = ctx
        .server
        .mock("POST", "/auth/v1/token")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
        .create_async()
        .await;

    let response = ctx
        .post(
            "/auth",
            &json!({"mode": "login", "email": "jane@example.com", "password": "nope"}),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["detail"], "Invalid login credentials");
    assert!(response.cookie("sb_access_token").is_none());
}

#[tokio::test]
async fn test_bad_requests() {
    let ctx = TestContext::new().await;

    let response = ctx
        .post("/auth", &json!({"mode": "login", "enc": "AAAA"}), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["detail"], "Invalid encrypted payload");

    let response = ctx
        .post("/auth", &json!({"mode": "login", "email": "jane@example.com"}), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["detail"], "Email and password are required");

    let response = ctx
        .post("/auth", &json!({"mode": "reset", "email": "a@b.co", "password": "x"}), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["detail"], "Invalid mode. Use 'login' or 'signup'.");
}

// ============================================================================
// Signup
// ============================================================================

#[tokio::test]
async fn test_signup_existing_email_conflicts() {
    let mut ctx = TestContext::new().await;
    let _users = ctx
        .server
        .mock("GET", "/auth/v1/admin/users")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer service-key")
        .with_status(200)
        .with_body(r#"{"users":[{"id":"u-9","email":"Taken@Example.com"}]}"#)
        .create_async()
        .await;
    let signup = ctx
        .server
        .mock("POST", "/auth/v1/signup")
        .expect(0)
        .create_async()
        .await;

    let enc = encrypt_payload(&json!({
        "email": "taken@example.com",
        "password": "hunter22",
        "first_name": "Tess",
        "last_name": "Taken",
    }));
    let response = ctx.post("/auth", &json!({"mode": "signup", "enc": enc}), None).await;

    signup.assert_async().await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(
        response.body["detail"],
        "Email already registered. Please log in instead."
    );
}

#[tokio::test]
async fn test_signup_creates_account_and_profile() {
    let mut ctx = TestContext::new().await;
    let _users = ctx
        .server
        .mock("GET", "/auth/v1/admin/users")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"users":[]}"#)
        .create_async()
        .await;
    let signup = ctx
        .server
        .mock("POST", "/auth/v1/signup")
        .match_body(Matcher::PartialJson(json!({
            "email": "new@example.com",
            "data": {"first_name": "Nia", "last_name": "New"}
        })))
        .with_status(200)
        .with_body(r#"{"id":"u-2","email":"new@example.com"}"#)
        .create_async()
        .await;
    let profile = ctx
        .server
        .mock("POST", "/rest/v1/profiles")
        .match_body(Matcher::PartialJson(json!({
            "id": "u-2",
            "full_name": "Nia New"
        })))
        .with_status(201)
        .create_async()
        .await;

    let response = ctx
        .post(
            "/auth",
            &json!({
                "mode": "signup",
                "email": "New@Example.com",
                "password": "hunter22",
                "first_name": " Nia ",
                "last_name": "New",
            }),
            None,
        )
        .await;

    signup.assert_async().await;
    profile.assert_async().await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["mode"], "signup");
    assert_eq!(response.body["user"], json!({"id": "u-2", "email": "new@example.com"}));
    assert_eq!(response.body["session"], Value::Null);
    assert_eq!(response.body["message"], "Signup initiated");
}

#[tokio::test]
async fn test_signup_requires_names() {
    let mut ctx = TestContext::new().await;
    let _users = ctx
        .server
        .mock("GET", "/auth/v1/admin/users")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let response = ctx
        .post(
            "/auth",
            &json!({"mode": "signup", "email": "a@b.co", "password": "hunter22", "first_name": "A"}),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body["detail"],
        "first_name and last_name are required for signup"
    );
}

#[tokio::test]
async fn test_signup_provider_duplicate_is_conflict() {
    let mut ctx = TestContext::with_config(|config| {
        if let Some(supabase) = config.supabase.as_mut() {
            supabase.service_role_key = None;
        }
    })
    .await;
    let _signup = ctx
        .server
        .mock("POST", "/auth/v1/signup")
        .with_status(422)
        .with_body(r#"{"code":422,"msg":"User already registered"}"#)
        .create_async()
        .await;

    let response = ctx
        .post(
            "/auth",
            &json!({
                "mode": "signup",
                "email": "dupe@example.com",
                "password": "hunter22",
                "first_name": "D",
                "last_name": "Upe",
            }),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
}

// ============================================================================
// Profile
// ============================================================================

#[tokio::test]
async fn test_profile_round_trip() {
    let mut ctx = TestContext::new().await;
    let _user = ctx
        .server
        .mock("GET", "/auth/v1/user")
        .match_header("authorization", "Bearer at-1")
        .with_status(200)
        .with_body(
            r#"{"id":"u-1","email":"jane@example.com","user_metadata":{"first_name":"Jane","last_name":"Doe"}}"#,
        )
        .create_async()
        .await;
    let _profiles = ctx
        .server
        .mock("GET", "/rest/v1/profiles")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let rtk = return_key();
    let response = ctx
        .post("/profile", &json!({"rtk": rtk}), Some("sb_access_token=at-1"))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let profile = open_profile(&rtk, &response.body);
    assert_eq!(
        profile,
        json!({
            "first_name": "Jane",
            "last_name": "Doe",
            "name": "Jane Doe",
            "email": "jane@example.com",
        })
    );
}

#[tokio::test]
async fn test_profile_auth_failures() {
    let mut ctx = TestContext::new().await;

    let response = ctx.post("/profile", &json!({"rtk": return_key()}), None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["detail"], "Not authenticated");

    let _user = ctx
        .server
        .mock("GET", "/auth/v1/user")
        .with_status(401)
        .with_body(r#"{"msg":"invalid JWT"}"#)
        .create_async()
        .await;
    let response = ctx
        .post("/profile", &json!({"rtk": return_key()}), Some("sb_access_token=stale"))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["detail"], "Invalid session");
}

#[tokio::test]
async fn test_profile_without_return_key() {
    let mut ctx = TestContext::new().await;
    let _user = ctx
        .server
        .mock("GET", "/auth/v1/user")
        .with_status(200)
        .with_body(r#"{"id":"u-1","email":"jane@example.com"}"#)
        .create_async()
        .await;
    let _profiles = ctx
        .server
        .mock("GET", "/rest/v1/profiles")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let response = ctx
        .post("/profile", &json!({}), Some("sb_access_token=at-1"))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["detail"], "Encryption unavailable");
}
