//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Liveness message
//! GET  /health                 - Plain "ok"
//! GET  /ping                   - {"ok": true}
//! GET  /env-check              - Which settings are present (never values)
//!
//! # Auth
//! POST /                       - Same as POST /auth
//! POST /auth                   - Login or signup (mode = login | signup)
//! POST /profile                - Encrypted profile for the session cookie
//!
//! # Manifest
//! GET  /pdfs                   - Signed PDF links for a module / lesson / score
//!
//! # Admin
//! POST /admin/login            - Admin login (may demand a password reset)
//! POST /admin/password         - Rotate password with reset token or current password
//! POST /admin/logout           - Clear the admin session (requires admin)
//! GET  /admin/me               - Current admin (requires admin)
//! GET  /admin/pdfs             - List manifest rows (requires admin)
//! POST /admin/pdfs             - Create manifest row (requires admin)
//! PUT  /admin/pdfs/{id}        - Update manifest row (requires admin)
//! DELETE /admin/pdfs/{id}      - Delete manifest row (requires admin)
//! OPTIONS /admin/pdfs[/{id}]   - 204 with Allow header
//! POST /admin/upload           - Multipart upload to storage (requires admin)
//! POST /admin/upload-url       - Signed upload URL (requires admin)
//!
//! # Anything else
//! POST                         - Treated as POST /auth
//! GET                          - {"route", "message"}
//! ```
//!
//! The router is wrapped in [`rewrite_request`](crate::middleware::rewrite_request),
//! so `/api/...`, `/api/index.py/...` and `?path=` requests reach the
//! routes above.

pub mod admin;
pub mod auth;
pub mod health;
pub mod pdfs;
pub mod profile;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Request, State},
    http::{Method, Uri},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use axum_extra::extract::CookieJar;
use serde_json::json;
use tower::Layer;
use tower::util::{MapRequest, MapRequestLayer};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::error::{AppError, Result, parse_json_body};
use crate::middleware::{
    normalize_route_path, request_id_middleware, request_log_middleware, rewrite_request,
};
use crate::state::AppState;

/// The router with path rewriting in front of it.
pub type App = MapRequest<Router, fn(Request) -> Request>;

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(admin::session::login))
        .route("/password", post(admin::session::change_password))
        .route("/logout", post(admin::session::logout))
        .route("/me", get(admin::session::me))
        .route(
            "/pdfs",
            get(admin::pdfs::list)
                .post(admin::pdfs::create)
                .options(admin::pdfs::options),
        )
        .route(
            "/pdfs/{id}",
            put(admin::pdfs::update)
                .delete(admin::pdfs::delete)
                .options(admin::pdfs::options),
        )
        .route(
            "/upload",
            post(admin::upload::upload)
                .layer(DefaultBodyLimit::max(admin::upload::MAX_UPLOAD_BYTES)),
        )
        .route("/upload-url", post(admin::upload::upload_url))
}

/// Create all routes for the API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health::root).post(auth::auth))
        .route("/health", get(health::health))
        .route("/ping", get(health::ping))
        .route("/env-check", get(health::env_check))
        .route("/auth", post(auth::auth))
        .route("/profile", post(profile::profile))
        .route("/pdfs", get(pdfs::list_pdfs))
        .nest("/admin", admin_routes())
        .fallback(fallback)
        .method_not_allowed_fallback(method_not_allowed)
}

/// Build the full application: routes, middleware and path rewriting.
pub fn app(state: AppState) -> App {
    let router = routes()
        .layer(axum_middleware::from_fn(request_log_middleware))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    MapRequestLayer::new(rewrite_request as fn(Request) -> Request).layer(router)
}

/// Catch-all for paths no route claims.
async fn fallback(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    jar: CookieJar,
    body: Bytes,
) -> Result<Response> {
    let route = normalize_route_path(uri.path());
    if route == "admin" || route.starts_with("admin/") {
        return Err(AppError::NotFound("Not found".to_string()));
    }

    match method {
        Method::POST => {
            let request = parse_json_body(&body)?;
            Ok(auth::handle_auth(&state, jar, request)
                .await?
                .into_response())
        }
        Method::GET | Method::HEAD => Ok(Json(json!({
            "route": format!("/{route}"),
            "message": health::ALIVE_MESSAGE,
        }))
        .into_response()),
        _ => Err(AppError::MethodNotAllowed),
    }
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{StatusCode, header};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::ApiConfig;
    use crate::crypto::AuthKeyring;

    fn test_app() -> App {
        let state = AppState::with_keyring(ApiConfig::default(), AuthKeyring::default()).unwrap();
        app(state)
    }

    async fn send(method: Method, uri: &str, body: Body) -> (StatusCode, Value) {
        let response = test_app()
            .oneshot(
                axum::http::Request::builder()
                    .method(method)
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_root_and_liveness() {
        let (status, body) = send(Method::GET, "/", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], health::ALIVE_MESSAGE);

        let (status, body) = send(Method::GET, "/api/ping", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_catch_all_get_echoes_route() {
        let (status, body) = send(Method::GET, "/api/index.py/some/page", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["route"], "/some/page");
        assert_eq!(body["message"], health::ALIVE_MESSAGE);
    }

    #[tokio::test]
    async fn test_path_query_reaches_route() {
        let (status, body) = send(Method::GET, "/api?path=/ping", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_unknown_admin_path_is_404() {
        let (status, body) = send(Method::GET, "/admin/nope", Body::empty()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Not found");
    }

    #[tokio::test]
    async fn test_catch_all_post_is_auth() {
        let (status, body) = send(Method::POST, "/anything", Body::from("not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Invalid JSON body");

        let (status, body) = send(
            Method::POST,
            "/anything",
            Body::from(r#"{"mode":"teleport","email":"a@b.c","password":"x"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Invalid mode. Use 'login' or 'signup'.");
    }

    #[tokio::test]
    async fn test_other_methods_are_405() {
        let (status, body) = send(Method::PATCH, "/whatever", Body::empty()).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["detail"], "Method not allowed");

        let (status, _) = send(Method::DELETE, "/pdfs", Body::empty()).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_admin_pdfs_options() {
        let response = test_app()
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/admin/pdfs/12")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()[header::ALLOW],
            admin::pdfs::ALLOWED_METHODS
        );
    }

    #[tokio::test]
    async fn test_admin_routes_require_session() {
        let (status, body) = send(Method::GET, "/admin/me", Body::empty()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Not authenticated");
    }

    #[tokio::test]
    async fn test_pdfs_requires_module() {
        let (status, body) = send(Method::GET, "/pdfs?lesson=1", Body::empty()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "module is required");
    }

    #[tokio::test]
    async fn test_request_id_header_is_set() {
        let response = test_app()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }
}
