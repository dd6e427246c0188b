//! Path rewriting for serverless platform quirks.
//!
//! Deployments behind a rewrite rule receive every request on a single
//! function path, with the original path either kept under an `/api` or
//! `/index` prefix or passed as a `?path=` query parameter. This layer maps
//! all of those onto the canonical routes before the router sees them.

use axum::{
    extract::Request,
    http::{Uri, uri::PathAndQuery},
};

/// Strip slashes and the `api` / `index` / `index.py` prefixes.
///
/// ```
/// use lessonhub_api::middleware::normalize_route_path;
///
/// assert_eq!(normalize_route_path("/api/index.py/admin/login/"), "admin/login");
/// assert_eq!(normalize_route_path("api"), "");
/// ```
#[must_use]
pub fn normalize_route_path(raw: &str) -> String {
    let mut segments: Vec<&str> = raw
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.first() == Some(&"api") {
        segments.remove(0);
    }
    if matches!(segments.first(), Some(&"index" | &"index.py")) {
        segments.remove(0);
    }
    segments.join("/")
}

/// The `path` query parameter, if present and non-empty.
fn path_override(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "path")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.trim().is_empty())
}

/// Compute the canonical URI for a request URI.
///
/// `?path=` is only honoured on the function entry path (`/`, `/api`,
/// `/api/index[.py]`); on any other path it is an ordinary query parameter.
#[must_use]
pub fn rewrite_uri(uri: &Uri) -> Option<Uri> {
    let query = uri.query().unwrap_or_default();
    let on_entry_path = normalize_route_path(uri.path()).is_empty();

    let (raw_path, mut query) = match path_override(query).filter(|_| on_entry_path) {
        Some(target) => match target.split_once('?') {
            Some((path, extra)) if query.is_empty() => (path.to_string(), extra.to_string()),
            Some((path, extra)) => (path.to_string(), format!("{query}&{extra}")),
            None => (target, query.to_string()),
        },
        None => (uri.path().to_string(), query.to_string()),
    };
    if query.ends_with('&') {
        query.pop();
    }

    let path = format!("/{}", normalize_route_path(&raw_path));
    let path_and_query = if query.is_empty() {
        path
    } else {
        format!("{path}?{query}")
    };
    if uri.path_and_query().map(PathAndQuery::as_str) == Some(path_and_query.as_str()) {
        return None;
    }

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse().ok()?);
    Uri::from_parts(parts).ok()
}

/// Rewrite the request URI in place.
pub fn rewrite_request(mut request: Request) -> Request {
    if let Some(uri) = rewrite_uri(request.uri()) {
        tracing::debug!(from = %request.uri(), to = %uri, "Rewrote request path");
        *request.uri_mut() = uri;
    }
    request
}
