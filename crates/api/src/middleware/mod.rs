//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Path rewrite (wraps the router so routing sees the canonical path)
//! 2. Sentry layers (hub per request, HTTP transaction)
//! 3. `TraceLayer` (request span)
//! 4. Request ID (add unique ID to each request)
//! 5. Request log (entry/completion lines with status and latency)
//!
//! The admin guard is an extractor ([`RequireAdmin`]), not a layer.

pub mod admin;
pub mod request_id;
pub mod request_log;
pub mod rewrite;

pub use admin::RequireAdmin;
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
pub use request_log::request_log_middleware;
pub use rewrite::{normalize_route_path, rewrite_request, rewrite_uri};
