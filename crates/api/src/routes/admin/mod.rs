//! Admin route handlers. Everything except login and password rotation
//! requires [`RequireAdmin`](crate::middleware::RequireAdmin).

pub mod pdfs;
pub mod session;
pub mod upload;
