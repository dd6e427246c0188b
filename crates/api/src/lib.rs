//! LessonHub API library.
//!
//! Route handlers, middleware, the Supabase adapter and the crypto helpers
//! behind the `lessonhub-api` binary, exposed as a library so the
//! integration tests and the CLI can drive them directly.
//!
//! # Modules
//!
//! - [`config`] - Environment configuration
//! - [`crypto`] - RSA auth payloads and AES-GCM profile envelopes
//! - [`routes`] - Route table and handlers
//! - [`services`] - Admin authentication
//! - [`supabase`] - Auth, PostgREST and Storage client

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod crypto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod supabase;
