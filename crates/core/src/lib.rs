//! LessonHub Core - Shared domain types.
//!
//! This crate provides the types used across the LessonHub components:
//! - `api` - HTTP backend proxying auth, profiles and the PDF manifest to Supabase
//! - `cli` - Operator tools (password hashes, payload keypairs)
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no crypto. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Normalized emails, auth modes, manifest rows, admin records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
