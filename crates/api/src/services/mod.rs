//! Business logic services.
//!
//! # Services
//!
//! - `admin_auth` - Admin login, password rotation and session guard
//!   (bcrypt + HMAC tokens over the `admin_users` table)

pub mod admin_auth;
