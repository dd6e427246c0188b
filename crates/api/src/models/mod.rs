//! Domain models for the API.

pub mod profile;
pub mod session;

pub use profile::ProfilePii;
pub use session::{
    ADMIN_SESSION_COOKIE, USER_SESSION_COOKIE, admin_session_cookie, clear_admin_session_cookie,
    user_session_cookie,
};
