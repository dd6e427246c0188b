//! Auth request mode.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned for anything other than `login` or `signup`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid mode. Use 'login' or 'signup'.")]
pub struct AuthModeError;

/// Which flow an `/auth` request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Password sign-in against the auth provider.
    Login,
    /// New account registration.
    Signup,
}

impl AuthMode {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Signup => "signup",
        }
    }
}

impl FromStr for AuthMode {
    type Err = AuthModeError;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "login" => Ok(Self::Login),
            "signup" => Ok(Self::Signup),
            _ => Err(AuthModeError),
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(" LOGIN ".parse::<AuthMode>(), Ok(AuthMode::Login));
        assert_eq!("SignUp".parse::<AuthMode>(), Ok(AuthMode::Signup));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!("register".parse::<AuthMode>(), Err(AuthModeError));
        assert_eq!("".parse::<AuthMode>(), Err(AuthModeError));
    }

    #[test]
    fn test_display() {
        assert_eq!(AuthMode::Signup.to_string(), "signup");
    }
}
