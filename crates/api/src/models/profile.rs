//! Profile data returned to the client (always encrypted).

use serde::{Deserialize, Serialize};

use crate::supabase::{AuthUser, ProfileRow};

/// Personally identifying profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePii {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl ProfilePii {
    /// Merge the `profiles` row (preferred) with the auth user's metadata.
    ///
    /// `name` is the profile's full name, then metadata `name`, then
    /// `"first last"`.
    #[must_use]
    pub fn resolve(profile: Option<&ProfileRow>, user: &AuthUser) -> Self {
        let pick = |from_profile: Option<&String>, key: &str| {
            from_profile
                .map(String::as_str)
                .filter(|value| !value.trim().is_empty())
                .or_else(|| user.metadata_str(key))
                .map(ToString::to_string)
        };

        let first_name = pick(profile.and_then(|p| p.first_name.as_ref()), "first_name");
        let last_name = pick(profile.and_then(|p| p.last_name.as_ref()), "last_name");
        let name = profile
            .and_then(ProfileRow::display_name)
            .or_else(|| user.metadata_str("name"))
            .map(ToString::to_string)
            .or_else(|| {
                let joined = format!(
                    "{} {}",
                    first_name.as_deref().unwrap_or_default(),
                    last_name.as_deref().unwrap_or_default()
                );
                let joined = joined.trim();
                (!joined.is_empty()).then(|| joined.to_string())
            });
        let email = user
            .email
            .clone()
            .or_else(|| profile.and_then(|p| p.email.clone()));

        Self {
            first_name,
            last_name,
            name,
            email,
        }
    }
}
