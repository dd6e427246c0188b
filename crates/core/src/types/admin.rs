//! Admin user records from the `admin_users` table.
//!
//! The table's columns vary between deployments (legacy plaintext columns,
//! assorted reset flags), so the record keeps the raw JSON object and reads
//! the columns it knows about.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Boolean columns that force a password rotation when truthy.
pub const RESET_FLAGS: [&str; 5] = [
    "force_password_change",
    "must_reset_password",
    "password_reset_required",
    "needs_password_reset",
    "requires_password_update",
];

/// Timestamp columns that force a rotation when present but empty.
pub const RESET_TIMESTAMP_FIELDS: [&str; 2] = ["password_updated_at", "password_last_updated"];

/// Credential columns, in lookup order.
const CREDENTIAL_FIELDS: [&str; 3] = ["password_hash", "password", "password_temp"];

/// Loose truthiness for columns that may be stored as bool, number or text.
///
/// `true`, any non-zero number, and the strings `true`/`1`/`yes`/`y`
/// (case-insensitive) are truthy; everything else, including null, is not.
#[must_use]
pub fn as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => matches!(
            text.trim().to_lowercase().as_str(),
            "true" | "1" | "yes" | "y"
        ),
        _ => false,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

/// A row from `admin_users`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdminRecord {
    fields: Map<String, Value>,
}

impl AdminRecord {
    /// Wrap a raw JSON object.
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Raw column access.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    /// The `email` column as stored.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.fields.get("email").and_then(Value::as_str)
    }

    /// Whether the admin may sign in.
    ///
    /// Deployments without an `active` column treat every listed admin as
    /// active; when the column exists it must be truthy.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.fields.get("active").is_none_or(as_bool)
    }

    /// The stored credential: `password_hash`, falling back to the legacy
    /// `password` and `password_temp` columns.
    #[must_use]
    pub fn stored_credential(&self) -> Option<&str> {
        CREDENTIAL_FIELDS.iter().find_map(|column| {
            self.fields
                .get(*column)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
        })
    }

    /// Whether the admin must rotate their password before getting a session.
    ///
    /// True if any reset flag is truthy, any reset timestamp column is
    /// present but empty, or the credential is not a password hash.
    #[must_use]
    pub fn requires_password_change(&self, password_is_hashed: bool) -> bool {
        let flagged = RESET_FLAGS
            .iter()
            .any(|flag| self.fields.get(*flag).is_some_and(as_bool));
        let never_rotated = RESET_TIMESTAMP_FIELDS
            .iter()
            .any(|column| self.fields.get(*column).is_some_and(is_blank));
        flagged || never_rotated || !password_is_hashed
    }

    /// Column updates that store `new_hash` and clear every reset marker the
    /// row actually has.
    #[must_use]
    pub fn password_update(&self, new_hash: &str, now: DateTime<Utc>) -> Map<String, Value> {
        let mut update = Map::new();
        update.insert("password_hash".to_owned(), Value::String(new_hash.to_owned()));
        for flag in RESET_FLAGS {
            if self.fields.contains_key(flag) {
                update.insert(flag.to_owned(), Value::Bool(false));
            }
        }
        let stamp = now.to_rfc3339_opts(SecondsFormat::Micros, true);
        for column in RESET_TIMESTAMP_FIELDS {
            if self.fields.contains_key(column) {
                update.insert(column.to_owned(), Value::String(stamp.clone()));
            }
        }
        for legacy in ["password", "password_temp"] {
            if self.fields.contains_key(legacy) {
                update.insert(legacy.to_owned(), Value::Null);
            }
        }
        update
    }
}

impl From<Map<String, Value>> for AdminRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}
