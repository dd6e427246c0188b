//! Identifiers for manifest rows.
//!
//! `pdf_assets.id` is a bigint in some deployments and a uuid in others, so
//! the id keeps whichever JSON representation PostgREST returned.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Primary key of a `pdf_assets` row.
///
/// # Example
///
/// ```rust
/// # use lessonhub_core::PdfAssetId;
/// let numeric: PdfAssetId = serde_json::from_str("42").unwrap();
/// let textual: PdfAssetId = serde_json::from_str("\"7f0c\"").unwrap();
///
/// assert_eq!(numeric.to_string(), "42");
/// assert_eq!(textual.to_string(), "7f0c");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PdfAssetId {
    /// Integer key (`bigint` / `serial`).
    Int(i64),
    /// Text key (`uuid` / `text`).
    Text(String),
}

impl PdfAssetId {
    /// Build an id from a path segment, preferring the integer form.
    #[must_use]
    pub fn from_path_segment(segment: &str) -> Self {
        segment
            .parse::<i64>()
            .map_or_else(|_| Self::Text(segment.to_owned()), Self::Int)
    }
}

impl fmt::Display for PdfAssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for PdfAssetId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<String> for PdfAssetId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}
