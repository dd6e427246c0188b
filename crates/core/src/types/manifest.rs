//! PDF manifest rows (`pdf_assets`) and the score-range predicate.
//!
//! The manifest decides which stored file to serve for a module/lesson and an
//! optional numeric score. A row matches when it is active and either:
//! - no score was supplied and the row is flagged `is_default`, or
//! - the score falls inside `[score_min, score_max]`, where a null bound is open.

use serde::{Deserialize, Serialize};

use super::id::PdfAssetId;

/// Errors raised when validating manifest writes.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PdfAssetError {
    /// A required text field is missing or blank.
    #[error("{0} is required")]
    MissingField(&'static str),
    /// `score_min` is greater than `score_max`.
    #[error("score_min ({min}) must not exceed score_max ({max})")]
    InvertedScoreRange {
        /// Lower bound supplied.
        min: i64,
        /// Upper bound supplied.
        max: i64,
    },
}

/// Inclusive score range with optional (open) bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreRange {
    /// Lower bound; `None` means unbounded below.
    pub min: Option<i64>,
    /// Upper bound; `None` means unbounded above.
    pub max: Option<i64>,
}

impl ScoreRange {
    /// Create a range from nullable bounds.
    #[must_use]
    pub const fn new(min: Option<i64>, max: Option<i64>) -> Self {
        Self { min, max }
    }

    /// Whether `score` lies within the range.
    #[must_use]
    pub const fn contains(&self, score: i64) -> bool {
        let above_min = match self.min {
            Some(min) => min <= score,
            None => true,
        };
        let below_max = match self.max {
            Some(max) => score <= max,
            None => true,
        };
        above_min && below_max
    }

    fn validate(self) -> Result<(), PdfAssetError> {
        match (self.min, self.max) {
            (Some(min), Some(max)) if min > max => {
                Err(PdfAssetError::InvertedScoreRange { min, max })
            }
            _ => Ok(()),
        }
    }
}

/// A `pdf_assets` row as returned by PostgREST.
///
/// Nullable columns stay `Option` so rows with partial data still decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfAsset {
    /// Primary key.
    #[serde(default)]
    pub id: Option<PdfAssetId>,
    /// Module / group key the row belongs to.
    #[serde(default, alias = "module")]
    pub group_key: Option<String>,
    /// Optional lesson within the module.
    #[serde(default)]
    pub lesson: Option<String>,
    /// Storage bucket.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Object path inside the bucket.
    #[serde(default)]
    pub path: Option<String>,
    /// Human-readable label.
    #[serde(default)]
    pub label: Option<String>,
    /// Sort position within the module.
    #[serde(default)]
    pub order_index: Option<i64>,
    /// Served when no score is supplied.
    #[serde(default)]
    pub is_default: Option<bool>,
    /// Lower score bound (inclusive).
    #[serde(default)]
    pub score_min: Option<i64>,
    /// Upper score bound (inclusive).
    #[serde(default)]
    pub score_max: Option<i64>,
    /// Inactive rows are never served.
    #[serde(default)]
    pub active: Option<bool>,
    /// Row creation timestamp, as PostgREST renders it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update timestamp, as PostgREST renders it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl PdfAsset {
    /// The row's score range.
    #[must_use]
    pub const fn score_range(&self) -> ScoreRange {
        ScoreRange::new(self.score_min, self.score_max)
    }

    /// Null `active` counts as inactive, matching the `active=eq.true` filter.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(false)
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.is_default.unwrap_or(false)
    }

    #[must_use]
    pub fn order_index(&self) -> i64 {
        self.order_index.unwrap_or(0)
    }

    /// Label to show, falling back to the object path.
    #[must_use]
    pub fn display_label(&self) -> Option<&str> {
        self.label
            .as_deref()
            .filter(|label| !label.trim().is_empty())
            .or(self.path.as_deref())
    }

    /// Whether the row should be served for `score`.
    ///
    /// ```
    /// use lessonhub_core::PdfAsset;
    ///
    /// let row: PdfAsset = serde_json::from_value(serde_json::json!({
    ///     "bucket": "pdfs", "path": "m1/low.pdf",
    ///     "score_min": null, "score_max": 50, "active": true
    /// })).unwrap();
    ///
    /// assert!(row.matches(Some(0)));
    /// assert!(row.matches(Some(50)));
    /// assert!(!row.matches(Some(51)));
    /// ```
    #[must_use]
    pub fn matches(&self, score: Option<i64>) -> bool {
        if !self.is_active() {
            return false;
        }
        match score {
            None => self.is_default(),
            Some(score) => self.score_range().contains(score),
        }
    }
}

/// Parameters for the public manifest listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestQuery {
    /// Module / group key (required).
    pub module: String,
    /// Optional lesson filter.
    pub lesson: Option<String>,
    /// Optional score; `None` selects default rows.
    pub score: Option<i64>,
    /// Maximum rows returned.
    pub limit: u32,
}

impl ManifestQuery {
    /// Default page size for the public listing.
    pub const DEFAULT_LIMIT: u32 = 10;
    /// Largest page size the public listing accepts.
    pub const MAX_LIMIT: u32 = 100;

    /// Clamp a requested limit into `1..=MAX_LIMIT`, defaulting when absent.
    #[must_use]
    pub fn clamp_limit(requested: Option<i64>) -> u32 {
        requested.map_or(Self::DEFAULT_LIMIT, |limit| {
            u32::try_from(limit.clamp(1, i64::from(Self::MAX_LIMIT)))
                .unwrap_or(Self::DEFAULT_LIMIT)
        })
    }
}

/// Parameters for the admin manifest listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetListQuery {
    /// Optional module / group key filter.
    pub group: Option<String>,
    /// Optional lesson filter.
    pub lesson: Option<String>,
    /// Maximum rows returned.
    pub limit: u32,
    /// Rows to skip.
    pub offset: u32,
}

impl AssetListQuery {
    /// Default page size for the admin listing.
    pub const DEFAULT_LIMIT: u32 = 50;
    /// Largest page size the admin listing accepts.
    pub const MAX_LIMIT: u32 = 200;

    /// Clamp a requested limit into `1..=MAX_LIMIT`, defaulting when absent.
    #[must_use]
    pub fn clamp_limit(requested: Option<i64>) -> u32 {
        requested.map_or(Self::DEFAULT_LIMIT, |limit| {
            u32::try_from(limit.clamp(1, i64::from(Self::MAX_LIMIT)))
                .unwrap_or(Self::DEFAULT_LIMIT)
        })
    }

    /// Negative offsets count as zero.
    #[must_use]
    pub fn clamp_offset(requested: Option<i64>) -> u32 {
        requested
            .map_or(0, |offset| u32::try_from(offset.max(0)).unwrap_or(u32::MAX))
    }
}

/// Body of an admin create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPdfAsset {
    #[serde(alias = "module")]
    pub group_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson: Option<String>,
    pub bucket: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_max: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl NewPdfAsset {
    /// Check required fields and the score range.
    ///
    /// # Errors
    ///
    /// Returns [`PdfAssetError`] for blank `group_key`/`bucket`/`path` or an
    /// inverted score range.
    pub fn validate(&self) -> Result<(), PdfAssetError> {
        for (field, value) in [
            ("group_key", &self.group_key),
            ("bucket", &self.bucket),
            ("path", &self.path),
        ] {
            if value.trim().is_empty() {
                return Err(PdfAssetError::MissingField(field));
            }
        }
        ScoreRange::new(self.score_min, self.score_max).validate()
    }
}

/// Body of an admin update request. Null or absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfAssetPatch {
    #[serde(default, alias = "module", skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_max: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl PdfAssetPatch {
    /// True when the patch would not change any column.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.group_key.is_none()
            && self.lesson.is_none()
            && self.bucket.is_none()
            && self.path.is_none()
            && self.label.is_none()
            && self.order_index.is_none()
            && self.is_default.is_none()
            && self.score_min.is_none()
            && self.score_max.is_none()
            && self.active.is_none()
    }

    /// Reject an inverted range when both bounds are being set.
    ///
    /// # Errors
    ///
    /// Returns [`PdfAssetError::InvertedScoreRange`].
    pub fn validate(&self) -> Result<(), PdfAssetError> {
        ScoreRange::new(self.score_min, self.score_max).validate()
    }
}
