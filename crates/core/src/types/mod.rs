//! Core types for LessonHub.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod admin;
pub mod auth;
pub mod email;
pub mod id;
pub mod manifest;

pub use admin::{AdminRecord, RESET_FLAGS, RESET_TIMESTAMP_FIELDS, as_bool};
pub use auth::{AuthMode, AuthModeError};
pub use email::{Email, EmailError, mask_email, normalize_email};
pub use id::PdfAssetId;
pub use manifest::{
    AssetListQuery, ManifestQuery, NewPdfAsset, PdfAsset, PdfAssetError, PdfAssetPatch, ScoreRange,
};
