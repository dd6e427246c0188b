//! Storage uploads for manifest PDFs.

use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, State, multipart::MultipartRejection},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{AppError, Result, parse_json_body};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Largest accepted multipart upload.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// `POST /admin/upload-url` body.
#[derive(Debug, Default, Deserialize)]
pub struct UploadUrlRequest {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// Normalize an object path: no leading slash, no empty or `..` segments.
fn clean_object_path(raw: &str) -> Result<String> {
    let segments: Vec<&str> = raw
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    if segments.is_empty() {
        return Err(AppError::BadRequest("path is required".to_string()));
    }
    if segments.contains(&"..") {
        return Err(AppError::BadRequest("Invalid path".to_string()));
    }
    Ok(segments.join("/"))
}

fn pick_bucket(requested: Option<String>, default_bucket: &str) -> String {
    requested
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| default_bucket.to_string())
}

/// `POST /admin/upload`: multipart `file` (required), `bucket`, `path`.
pub async fn upload(
    State(state): State<AppState>,
    RequireAdmin(email): RequireAdmin,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "Multipart rejected");
        AppError::BadRequest("Expected multipart/form-data".to_string())
    })?;

    let mut file: Option<(Bytes, Option<String>, String)> = None;
    let mut bucket = None;
    let mut path = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().map(ToString::to_string);
                let content_type = field
                    .content_type()
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                file = Some((data, file_name, content_type));
            }
            Some("bucket") => bucket = Some(field.text().await.map_err(multipart_error)?),
            Some("path") => path = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }

    let (data, file_name, content_type) =
        file.ok_or_else(|| AppError::BadRequest("file is required".to_string()))?;
    let web = &state.config().web;
    let bucket = pick_bucket(bucket, &web.pdf_bucket);
    let path = clean_object_path(
        path.filter(|p| !p.trim().is_empty())
            .or(file_name)
            .as_deref()
            .unwrap_or_default(),
    )?;

    let supabase = state.supabase()?;
    let size = data.len();
    supabase
        .upload_object(&bucket, &path, data, &content_type)
        .await?;
    tracing::info!(admin = %email.masked(), %bucket, %path, size, "Object uploaded");

    let signed_url = match supabase
        .create_signed_url(&bucket, &path, web.signed_url_ttl)
        .await
    {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(error = %e, "Uploaded object could not be signed");
            None
        }
    };

    let public_url = supabase.public_url(&bucket, &path)?;

    Ok(Json(json!({
        "bucket": bucket,
        "path": path,
        "signed_url": signed_url,
        "public_url": public_url,
    })))
}

/// `POST /admin/upload-url`: signed URL for a direct browser upload.
pub async fn upload_url(
    State(state): State<AppState>,
    RequireAdmin(email): RequireAdmin,
    body: Bytes,
) -> Result<Json<Value>> {
    let request: UploadUrlRequest = parse_json_body(&body)?;
    let bucket = pick_bucket(request.bucket, &state.config().web.pdf_bucket);
    let path = clean_object_path(request.path.as_deref().unwrap_or_default())?;

    let upload = state
        .supabase()?
        .create_signed_upload_url(&bucket, &path)
        .await?;
    tracing::info!(admin = %email.masked(), %bucket, %path, "Signed upload URL issued");

    Ok(Json(json!({
        "bucket": bucket,
        "path": upload.path,
        "signed_url": upload.signed_url,
        "token": upload.token,
    })))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    tracing::debug!(error = %e, "Multipart read failed");
    AppError::BadRequest("Invalid multipart body".to_string())
}
