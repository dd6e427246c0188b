//! Admin CRUD over the `pdf_assets` manifest.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

use lessonhub_core::{AssetListQuery, NewPdfAsset, PdfAssetId, PdfAssetPatch};

use crate::error::{Result, parse_json_body};
use crate::middleware::RequireAdmin;
use crate::routes::pdfs::{non_blank, parse_int_param};
use crate::state::AppState;

/// Methods served under `/admin/pdfs`.
pub const ALLOWED_METHODS: &str = "GET,POST,PUT,DELETE,OPTIONS";

/// `GET /admin/pdfs` query.
#[derive(Debug, Default, Deserialize)]
pub struct AdminPdfsQuery {
    #[serde(default, alias = "module")]
    pub group: Option<String>,
    #[serde(default)]
    pub lesson: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub offset: Option<String>,
}

/// `GET|HEAD /admin/pdfs`
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<AdminPdfsQuery>,
) -> Result<Json<Value>> {
    let listing = AssetListQuery {
        group: non_blank(query.group),
        lesson: non_blank(query.lesson),
        limit: AssetListQuery::clamp_limit(parse_int_param("limit", query.limit.as_deref())?),
        offset: AssetListQuery::clamp_offset(parse_int_param("offset", query.offset.as_deref())?),
    };
    let items = state.supabase()?.list_pdf_assets(&listing).await?;
    Ok(Json(json!({ "items": items })))
}

/// `POST /admin/pdfs`
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(email): RequireAdmin,
    body: Bytes,
) -> Result<Json<Value>> {
    let asset: NewPdfAsset = parse_json_body(&body)?;
    asset.validate()?;

    let item = state.supabase()?.insert_pdf_asset(&asset).await?;
    tracing::info!(
        admin = %email.masked(),
        group_key = %asset.group_key,
        path = %asset.path,
        "Manifest row created"
    );
    Ok(Json(json!({ "item": item })))
}

/// `PUT /admin/pdfs/{id}`
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(email): RequireAdmin,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>> {
    let patch: PdfAssetPatch = parse_json_body(&body)?;
    patch.validate()?;
    if patch.is_empty() {
        return Ok(Json(json!({ "item": null })));
    }

    let id = PdfAssetId::from_path_segment(&id);
    let item = state.supabase()?.update_pdf_asset(&id, &patch).await?;
    tracing::info!(admin = %email.masked(), %id, "Manifest row updated");
    Ok(Json(json!({ "item": item })))
}

/// `DELETE /admin/pdfs/{id}`
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(email): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = PdfAssetId::from_path_segment(&id);
    let deleted = state.supabase()?.delete_pdf_asset(&id).await?;
    tracing::info!(admin = %email.masked(), %id, deleted, "Manifest row deleted");
    Ok(Json(json!({ "deleted": deleted })))
}

/// `OPTIONS /admin/pdfs[/{id}]`: no auth, 204 with `Allow`.
pub async fn options() -> Response {
    (
        StatusCode::NO_CONTENT,
        [(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS))],
    )
        .into_response()
}
