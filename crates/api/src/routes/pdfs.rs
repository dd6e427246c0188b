//! Public manifest listing.

use axum::{
    Json,
    extract::{Query, State},
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use lessonhub_core::{ManifestQuery, PdfAsset, PdfAssetId};

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::supabase::SupabaseClient;

/// `GET /pdfs` query. Numbers arrive as strings so bad input maps to a JSON 400.
#[derive(Debug, Default, Deserialize)]
pub struct PdfsQuery {
    #[serde(default, alias = "group")]
    pub module: Option<String>,
    #[serde(default)]
    pub lesson: Option<String>,
    #[serde(default)]
    pub score: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

/// One listed PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfItem {
    pub id: Option<PdfAssetId>,
    pub label: Option<String>,
    pub bucket: String,
    pub path: String,
    pub signed_url: String,
    pub order_index: i64,
    pub is_default: bool,
    pub score_min: Option<i64>,
    pub score_max: Option<i64>,
}

/// Parse an optional integer query parameter; blank counts as absent.
pub(crate) fn parse_int_param(name: &str, value: Option<&str>) -> Result<Option<i64>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{name} must be an integer"))),
    }
}

/// Blank strings count as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `GET /pdfs?module=&lesson=&score=&limit=`
pub async fn list_pdfs(
    State(state): State<AppState>,
    Query(query): Query<PdfsQuery>,
) -> Result<Json<Value>> {
    let module = non_blank(query.module)
        .ok_or_else(|| AppError::BadRequest("module is required".to_string()))?;
    let manifest = ManifestQuery {
        module,
        lesson: non_blank(query.lesson),
        score: parse_int_param("score", query.score.as_deref())?,
        limit: ManifestQuery::clamp_limit(parse_int_param("limit", query.limit.as_deref())?),
    };

    // Listing is best effort: provider trouble yields an empty list, not a 500.
    let supabase = match state.supabase() {
        Ok(supabase) => supabase,
        Err(e) => {
            tracing::warn!(error = %e, module = %manifest.module, "Manifest unavailable");
            return Ok(Json(json!({ "items": [] })));
        }
    };
    let rows = match supabase.query_manifest(&manifest).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(error = %e, module = %manifest.module, "Manifest query failed");
            return Ok(Json(json!({ "items": [] })));
        }
    };

    let web = &state.config().web;
    let items = sign_rows(supabase, rows, &web.pdf_bucket, web.signed_url_ttl).await;
    tracing::info!(
        module = %manifest.module,
        score = ?manifest.score,
        count = items.len(),
        "Manifest listed"
    );
    Ok(Json(json!({ "items": items })))
}

/// Attach signed URLs; rows that cannot be signed are dropped.
async fn sign_rows(
    supabase: &SupabaseClient,
    rows: Vec<PdfAsset>,
    default_bucket: &str,
    ttl: u64,
) -> Vec<PdfItem> {
    let signed = join_all(rows.into_iter().map(|row| async move {
        let path = row.path.clone().filter(|p| !p.is_empty())?;
        let bucket = row
            .bucket
            .clone()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| default_bucket.to_string());
        let signed_url = match supabase.create_signed_url(&bucket, &path, ttl).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, %bucket, %path, "Skipping PDF without signed URL");
                return None;
            }
        };
        Some(PdfItem {
            id: row.id.clone(),
            label: row.display_label().map(ToString::to_string),
            order_index: row.order_index(),
            is_default: row.is_default(),
            score_min: row.score_min,
            score_max: row.score_max,
            bucket,
            path,
            signed_url,
        })
    }))
    .await;
    signed.into_iter().flatten().collect()
}
