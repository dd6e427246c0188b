//! PostgREST tables (`/rest/v1`): `profiles`, `admin_users`, `pdf_assets`.

use reqwest::Method;
use serde_json::{Map, Value};
use tracing::instrument;

use lessonhub_core::{
    AdminRecord, AssetListQuery, ManifestQuery, NewPdfAsset, PdfAsset, PdfAssetId, PdfAssetPatch,
    mask_email, normalize_email,
};

use super::{KeyRole, ProfileRow, SupabaseClient, SupabaseError, check, send_json};

const PROFILES: &str = "profiles";
const ADMIN_USERS: &str = "admin_users";
const PDF_ASSETS: &str = "pdf_assets";

/// Column sets tried in order; projects differ in which name columns exist.
const PROFILE_COLUMN_SETS: [&str; 3] = [
    "id,first_name,last_name,full_name",
    "id,full_name",
    "id,name",
];

const MANIFEST_ORDER: &str = "order_index.asc,lesson.asc,path.asc";
const ADMIN_LISTING_ORDER: &str = "group_key.asc,order_index.asc";

type Query = Vec<(&'static str, String)>;

impl SupabaseClient {
    fn table_request(
        &self,
        method: Method,
        table: &str,
    ) -> Result<reqwest::RequestBuilder, SupabaseError> {
        self.request(method, &format!("/rest/v1/{table}"), KeyRole::Data)
    }

    async fn select<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, SupabaseError> {
        let request = self.table_request(Method::GET, table)?.query(query);
        send_json(request).await
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    /// Best-effort profile lookup by id, then by email.
    ///
    /// Errors (missing columns, RLS, network) are logged and skipped.
    #[instrument(skip(self, email), fields(by_email = email.is_some()))]
    pub async fn fetch_profile(&self, user_id: Option<&str>, email: Option<&str>) -> Option<ProfileRow> {
        let mut filters: Vec<(&'static str, String)> = Vec::new();
        if let Some(id) = user_id.filter(|id| !id.is_empty()) {
            filters.push(("id", format!("eq.{id}")));
        }
        if let Some(email) = email.filter(|email| !email.is_empty()) {
            filters.push(("email", format!("eq.{}", normalize_email(email))));
        }

        for columns in PROFILE_COLUMN_SETS {
            for (column, filter) in &filters {
                let query = vec![
                    ("select", columns.to_string()),
                    (*column, filter.clone()),
                    ("limit", "1".to_string()),
                ];
                match self.select::<ProfileRow>(PROFILES, &query).await {
                    Ok(rows) => {
                        if let Some(row) = rows.into_iter().next() {
                            return Some(row);
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, columns, column, "Profile lookup attempt failed");
                    }
                }
            }
        }
        None
    }

    /// Insert or merge a profile row.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError` if the write is rejected.
    #[instrument(skip(self, row), fields(id = ?row.id))]
    pub async fn upsert_profile(&self, row: &ProfileRow) -> Result<(), SupabaseError> {
        let request = self
            .table_request(Method::POST, PROFILES)?
            .header("Prefer", "resolution=merge-duplicates")
            .json(row);
        check(request.send().await?).await?;
        Ok(())
    }

    // =========================================================================
    // Admin users
    // =========================================================================

    /// Look up an `admin_users` row.
    ///
    /// Tries the email exactly as given, then lowercased, then a
    /// case-insensitive match; the match must normalize to the same address.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError` if every attempt failed at the transport or
    /// API level.
    #[instrument(skip(self), fields(email = %mask_email(email)))]
    pub async fn fetch_admin_user(&self, email: &str) -> Result<Option<AdminRecord>, SupabaseError> {
        let raw = email.trim();
        let wanted = normalize_email(raw);

        let mut filters = vec![format!("eq.{raw}")];
        if raw != wanted {
            filters.push(format!("eq.{wanted}"));
        }
        if !wanted.contains('*') {
            filters.push(format!("ilike.{}", escape_like(&wanted)));
        }

        let mut last_error = None;
        for filter in filters {
            let query = vec![
                ("select", "*".to_string()),
                ("email", filter),
                ("limit", "1".to_string()),
            ];
            match self.select::<Map<String, Value>>(ADMIN_USERS, &query).await {
                Ok(rows) => {
                    let found = rows.into_iter().map(AdminRecord::new).find(|record| {
                        record.email().is_some_and(|stored| normalize_email(stored) == wanted)
                    });
                    if found.is_some() {
                        return Ok(found);
                    }
                    last_error = None;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Admin lookup attempt failed");
                    last_error = Some(e);
                }
            }
        }
        last_error.map_or(Ok(None), Err)
    }

    /// Apply column updates to the admin row with this exact stored email.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError` if the update is rejected.
    #[instrument(skip(self, fields), fields(email = %mask_email(email)))]
    pub async fn update_admin_user(
        &self,
        email: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), SupabaseError> {
        let request = self
            .table_request(Method::PATCH, ADMIN_USERS)?
            .query(&[("email", format!("eq.{email}"))])
            .json(fields);
        check(request.send().await?).await?;
        Ok(())
    }

    // =========================================================================
    // PDF manifest
    // =========================================================================

    /// Active manifest rows for a module, filtered by score.
    ///
    /// The score filter runs in PostgREST and again locally so a schema
    /// without the `and=` filter support still yields correct rows.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError` if the query fails.
    #[instrument(skip(self), fields(module = %query.module, score = ?query.score))]
    pub async fn query_manifest(&self, query: &ManifestQuery) -> Result<Vec<PdfAsset>, SupabaseError> {
        let rows: Vec<PdfAsset> = self.select(PDF_ASSETS, &manifest_params(query)).await?;
        Ok(rows
            .into_iter()
            .filter(|row| row.matches(query.score))
            .collect())
    }

    /// Admin listing of manifest rows.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_pdf_assets(&self, query: &AssetListQuery) -> Result<Vec<PdfAsset>, SupabaseError> {
        let mut params: Query = vec![
            ("select", "*".to_string()),
            ("order", ADMIN_LISTING_ORDER.to_string()),
            ("limit", query.limit.to_string()),
            ("offset", query.offset.to_string()),
        ];
        if let Some(group) = &query.group {
            params.push(("group_key", format!("eq.{group}")));
        }
        if let Some(lesson) = &query.lesson {
            params.push(("lesson", format!("eq.{lesson}")));
        }
        self.select(PDF_ASSETS, &params).await
    }

    /// Insert a manifest row and return it.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError` if the insert is rejected.
    #[instrument(skip(self, asset), fields(group_key = %asset.group_key, path = %asset.path))]
    pub async fn insert_pdf_asset(&self, asset: &NewPdfAsset) -> Result<Option<PdfAsset>, SupabaseError> {
        let request = self
            .table_request(Method::POST, PDF_ASSETS)?
            .header("Prefer", "return=representation")
            .json(asset);
        let rows: Vec<PdfAsset> = send_json(request).await?;
        Ok(rows.into_iter().next())
    }

    /// Update a manifest row and return it (`None` when no row matched).
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError` if the update is rejected.
    #[instrument(skip(self, patch), fields(id = %id))]
    pub async fn update_pdf_asset(
        &self,
        id: &PdfAssetId,
        patch: &PdfAssetPatch,
    ) -> Result<Option<PdfAsset>, SupabaseError> {
        let request = self
            .table_request(Method::PATCH, PDF_ASSETS)?
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(patch);
        let rows: Vec<PdfAsset> = send_json(request).await?;
        Ok(rows.into_iter().next())
    }

    /// Delete a manifest row, returning how many rows were removed.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError` if the delete is rejected.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete_pdf_asset(&self, id: &PdfAssetId) -> Result<usize, SupabaseError> {
        let request = self
            .table_request(Method::DELETE, PDF_ASSETS)?
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation");
        let rows: Vec<Value> = send_json(request).await?;
        Ok(rows.len())
    }
}

/// PostgREST parameters for the public manifest query.
fn manifest_params(query: &ManifestQuery) -> Query {
    let mut params: Query = vec![
        ("select", "*".to_string()),
        ("group_key", format!("eq.{}", query.module)),
        ("active", "eq.true".to_string()),
    ];
    if let Some(lesson) = &query.lesson {
        params.push(("lesson", format!("eq.{lesson}")));
    }
    match query.score {
        None => params.push(("is_default", "eq.true".to_string())),
        Some(score) => params.push((
            "and",
            format!(
                "(or(score_min.is.null,score_min.lte.{score}),or(score_max.is.null,score_max.gte.{score}))"
            ),
        )),
    }
    params.push(("order", MANIFEST_ORDER.to_string()));
    params.push(("limit", query.limit.to_string()));
    params
}

/// Escape `LIKE` wildcards so an email matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
