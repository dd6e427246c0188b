//! Object storage (`/storage/v1`).

use axum::body::Bytes;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;
use url::Url;

use super::{KeyRole, SupabaseClient, SupabaseError, check, send_json};

/// A signed upload target handed to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedUpload {
    /// Absolute URL the client PUTs the file to.
    pub signed_url: String,
    /// Upload token (also embedded in `signed_url`).
    pub token: Option<String>,
    /// Object path inside the bucket.
    pub path: String,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(alias = "signedUrl", rename = "signedURL")]
    signed_url: Option<String>,
}

#[derive(Deserialize)]
struct SignedUploadResponse {
    url: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

impl SupabaseClient {
    /// `{base}/storage/v1/{prefix...}/{bucket}/{path...}` with every segment
    /// percent-encoded.
    fn storage_url(
        &self,
        prefix: &[&str],
        bucket: &str,
        path: &str,
    ) -> Result<Url, SupabaseError> {
        let mut url = Url::parse(self.base_url())
            .map_err(|e| SupabaseError::Parse(format!("invalid Supabase URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| SupabaseError::Parse("Supabase URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["storage", "v1"])
            .extend(prefix)
            .push(bucket)
            .extend(object_segments(path));
        Ok(url)
    }

    /// Resolve the relative URL storage returns (`/object/sign/...`).
    fn absolute_storage_url(&self, relative: &str) -> String {
        if relative.starts_with("http://") || relative.starts_with("https://") {
            return relative.to_string();
        }
        let relative = relative.strip_prefix("/storage/v1").unwrap_or(relative);
        let slash = if relative.starts_with('/') { "" } else { "/" };
        format!("{}/storage/v1{slash}{relative}", self.base_url())
    }

    /// Public URL of an object in a public bucket. Makes no request.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Parse` if the project URL is not a valid base.
    pub fn public_url(&self, bucket: &str, path: &str) -> Result<String, SupabaseError> {
        Ok(self
            .storage_url(&["object", "public"], bucket, path)?
            .to_string())
    }

    /// Create a time-limited read URL for an object.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError` if signing fails or the response has no URL.
    #[instrument(skip(self))]
    pub async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: u64,
    ) -> Result<String, SupabaseError> {
        let url = self.storage_url(&["object", "sign"], bucket, path)?;
        let request = self
            .request_to(Method::POST, url.as_str(), KeyRole::Data)?
            .json(&json!({ "expiresIn": expires_in }));
        let response: SignedUrlResponse = send_json(request).await?;
        let relative = response
            .signed_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| SupabaseError::Parse("signed URL missing from response".to_string()))?;
        Ok(self.absolute_storage_url(&relative))
    }

    /// Create a signed upload URL so the browser can upload directly.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError` if signing fails or the response has no URL.
    #[instrument(skip(self))]
    pub async fn create_signed_upload_url(
        &self,
        bucket: &str,
        path: &str,
    ) -> Result<SignedUpload, SupabaseError> {
        let url = self.storage_url(&["object", "upload", "sign"], bucket, path)?;
        let request = self.request_to(Method::POST, url.as_str(), KeyRole::Data)?;
        let response: SignedUploadResponse = send_json(request).await?;
        let relative = response
            .url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| SupabaseError::Parse("upload URL missing from response".to_string()))?;

        let signed_url = self.absolute_storage_url(&relative);
        let token = response.token.or_else(|| token_from_url(&signed_url));
        Ok(SignedUpload {
            signed_url,
            token,
            path: path.to_string(),
        })
    }

    /// Upload (or overwrite) an object.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError` if storage rejects the upload.
    #[instrument(skip(self, body), fields(size = body.len()))]
    pub async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), SupabaseError> {
        let url = self.storage_url(&["object"], bucket, path)?;
        let request = self
            .request_to(Method::POST, url.as_str(), KeyRole::Data)?
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        check(request.send().await?).await?;
        Ok(())
    }
}

fn object_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn token_from_url(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::config::SupabaseConfig;

    fn client(url: &str) -> SupabaseClient {
        SupabaseClient::new(&SupabaseConfig {
            url: url.to_string(),
            anon_key: None,
            service_role_key: Some(SecretString::from("service-key")),
        })
        .unwrap()
    }

    #[test]
    fn test_public_url_encodes_segments() {
        let client = client("https://proj.supabase.co");
        assert_eq!(
            client.public_url("pdfs", "/algebra/lesson 1/intro#1.pdf").unwrap(),
            "https://proj.supabase.co/storage/v1/object/public/pdfs/algebra/lesson%201/intro%231.pdf"
        );
    }

    #[test]
    fn test_absolute_storage_url() {
        let client = client("https://proj.supabase.co");
        assert_eq!(
            client.absolute_storage_url("/object/sign/pdfs/a.pdf?token=abc"),
            "https://proj.supabase.co/storage/v1/object/sign/pdfs/a.pdf?token=abc"
        );
        assert_eq!(
            client.absolute_storage_url("https://cdn.example.com/a.pdf"),
            "https://cdn.example.com/a.pdf"
        );
    }

    #[tokio::test]
    async fn test_create_signed_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/storage/v1/object/sign/pdfs/algebra/intro.pdf")
            .match_body(mockito::Matcher::Json(json!({"expiresIn": 1800})))
            .with_status(200)
            .with_body(r#"{"signedURL":"/object/sign/pdfs/algebra/intro.pdf?token=t0k"}"#)
            .create_async()
            .await;

        let url = client(&server.url())
            .create_signed_url("pdfs", "algebra/intro.pdf", 1800)
            .await
            .unwrap();
        assert_eq!(
            url,
            format!("{}/storage/v1/object/sign/pdfs/algebra/intro.pdf?token=t0k", server.url())
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_signed_upload_url_extracts_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/storage/v1/object/upload/sign/pdfs/new.pdf")
            .with_status(200)
            .with_body(r#"{"url":"/object/upload/sign/pdfs/new.pdf?token=up-123"}"#)
            .create_async()
            .await;

        let upload = client(&server.url())
            .create_signed_upload_url("pdfs", "new.pdf")
            .await
            .unwrap();
        assert_eq!(upload.token.as_deref(), Some("up-123"));
        assert_eq!(upload.path, "new.pdf");
        assert!(upload.signed_url.starts_with(&server.url()));
    }

    #[tokio::test]
    async fn test_upload_object_upserts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/storage/v1/object/pdfs/a.pdf")
            .match_header("x-upsert", "true")
            .match_header("content-type", "application/pdf")
            .with_status(200)
            .with_body(r#"{"Key":"pdfs/a.pdf"}"#)
            .create_async()
            .await;

        client(&server.url())
            .upload_object("pdfs", "a.pdf", Bytes::from_static(b"%PDF-1.4"), "application/pdf")
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
