//! Remote copy of the snapshot (Google Cloud Storage).
//!
//! Uploading is best-effort: the local file is the artifact of record,
//! so a failed upload is logged and the run still succeeds.

use crate::enrichment::ServiceError;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const GCS_UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1/b";

/// Somewhere a finished snapshot can be copied to.
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `name`; returns a printable location.
    fn put(&self, name: &str, body: &[u8], content_type: &str) -> Result<String, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct UploadedObject {
    bucket: String,
    name: String,
}

pub struct GcsStore {
    bucket: String,
    access_token: String,
    http: Client,
}

impl GcsStore {
    /// None unless both a bucket and a token are present.
    pub fn from_settings(
        bucket: Option<&str>,
        access_token: Option<&str>,
    ) -> Result<Option<Self>, ServiceError> {
        let (Some(bucket), Some(token)) = (bucket, access_token) else {
            return Ok(None);
        };
        let http = Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| ServiceError::Other(format!("cannot build HTTP client: {e}")))?;
        Ok(Some(Self {
            bucket: bucket.to_string(),
            access_token: token.to_string(),
            http,
        }))
    }

    fn headers(&self, content_type: &str) -> Result<HeaderMap, ServiceError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.access_token))
            .map_err(|e| ServiceError::Other(format!("invalid access token: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);
        let content_type = HeaderValue::from_str(content_type)
            .map_err(|e| ServiceError::Other(format!("invalid content type: {e}")))?;
        headers.insert(CONTENT_TYPE, content_type);
        Ok(headers)
    }
}

impl ObjectStore for GcsStore {
    fn put(&self, name: &str, body: &[u8], content_type: &str) -> Result<String, ServiceError> {
        let url = format!("{GCS_UPLOAD_BASE}/{}/o", self.bucket);
        let response = self
            .http
            .post(&url)
            .query(&[("uploadType", "media"), ("name", name)])
            .headers(self.headers(content_type)?)
            .body(body.to_vec())
            .send()
            .map_err(|e| ServiceError::Other(format!("upload failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| ServiceError::Other(format!("cannot read upload response: {e}")))?;
        if !status.is_success() {
            return Err(ServiceError::Other(format!(
                "GCS returned {status}: {}",
                text.chars().take(300).collect::<String>()
            )));
        }

        let object: UploadedObject = serde_json::from_str(&text)
            .map_err(|e| ServiceError::Malformed(format!("unexpected upload response: {e}")))?;
        Ok(format!("gs://{}/{}", object.bucket, object.name))
    }
}

/// Upload and swallow failure. Returns the location on success.
pub fn publish(store: &dyn ObjectStore, name: &str, body: &[u8]) -> Option<String> {
    match store.put(name, body, "application/json") {
        Ok(location) => {
            log::info!("upload: snapshot copied to {location}");
            Some(location)
        }
        Err(e) => {
            log::warn!("upload: failed, local snapshot kept: {e}");
            None
        }
    }
}
