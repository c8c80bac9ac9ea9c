//! HTTP object-store storage backend.

use reqwest::blocking::Client;
use spyglass_core::error::{AuditError, Result};
use spyglass_core::store::StorageBackend;

/// Storage backend over an S3-compatible HTTP object store. Documents are
/// stored as objects under `{bucket}/{path}`.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    endpoint: String,
    bucket: String,
    token: Option<String>,
    client: Client,
}

impl ObjectStoreBackend {
    /// Build a backend from environment variables.
    pub fn from_env() -> Self {
        let endpoint = std::env::var("OBJECT_STORE_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:9000".to_string());
        let bucket =
            std::env::var("OBJECT_STORE_BUCKET").unwrap_or_else(|_| "spyglass-audit".to_string());
        let token = std::env::var("OBJECT_STORE_TOKEN").ok();
        Self::new(endpoint, bucket, token)
    }

    /// Build a backend with explicit settings.
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>, token: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            token,
            client: Client::new(),
        }
    }

    /// Replace the bucket name, keeping the endpoint and credentials.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.bucket,
            path.trim_start_matches('/')
        )
    }
}

impl StorageBackend for ObjectStoreBackend {
    fn put(&self, path: &str, content: &str) -> Result<()> {
        let mut request = self
            .client
            .put(self.object_url(path))
            .header("content-type", "application/json")
            .body(content.to_string());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .map_err(|err| AuditError::Storage(format!("object store put failed: {err}")))?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(AuditError::Storage(format!(
                "object store put failed for {path} ({status})"
            )));
        }
        Ok(())
    }

    fn get(&self, path: &str) -> Result<String> {
        let mut request = self.client.get(self.object_url(path));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .map_err(|err| AuditError::Storage(format!("object store get failed: {err}")))?;
        if response.status().as_u16() == 404 {
            return Err(AuditError::MissingDocument(path.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(AuditError::Storage(format!(
                "object store get failed for {path} ({status})"
            )));
        }
        response
            .text()
            .map_err(|err| AuditError::Storage(format!("object store read failed: {err}")))
    }
}
