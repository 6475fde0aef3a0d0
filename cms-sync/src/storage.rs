//! Storage-bucket client: uploads re-hosted images and hands back their
//! public URLs. The bucket is a flat object store addressed by path.

use async_trait::async_trait;
use tracing::{error, info};

use cms_sync_core::contract::{ObjectStore, StoreError};

use crate::load_config::BackendCredentials;

pub struct BucketStore {
    client: reqwest::Client,
    base: String,
    bucket: String,
    service_key: String,
}

impl BucketStore {
    pub fn new(credentials: &BackendCredentials, bucket: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: credentials.api_url.clone(),
            bucket: bucket.into(),
            service_key: credentials.service_key.clone(),
        }
    }

    /// Public URL of an object, whether or not it exists yet.
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{path}", self.base, self.bucket)
    }
}

#[async_trait]
impl ObjectStore for BucketStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<String, StoreError> {
        info!(bucket = %self.bucket, path, size = bytes.len(), "uploading object");
        let response = self
            .client
            .post(format!(
                "{}/storage/v1/object/{}/{path}",
                self.base, self.bucket
            ))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, path, body = %body, "object upload failed");
            return Err(format!("storage upload returned {status}: {body}").into());
        }

        Ok(self.public_url(path))
    }
}
