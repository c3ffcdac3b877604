// Object storage client.
//
// Buckets and objects live behind the hosted backend's storage API. The
// `ObjectStorePort` trait lets the upload pipeline be tested without a
// network (stubs count calls to prove the "no network on oversize" rule).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use log::info;
use std::time::Duration;
use url::Url;

use crate::config::BackendConfig;
use crate::utils::validation::{is_temporary_id, sanitize_file_name};

#[async_trait]
pub trait ObjectStorePort: Send + Sync {
    /// Create the bucket when missing. Runtime provisioning rather than a
    /// deploy-time concern, kept for parity with the console's behavior.
    async fn ensure_bucket(&self) -> Result<()>;

    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Public retrieval URL for preview/download.
    fn public_url(&self, path: &str) -> String;
}

pub struct ObjectStore {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    bucket: String,
}

impl ObjectStore {
    pub fn new(backend: &BackendConfig, bucket: &str) -> Result<Self> {
        let base_url = Url::parse(backend.base_url.trim_end_matches('/'))
            .context("Invalid backend base URL")?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build storage HTTP client")?;
        Ok(Self {
            client,
            base_url,
            api_key: backend.api_key.clone(),
            bucket: bucket.to_string(),
        })
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/storage/v1/{}", self.base_url.as_str().trim_end_matches('/'), suffix)
    }
}

#[async_trait]
impl ObjectStorePort for ObjectStore {
    async fn ensure_bucket(&self) -> Result<()> {
        let url = self.endpoint(&format!("bucket/{}", self.bucket));
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Bucket lookup failed")?;

        if resp.status().is_success() {
            return Ok(());
        }

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            info!(
                "[PHASE: storage] [STEP: ensure_bucket] Bucket {} missing; creating",
                self.bucket
            );
            let create = self
                .client
                .post(self.endpoint("bucket"))
                .bearer_auth(&self.api_key)
                .json(&serde_json::json!({ "name": self.bucket, "public": false }))
                .send()
                .await
                .context("Bucket creation failed")?;
            if !create.status().is_success() {
                return Err(anyhow::anyhow!(
                    "Bucket creation returned HTTP {}",
                    create.status()
                ));
            }
            return Ok(());
        }

        Err(anyhow::anyhow!(
            "Bucket lookup returned HTTP {}",
            resp.status()
        ))
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let url = self.endpoint(&format!("object/{}/{}", self.bucket, path));
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .context("Object upload failed")?;

        if !resp.status().is_success() {
            return Err(anyhow::anyhow!("Object upload returned HTTP {}", resp.status()));
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        self.endpoint(&format!("object/public/{}/{}", self.bucket, path))
    }
}

/// Storage key for an uploaded file: `{applicationId}/{timestamp}_{name}`,
/// with a `temporary/` prefix for pre-save sessions.
pub fn build_object_path(application_id: &str, file_name: &str) -> String {
    build_object_path_at(application_id, file_name, Utc::now().timestamp())
}

pub fn build_object_path_at(application_id: &str, file_name: &str, timestamp: i64) -> String {
    let safe_name = sanitize_file_name(file_name);
    if is_temporary_id(application_id) {
        format!("temporary/{}/{}_{}", application_id.trim(), timestamp, safe_name)
    } else {
        format!("{}/{}_{}", application_id.trim(), timestamp, safe_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_ids_prefix_their_own_folder() {
        let path = build_object_path_at("app-1", "bank statement.pdf", 1_712_000_000);
        assert_eq!(path, "app-1/1712000000_bank_statement.pdf");
        assert!(path.starts_with("app-1/"));
    }

    #[test]
    fn temporary_ids_land_under_the_temporary_prefix() {
        let path = build_object_path_at("temp_42", "licence.png", 1_712_000_000);
        assert_eq!(path, "temporary/temp_42/1712000000_licence.png");
        assert!(path.starts_with("temporary/temp_42/"));
    }

    #[test]
    fn object_path_sanitizes_hostile_names() {
        let path = build_object_path_at("app-1", "../secrets.txt", 1);
        assert_eq!(path, "app-1/1_secrets.txt");
    }

    #[test]
    fn public_url_points_into_the_bucket() {
        let store = ObjectStore::new(
            &BackendConfig {
                base_url: "https://backend.example.com".to_string(),
                api_key: "k".to_string(),
            },
            "merchant-documents",
        )
        .expect("store");
        assert_eq!(
            store.public_url("app-1/1_file.pdf"),
            "https://backend.example.com/storage/v1/object/public/merchant-documents/app-1/1_file.pdf"
        );
    }
}
