// Callable-function client.
//
// Two server-side functions back the console: `send-merchant-email` (the
// OTP invite) and `upload-document` (metadata insert running with elevated
// privileges, bypassing client-side row permissions).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::config::BackendConfig;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantEmailPayload {
    pub merchant_name: String,
    pub merchant_email: String,
    pub application_data: Value,
    pub otp: String,
    pub application_id: String,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resend: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadataPayload {
    pub entity_id: String,
    pub entity_type: String,
    pub doc_type: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub file_path: String,
    pub user_name: String,
}

#[async_trait]
pub trait FunctionsPort: Send + Sync {
    async fn send_merchant_email(&self, payload: &MerchantEmailPayload) -> Result<()>;

    /// Returns the id of the inserted metadata row.
    async fn insert_document_metadata(&self, payload: &DocumentMetadataPayload) -> Result<String>;
}

pub struct FunctionsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FunctionsClient {
    pub fn new(backend: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(12))
            .build()
            .context("Failed to build functions HTTP client")?;
        Ok(Self {
            client,
            base_url: backend.base_url.trim_end_matches('/').to_string(),
            api_key: backend.api_key.clone(),
        })
    }

    async fn invoke<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        name: &str,
        body: &B,
    ) -> Result<R> {
        let url = format!("{}/functions/v1/{}", self.base_url, name);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Function {} call failed", name))?;

        if !resp.status().is_success() {
            return Err(anyhow::anyhow!(
                "Function {} returned HTTP {}",
                name,
                resp.status()
            ));
        }

        resp.json::<R>()
            .await
            .with_context(|| format!("Function {} returned an unreadable body", name))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailResponse {
    success: bool,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertDocumentResponse {
    success: bool,
    document_id: Option<String>,
    error_message: Option<String>,
}

#[async_trait]
impl FunctionsPort for FunctionsClient {
    async fn send_merchant_email(&self, payload: &MerchantEmailPayload) -> Result<()> {
        let resp: SendEmailResponse = self.invoke("send-merchant-email", payload).await?;
        if !resp.success {
            return Err(anyhow::anyhow!(
                "send-merchant-email failed: {}",
                resp.error_message
                    .unwrap_or_else(|| "Unknown error".to_string())
            ));
        }
        Ok(())
    }

    async fn insert_document_metadata(&self, payload: &DocumentMetadataPayload) -> Result<String> {
        let resp: InsertDocumentResponse = self.invoke("upload-document", payload).await?;
        if !resp.success {
            return Err(anyhow::anyhow!(
                "upload-document failed: {}",
                resp.error_message
                    .unwrap_or_else(|| "Unknown error".to_string())
            ));
        }
        resp.document_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("upload-document response missing documentId"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_payload_uses_camel_case_wire_keys() {
        let payload = MerchantEmailPayload {
            merchant_name: "Acme".to_string(),
            merchant_email: "owner@acme.test".to_string(),
            application_data: serde_json::json!({ "businessName": "Acme" }),
            otp: "123456".to_string(),
            application_id: "app-1".to_string(),
            expires_at: Utc::now(),
            resend: None,
        };
        let wire = serde_json::to_value(&payload).expect("serialize");
        assert!(wire.get("merchantName").is_some());
        assert!(wire.get("applicationId").is_some());
        assert!(wire.get("expiresAt").is_some());
        // Absent resend flag stays off the wire entirely.
        assert!(wire.get("resend").is_none());
    }

    #[test]
    fn document_payload_carries_the_full_contract() {
        let payload = DocumentMetadataPayload {
            entity_id: "app-1".to_string(),
            entity_type: "merchant".to_string(),
            doc_type: "bank_statement".to_string(),
            file_name: "statement.pdf".to_string(),
            file_type: "application/pdf".to_string(),
            file_size: 2048,
            file_path: "app-1/1712000000_statement.pdf".to_string(),
            user_name: "admin".to_string(),
        };
        let wire = serde_json::to_value(&payload).expect("serialize");
        for key in [
            "entityId",
            "entityType",
            "docType",
            "fileName",
            "fileType",
            "fileSize",
            "filePath",
            "userName",
        ] {
            assert!(wire.get(key).is_some(), "missing wire key {}", key);
        }
    }
}
