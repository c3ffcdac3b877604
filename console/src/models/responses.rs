// API response models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::application::{ApplicationRow, ApplicationStatus, SnapshotSource};
use super::document::DocumentRecord;
use crate::form::tabs::Tab;

// =========================
// Generic wrapper
// =========================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: Some(message.into()),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            message: None,
        }
    }
}

// =========================
// Applications
// =========================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    /// False when the remote write failed or timed out and only the local
    /// write-ahead copy stands for this session.
    pub saved_remote: bool,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedApplication {
    pub row: Option<ApplicationRow>,
    pub form_data: Value,
    pub progress: u8,
    pub active_tab: Tab,
    pub source: SnapshotSource,
}

// =========================
// Documents
// =========================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub document: DocumentRecord,
    /// Retrieval URL for preview/download (public object URL).
    pub url: Option<String>,
}

// =========================
// Invites
// =========================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteResponse {
    pub otp: String,
    pub expires_at: DateTime<Utc>,
    pub resent: bool,
}

// =========================
// Dashboard
// =========================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSummary {
    pub id: String,
    pub merchant_name: String,
    pub merchant_email: String,
    pub status: Option<ApplicationStatus>,
    pub progress: u8,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

// =========================
// Reconciliation
// =========================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub pending: usize,
    pub pushed: Vec<String>,
    pub failed: Vec<String>,
}
