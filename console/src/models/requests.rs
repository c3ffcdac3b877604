// API request models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::application::ApplicationStatus;
use super::document::DocumentType;
use crate::form::tabs::Tab;

// =========================
// Applications
// =========================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApplicationRequest {
    pub merchant_name: String,
    pub merchant_email: String,
}

/// One dual-write save: the full snapshot plus the navigation bookkeeping
/// that rides along with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveApplicationRequest {
    pub application_id: String,
    pub form_data: Value,
    pub progress: u8,
    pub active_tab: Tab,
}

// =========================
// Documents
// =========================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDocumentRequest {
    pub application_id: String,
    pub document_type: DocumentType,
    pub file_name: String,
    pub mime_type: String,
    /// Name shown in the review trail for the metadata row.
    #[serde(default = "default_user_name")]
    pub user_name: String,
}

fn default_user_name() -> String {
    "admin".to_string()
}

// =========================
// Invites
// =========================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    pub application_id: String,
    #[serde(default)]
    pub resend: bool,
}

// =========================
// Dashboard
// =========================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Recent,
    NameAsc,
    NameDesc,
    ProgressHigh,
    ProgressLow,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Recent
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuery {
    /// Case-insensitive substring match on the merchant/business name.
    pub search: Option<String>,
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub sort: SortOrder,
}
