// Application record and cached snapshot models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of a merchant application. Applications are never hard
/// deleted; `Declined` and `Removed` are terminal soft states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    InProgress,
    Submitted,
    Completed,
    Declined,
    Removed,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::InProgress => "in_progress",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Completed => "completed",
            ApplicationStatus::Declined => "declined",
            ApplicationStatus::Removed => "removed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim() {
            "in_progress" => Some(ApplicationStatus::InProgress),
            "submitted" => Some(ApplicationStatus::Submitted),
            "completed" => Some(ApplicationStatus::Completed),
            "declined" => Some(ApplicationStatus::Declined),
            "removed" => Some(ApplicationStatus::Removed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row shape of the `merchant_applications` collection.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRow {
    pub id: String,
    pub merchant_name: String,
    pub merchant_email: String,
    /// Free-form union of all tab field values plus `currentTab`/`progress`.
    pub application_data: Value,
    pub completed: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationRow {
    pub fn status_parsed(&self) -> Option<ApplicationStatus> {
        ApplicationStatus::from_str(&self.status)
    }
}

/// On-device cache entry for one application, stored under
/// `application_<id>.json`. This is the write-ahead copy: `pending_sync`
/// stays `true` until the matching remote write is confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedApplicationState {
    /// The owning application id as given by the caller. File names are
    /// sanitized, so this field is the authoritative id, not the file name.
    #[serde(default)]
    pub application_id: String,
    pub form_data: Value,
    pub progress: u8,
    pub active_tab: String,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub pending_sync: bool,
}

/// Where a loaded snapshot came from. The local cache copy, when present,
/// wins over the remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Local,
    Remote,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            ApplicationStatus::InProgress,
            ApplicationStatus::Submitted,
            ApplicationStatus::Completed,
            ApplicationStatus::Declined,
            ApplicationStatus::Removed,
        ] {
            assert_eq!(ApplicationStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ApplicationStatus::from_str("archived"), None);
    }

    #[test]
    fn cached_state_serializes_with_camel_case_keys() {
        let state = CachedApplicationState {
            application_id: "app-1".to_string(),
            form_data: serde_json::json!({ "businessName": "Acme" }),
            progress: 29,
            active_tab: "ownership".to_string(),
            last_updated: Utc::now(),
            pending_sync: true,
        };
        let text = serde_json::to_string(&state).expect("serialize");
        assert!(text.contains("\"formData\""));
        assert!(text.contains("\"activeTab\""));
        assert!(text.contains("\"lastUpdated\""));
        assert!(text.contains("\"pendingSync\""));
    }
}
