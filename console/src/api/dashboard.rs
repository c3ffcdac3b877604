// Dashboard listing: fetch, summarize, filter, sort.
//
// Filtering and sorting are pure functions over the fetched rows so the
// whole pipeline can be tested without a database.

use log::error;

use crate::form::progress::progress_from_blob;
use crate::form::store::PROGRESS_KEY;
use crate::models::application::{ApplicationRow, ApplicationStatus};
use crate::models::requests::{DashboardQuery, SortOrder};
use crate::models::responses::{ApiResponse, ApplicationSummary};
use crate::remote::records::ApplicationRecords;

/// Collapse a full row into the card shown on the dashboard. Progress comes
/// from the blob's own `progress` key when present, falling back to the
/// populated-section count for rows written before progress was recorded.
pub fn summarize(row: &ApplicationRow) -> ApplicationSummary {
    let blob = row.application_data.as_object();
    let progress = blob
        .and_then(|b| b.get(PROGRESS_KEY))
        .and_then(|v| v.as_u64())
        .map(|p| p.min(100) as u8)
        .or_else(|| blob.map(progress_from_blob))
        .unwrap_or(0);

    ApplicationSummary {
        id: row.id.clone(),
        merchant_name: row.merchant_name.clone(),
        merchant_email: row.merchant_email.clone(),
        status: ApplicationStatus::from_str(&row.status),
        progress,
        completed: row.completed,
        updated_at: row.updated_at,
    }
}

/// Apply the dashboard query to summarized rows: case-insensitive substring
/// match on the merchant name, exact status match, then the chosen order.
pub fn apply_filters(
    mut summaries: Vec<ApplicationSummary>,
    query: &DashboardQuery,
) -> Vec<ApplicationSummary> {
    if let Some(search) = query.search.as_deref() {
        let needle = search.trim().to_lowercase();
        if !needle.is_empty() {
            summaries.retain(|s| s.merchant_name.to_lowercase().contains(&needle));
        }
    }

    if let Some(status) = query.status {
        summaries.retain(|s| s.status == Some(status));
    }

    match query.sort {
        SortOrder::Recent => summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
        SortOrder::NameAsc => {
            summaries.sort_by(|a, b| a.merchant_name.to_lowercase().cmp(&b.merchant_name.to_lowercase()))
        }
        SortOrder::NameDesc => {
            summaries.sort_by(|a, b| b.merchant_name.to_lowercase().cmp(&a.merchant_name.to_lowercase()))
        }
        SortOrder::ProgressHigh => summaries.sort_by(|a, b| b.progress.cmp(&a.progress)),
        SortOrder::ProgressLow => summaries.sort_by(|a, b| a.progress.cmp(&b.progress)),
    }

    summaries
}

pub async fn list_applications(
    records: &dyn ApplicationRecords,
    query: &DashboardQuery,
) -> ApiResponse<Vec<ApplicationSummary>> {
    match records.list_applications().await {
        Ok(rows) => {
            let summaries = rows.iter().map(summarize).collect();
            ApiResponse::ok(apply_filters(summaries, query))
        }
        Err(e) => {
            error!("[PHASE: dashboard] [STEP: list] Listing failed: {}", e);
            ApiResponse::fail(format!("Failed to list applications: {}", e))
        }
    }
}
