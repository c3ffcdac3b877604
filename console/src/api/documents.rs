// Document upload pipeline.
//
// Stage order is fixed: size check, bucket ensure, object upload, metadata
// insert (or temp-cache append for pre-save sessions). Progress milestones
// are emitted at real stage boundaries, not on a timer, so a stalled
// transfer shows a stalled bar. The oversize check runs before any port is
// touched.

use chrono::Utc;
use log::{error, info, warn};
use thiserror::Error;
use uuid::Uuid;

use crate::models::document::DocumentRecord;
use crate::models::requests::UploadDocumentRequest;
use crate::models::responses::{ApiResponse, UploadResponse};
use crate::persistence::local_cache::LocalCache;
use crate::remote::functions::{DocumentMetadataPayload, FunctionsPort};
use crate::remote::records::ApplicationRecords;
use crate::remote::storage::{build_object_path, ObjectStorePort};
use crate::utils::validation::{is_temporary_id, validate_application_id, UPLOAD_TOO_LARGE_MESSAGE};

/// Milestones surfaced while an upload runs. Values are percentages.
pub const MILESTONE_VALIDATED: u8 = 10;
pub const MILESTONE_BUCKET_CHECKED: u8 = 20;
pub const MILESTONE_BUCKET_READY: u8 = 30;
pub const MILESTONE_UPLOAD_STARTED: u8 = 50;
pub const MILESTONE_UPLOAD_DONE: u8 = 75;
pub const MILESTONE_METADATA_STARTED: u8 = 90;
pub const MILESTONE_COMPLETE: u8 = 100;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{}", UPLOAD_TOO_LARGE_MESSAGE)]
    TooLarge,
    #[error("Application id is required")]
    MissingApplicationId,
    #[error("Storage bucket is unavailable")]
    Bucket(#[source] anyhow::Error),
    #[error("File transfer failed")]
    Transport(#[source] anyhow::Error),
    #[error("Document record could not be created")]
    Metadata(#[source] anyhow::Error),
    #[error("Failed to track document locally")]
    Cache(#[source] anyhow::Error),
}

/// Per-upload UI state. `reset` is idempotent so error dismissal and upload
/// completion can both call it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadState {
    pub uploading: bool,
    pub progress: u8,
    pub error: Option<String>,
}

impl UploadState {
    pub fn begin(&mut self) {
        self.uploading = true;
        self.progress = 0;
        self.error = None;
    }

    pub fn advance(&mut self, milestone: u8) {
        self.progress = milestone;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.uploading = false;
        self.error = Some(message.into());
    }

    pub fn reset(&mut self) {
        *self = UploadState::default();
    }
}

pub struct DocumentPipeline<'a> {
    pub store: &'a dyn ObjectStorePort,
    pub functions: &'a dyn FunctionsPort,
    pub cache: &'a LocalCache,
    /// Upload size cap in bytes (`max_upload_bytes` in the configuration).
    pub max_bytes: u64,
}

impl DocumentPipeline<'_> {
    /// Run one upload end to end. `on_progress` fires at each milestone.
    pub async fn upload(
        &self,
        req: &UploadDocumentRequest,
        bytes: Vec<u8>,
        mut on_progress: impl FnMut(u8),
    ) -> Result<UploadResponse, UploadError> {
        validate_application_id(&req.application_id)
            .map_err(|_| UploadError::MissingApplicationId)?;

        if bytes.len() as u64 > self.max_bytes {
            return Err(UploadError::TooLarge);
        }
        on_progress(MILESTONE_VALIDATED);

        let correlation_id = Uuid::new_v4().simple().to_string();
        info!(
            "[PHASE: documents] [STEP: upload] Uploading {} ({} bytes) for {} (correlation_id={})",
            req.file_name,
            bytes.len(),
            req.application_id,
            correlation_id
        );

        on_progress(MILESTONE_BUCKET_CHECKED);
        self.store.ensure_bucket().await.map_err(UploadError::Bucket)?;
        on_progress(MILESTONE_BUCKET_READY);

        let path = build_object_path(&req.application_id, &req.file_name);
        let size = bytes.len() as i64;

        on_progress(MILESTONE_UPLOAD_STARTED);
        self.store
            .upload(&path, bytes, &req.mime_type)
            .await
            .map_err(UploadError::Transport)?;
        on_progress(MILESTONE_UPLOAD_DONE);

        on_progress(MILESTONE_METADATA_STARTED);
        let record = self.record_metadata(req, &path, size, &correlation_id).await?;
        on_progress(MILESTONE_COMPLETE);

        let url = Some(self.store.public_url(&path));
        Ok(UploadResponse { document: record, url })
    }

    /// Temporary sessions track metadata on-device only; persisted
    /// applications go through the elevated metadata function.
    async fn record_metadata(
        &self,
        req: &UploadDocumentRequest,
        path: &str,
        size: i64,
        correlation_id: &str,
    ) -> Result<DocumentRecord, UploadError> {
        if is_temporary_id(&req.application_id) {
            let record = DocumentRecord {
                id: Uuid::new_v4().simple().to_string(),
                merchant_id: req.application_id.clone(),
                file_name: req.file_name.clone(),
                file_path: path.to_string(),
                file_type: req.mime_type.clone(),
                file_size: size,
                document_type: req.document_type.as_str().to_string(),
                created_at: Utc::now(),
            };
            self.cache
                .append_temp_document(&req.application_id, &record)
                .map_err(UploadError::Cache)?;
            return Ok(record);
        }

        let payload = DocumentMetadataPayload {
            entity_id: req.application_id.clone(),
            entity_type: "merchant".to_string(),
            doc_type: req.document_type.as_str().to_string(),
            file_name: req.file_name.clone(),
            file_type: req.mime_type.clone(),
            file_size: size,
            file_path: path.to_string(),
            user_name: req.user_name.clone(),
        };

        match self.functions.insert_document_metadata(&payload).await {
            Ok(document_id) => Ok(DocumentRecord {
                id: document_id,
                merchant_id: req.application_id.clone(),
                file_name: req.file_name.clone(),
                file_path: path.to_string(),
                file_type: req.mime_type.clone(),
                file_size: size,
                document_type: req.document_type.as_str().to_string(),
                created_at: Utc::now(),
            }),
            Err(e) => {
                // The object is already in the bucket with no row pointing
                // at it. Flag the orphan for a manual sweep.
                warn!(
                    "[PHASE: documents] [STEP: metadata] Orphaned object at {} for {} (correlation_id={}): {}",
                    path, req.application_id, correlation_id, e
                );
                Err(UploadError::Metadata(e))
            }
        }
    }
}

// =========================
// Commands
// =========================

/// Documents visible for an application: on-device records for temporary
/// sessions, remote rows otherwise.
pub async fn list_documents(
    records: &dyn ApplicationRecords,
    cache: &LocalCache,
    application_id: &str,
) -> ApiResponse<Vec<DocumentRecord>> {
    if validate_application_id(application_id).is_err() {
        return ApiResponse::fail("Application id is required");
    }

    if is_temporary_id(application_id) {
        return match cache.temp_documents(application_id) {
            Ok(docs) => ApiResponse::ok(docs),
            Err(e) => ApiResponse::fail(format!("Failed to read tracked documents: {}", e)),
        };
    }

    match records.list_documents(application_id).await {
        Ok(docs) => ApiResponse::ok(docs),
        Err(e) => {
            error!(
                "[PHASE: documents] [STEP: list] Listing failed for {}: {}",
                application_id, e
            );
            ApiResponse::fail(format!("Failed to list documents: {}", e))
        }
    }
}

/// Deletion is not wired up; uploaded documents are immutable for now.
pub fn delete_document(_document_id: &str) -> ApiResponse<()> {
    ApiResponse::fail("Document deletion is not yet available.")
}
