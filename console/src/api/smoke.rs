// Deterministic proof runners (no database, no network).
//
// Each runner drives the real workflow objects against in-memory backends
// and writes a line-oriented transcript under the log folder so automated
// checks can diff behavior between builds. Lines containing " EVENT " are
// the contract being proven.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::documents::{DocumentPipeline, UploadError};
use crate::autosave::AutosaveOutcome;
use crate::form::navigation::NavDirection;
use crate::form::tabs::Tab;
use crate::models::application::{ApplicationRow, ApplicationStatus, SnapshotSource};
use crate::models::document::{DocumentRecord, DocumentType};
use crate::models::requests::{CreateApplicationRequest, UploadDocumentRequest};
use crate::models::responses::LoadedApplication;
use crate::persistence::gateway::{PersistenceGateway, SaveOutcome};
use crate::persistence::local_cache::LocalCache;
use crate::remote::functions::{DocumentMetadataPayload, FunctionsPort, MerchantEmailPayload};
use crate::remote::records::ApplicationRecords;
use crate::remote::storage::ObjectStorePort;
use crate::utils::validation::MAX_UPLOAD_BYTES;

/// In-memory record store backing the proof runners.
struct MemoryRecords {
    rows: Mutex<Vec<ApplicationRow>>,
    update_calls: AtomicUsize,
    update_delay: Option<Duration>,
}

impl MemoryRecords {
    fn new(update_delay: Option<Duration>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            update_calls: AtomicUsize::new(0),
            update_delay,
        }
    }

    fn rows_guard(&self) -> Result<std::sync::MutexGuard<'_, Vec<ApplicationRow>>> {
        self.rows
            .lock()
            .map_err(|_| anyhow::anyhow!("record store lock poisoned"))
    }
}

#[async_trait]
impl ApplicationRecords for MemoryRecords {
    async fn insert_application(&self, req: &CreateApplicationRequest) -> Result<ApplicationRow> {
        let now = chrono::Utc::now();
        let row = ApplicationRow {
            id: format!("smoke-{}", self.rows_guard()?.len() + 1),
            merchant_name: req.merchant_name.clone(),
            merchant_email: req.merchant_email.clone(),
            application_data: json!({}),
            completed: false,
            status: ApplicationStatus::InProgress.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        self.rows_guard()?.push(row.clone());
        Ok(row)
    }

    async fn fetch_application(&self, id: &str) -> Result<Option<ApplicationRow>> {
        Ok(self.rows_guard()?.iter().find(|r| r.id == id).cloned())
    }

    async fn update_application_data(&self, id: &str, data: &Value) -> Result<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.update_delay {
            tokio::time::sleep(delay).await;
        }
        let mut rows = self.rows_guard()?;
        if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
            row.application_data = data.clone();
            row.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn list_applications(&self) -> Result<Vec<ApplicationRow>> {
        Ok(self.rows_guard()?.clone())
    }

    async fn set_status(&self, id: &str, status: ApplicationStatus) -> Result<()> {
        let mut rows = self.rows_guard()?;
        if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
            row.status = status.as_str().to_string();
        }
        Ok(())
    }

    async fn mark_completed(&self, id: &str) -> Result<()> {
        let mut rows = self.rows_guard()?;
        if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
            row.completed = true;
            row.status = ApplicationStatus::Completed.as_str().to_string();
        }
        Ok(())
    }

    async fn list_documents(&self, _merchant_id: &str) -> Result<Vec<DocumentRecord>> {
        Ok(Vec::new())
    }
}

/// In-memory object store for the upload proof.
struct MemoryObjectStore {
    objects: Mutex<Vec<String>>,
    ensure_calls: AtomicUsize,
}

impl MemoryObjectStore {
    fn new() -> Self {
        Self {
            objects: Mutex::new(Vec::new()),
            ensure_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ObjectStorePort for MemoryObjectStore {
    async fn ensure_bucket(&self) -> Result<()> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn upload(&self, path: &str, _bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        self.objects
            .lock()
            .map_err(|_| anyhow::anyhow!("object store lock poisoned"))?
            .push(path.to_string());
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://merchant-documents/{}", path)
    }
}

struct MemoryFunctions {
    metadata_calls: AtomicUsize,
}

#[async_trait]
impl FunctionsPort for MemoryFunctions {
    async fn send_merchant_email(&self, _payload: &MerchantEmailPayload) -> Result<()> {
        Ok(())
    }

    async fn insert_document_metadata(&self, _payload: &DocumentMetadataPayload) -> Result<String> {
        let n = self.metadata_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("smoke-doc-{}", n))
    }
}

/// Workflow proof: create, edit, debounce, navigate, single-flight, close,
/// reconcile. Writes `W1_workflow_smoke_transcript.log`.
pub async fn workflow_smoke() -> Result<()> {
    let log_dir = crate::utils::path_resolver::resolve_log_folder()?;
    let transcript_path = log_dir.join("W1_workflow_smoke_transcript.log");

    let mut transcript = String::new();
    let mut push = |line: String| {
        transcript.push_str(&line);
        transcript.push('\n');
    };

    push("WORKFLOW_SMOKE begin".to_string());
    push(format!("log_dir={}", log_dir.to_string_lossy()));

    let records = Arc::new(MemoryRecords::new(Some(Duration::from_millis(50))));
    let cache = Arc::new(LocalCache::new(log_dir.join("W1_cache"))?);
    let gateway = Arc::new(PersistenceGateway::new(
        records.clone(),
        cache.clone(),
        Duration::from_secs(3),
        Duration::from_secs(2),
    ));

    // 1) Create an application.
    let row = records
        .insert_application(&CreateApplicationRequest {
            merchant_name: "Smoke Coffee Roasters".to_string(),
            merchant_email: "owner@smoke.test".to_string(),
        })
        .await?;
    push(format!(" EVENT application_created id={}", row.id));

    // 2) Open a session and make rapid edits; the debounce window must
    // collapse them into one save.
    let loaded = LoadedApplication {
        row: Some(row.clone()),
        form_data: json!({}),
        progress: 0,
        active_tab: Tab::Business,
        source: SnapshotSource::Remote,
    };
    let mut session = crate::api::applications::ApplicationSession::open(
        &loaded,
        &row.id,
        gateway.clone(),
        Duration::from_millis(150),
    );

    session.set_field("businessName", json!("Smoke"));
    session.set_field("businessName", json!("Smoke Coffee"));
    session.set_field("businessName", json!("Smoke Coffee Roasters"));
    tokio::time::sleep(Duration::from_millis(400)).await;
    let outcomes = session.pump_outcomes();
    let saved = outcomes
        .iter()
        .filter(|o| matches!(o, AutosaveOutcome::Saved(_)))
        .count();
    push(format!(
        " EVENT debounce_coalesced edits=3 saves={} (expected 1)",
        saved
    ));
    push(format!(
        " EVENT remote_update_calls={} (expected 1)",
        records.update_calls.load(Ordering::SeqCst)
    ));

    // 3) Navigate forward twice; progress follows the tab position.
    let change = session.navigate(NavDirection::Next);
    push(format!(
        " EVENT navigated tab={} progress={}",
        change.tab, change.progress
    ));
    let change = session.navigate(NavDirection::Next);
    push(format!(
        " EVENT navigated tab={} progress={}",
        change.tab, change.progress
    ));

    // 4) Single-flight proof: two concurrent saves for the same id, the
    // second short-circuits. Let the navigation saves drain first so they
    // cannot hold the flight slot.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let req = session.save_request();
    let first = {
        let gateway = gateway.clone();
        let req = req.clone();
        tokio::spawn(async move { gateway.save(&req).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = gateway.save(&req).await?;
    let first = first
        .await
        .map_err(|e| anyhow::anyhow!("save task panicked: {}", e))??;
    push(format!(
        " EVENT single_flight first={:?} second={:?} (second should be SkippedInFlight)",
        first, second
    ));
    if second != SaveOutcome::SkippedInFlight {
        return Err(anyhow::anyhow!("single-flight guard did not hold"));
    }

    // 5) Close the session; any dirty state gets the short-window save.
    session.set_field("ownership.ownerName", json!("J. Smoke"));
    session.close().await;
    push(" EVENT session_closed".to_string());

    // 6) Reconcile is a no-op when every entry is synced.
    let report = gateway.reconcile().await?;
    push(format!(
        " EVENT reconcile pending={} pushed={} failed={}",
        report.pending,
        report.pushed.len(),
        report.failed.len()
    ));

    push("WORKFLOW_SMOKE end".to_string());
    tokio::fs::write(&transcript_path, transcript).await?;
    Ok(())
}

/// Upload proof: size gate, milestones, temp-session tracking. Writes
/// `W2_upload_smoke_transcript.log`.
pub async fn upload_smoke() -> Result<()> {
    let log_dir = crate::utils::path_resolver::resolve_log_folder()?;
    let transcript_path = log_dir.join("W2_upload_smoke_transcript.log");

    let mut transcript = String::new();
    let mut push = |line: String| {
        transcript.push_str(&line);
        transcript.push('\n');
    };

    push("UPLOAD_SMOKE begin".to_string());
    push(format!("log_dir={}", log_dir.to_string_lossy()));

    let store = MemoryObjectStore::new();
    let functions = MemoryFunctions {
        metadata_calls: AtomicUsize::new(0),
    };
    let cache = LocalCache::new(log_dir.join("W2_cache"))?;
    let pipeline = DocumentPipeline {
        store: &store,
        functions: &functions,
        cache: &cache,
        max_bytes: MAX_UPLOAD_BYTES,
    };

    // 1) Oversize file is rejected before any port call.
    let oversized = vec![0u8; (MAX_UPLOAD_BYTES + 1) as usize];
    let err = pipeline
        .upload(
            &UploadDocumentRequest {
                application_id: "smoke-1".to_string(),
                document_type: DocumentType::BankStatement,
                file_name: "huge.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                user_name: "admin".to_string(),
            },
            oversized,
            |_| {},
        )
        .await;
    let rejected = matches!(err, Err(UploadError::TooLarge));
    push(format!(
        " EVENT oversize_rejected={} bucket_calls={} (expected true, 0)",
        rejected,
        store.ensure_calls.load(Ordering::SeqCst)
    ));
    if !rejected {
        return Err(anyhow::anyhow!("oversize file was not rejected"));
    }

    // 2) Normal upload emits the full milestone ladder.
    let mut milestones = Vec::new();
    let resp = pipeline
        .upload(
            &UploadDocumentRequest {
                application_id: "smoke-1".to_string(),
                document_type: DocumentType::BankStatement,
                file_name: "bank statement.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                user_name: "admin".to_string(),
            },
            vec![1, 2, 3, 4],
            |p| milestones.push(p),
        )
        .await?;
    push(format!(
        " EVENT upload_complete path={} milestones={:?}",
        resp.document.file_path, milestones
    ));

    // 3) Temporary-session upload lands under the temporary prefix and is
    // tracked on-device only.
    let resp = pipeline
        .upload(
            &UploadDocumentRequest {
                application_id: "temp_1712000000".to_string(),
                document_type: DocumentType::BusinessLicense,
                file_name: "licence.png".to_string(),
                mime_type: "image/png".to_string(),
                user_name: "admin".to_string(),
            },
            vec![9, 9, 9],
            |_| {},
        )
        .await?;
    let tracked = cache.temp_documents("temp_1712000000")?.len();
    push(format!(
        " EVENT temp_upload path={} tracked_on_device={} metadata_calls={} (expected 1, 1)",
        resp.document.file_path,
        tracked,
        functions.metadata_calls.load(Ordering::SeqCst)
    ));

    push("UPLOAD_SMOKE end".to_string());
    tokio::fs::write(&transcript_path, transcript).await?;
    Ok(())
}
