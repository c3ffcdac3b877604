// Application session and commands.
//
// `ApplicationSession` ties one open application to the form store, the
// autosave trigger, and the persistence gateway. The free functions below
// it are the request/response commands the console surface calls.

use log::{error, info, warn};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::autosave::{AutosaveOutcome, AutosaveTrigger};
use crate::form::navigation::{adjacent, plan_tab_change, NavDirection, TabChange};
use crate::form::store::FormStore;
use crate::form::tabs::Tab;
use crate::models::application::{ApplicationRow, ApplicationStatus};
use crate::models::requests::{CreateApplicationRequest, SaveApplicationRequest};
use crate::models::responses::{ApiResponse, LoadedApplication};
use crate::persistence::gateway::PersistenceGateway;
use crate::remote::records::ApplicationRecords;
use crate::utils::validation::validate_email;

pub struct ApplicationSession {
    application_id: String,
    store: FormStore,
    active_tab: Tab,
    progress: u8,
    gateway: Arc<PersistenceGateway>,
    autosave: AutosaveTrigger,
    outcomes: mpsc::UnboundedReceiver<AutosaveOutcome>,
}

impl ApplicationSession {
    /// Open a session over an already-loaded application.
    pub fn open(
        loaded: &LoadedApplication,
        application_id: &str,
        gateway: Arc<PersistenceGateway>,
        debounce: Duration,
    ) -> Self {
        let snapshot = loaded
            .form_data
            .as_object()
            .cloned()
            .unwrap_or_default();
        let store = FormStore::from_snapshot(snapshot);
        let (autosave, outcomes) = AutosaveTrigger::spawn(gateway.clone(), debounce);
        Self {
            application_id: application_id.to_string(),
            store,
            active_tab: loaded.active_tab,
            progress: loaded.progress,
            gateway,
            autosave,
            outcomes,
        }
    }

    pub fn store(&self) -> &FormStore {
        &self.store
    }

    pub fn active_tab(&self) -> Tab {
        self.active_tab
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Merge a partial update into the snapshot. Arms the autosave window
    /// only when the merge actually made the store dirty.
    pub fn update_form_data(&mut self, partial: Map<String, Value>) {
        self.store.update_form_data(partial);
        if self.store.is_dirty() {
            let req = self.save_request();
            self.autosave.notify_dirty(req);
        }
    }

    /// Write one field by dotted path, arming the autosave window on a real
    /// change.
    pub fn set_field(&mut self, path: &str, value: Value) {
        self.store.set_field(path, value);
        if self.store.is_dirty() {
            let req = self.save_request();
            self.autosave.notify_dirty(req);
        }
    }

    /// The full dual-write request for the current state. Section defaults
    /// are applied first so every namespaced tab lands in the blob.
    pub fn save_request(&mut self) -> SaveApplicationRequest {
        self.store.apply_section_defaults();
        SaveApplicationRequest {
            application_id: self.application_id.clone(),
            form_data: self.store.snapshot_value(),
            progress: self.progress,
            active_tab: self.active_tab,
        }
    }

    /// Switch to a target tab. The save is dispatched without being awaited;
    /// the switch itself never blocks on the network.
    pub fn handle_tab_change(&mut self, target: Tab) -> TabChange {
        let change = plan_tab_change(&mut self.store, target);
        self.active_tab = change.tab;
        self.progress = change.progress;

        let req = self.save_request();
        let gateway = self.gateway.clone();
        tokio::spawn(async move {
            if let Err(e) = gateway.save(&req).await {
                warn!(
                    "[PHASE: session] [STEP: tab_save] Background save failed for {}: {}",
                    req.application_id, e
                );
            }
        });

        change
    }

    /// Back/Next navigation, clamped at the wizard edges.
    pub fn navigate(&mut self, direction: NavDirection) -> TabChange {
        let target = adjacent(self.active_tab, direction);
        self.handle_tab_change(target)
    }

    /// Drain queued autosave outcomes, resetting the dirty baseline after
    /// each confirmed save. The baseline is the snapshot that save actually
    /// wrote, so an edit made while the save was in flight keeps the store
    /// dirty.
    pub fn pump_outcomes(&mut self) -> Vec<AutosaveOutcome> {
        let mut drained = Vec::new();
        while let Ok(outcome) = self.outcomes.try_recv() {
            if let AutosaveOutcome::Saved(req) = &outcome {
                let saved = req.form_data.as_object().cloned().unwrap_or_default();
                self.store.record_saved_snapshot(saved);
            }
            drained.push(outcome);
        }
        drained
    }

    /// Final best-effort save on close, raced against the short window. A
    /// failure here is logged and swallowed: the write-ahead cache already
    /// holds the snapshot.
    pub async fn close(mut self) {
        self.autosave.shutdown();
        if !self.store.is_dirty() {
            return;
        }
        let req = self.save_request();
        if let Err(e) = self.gateway.save_on_close(&req).await {
            warn!(
                "[PHASE: session] [STEP: close_save] Closing save failed for {}: {}",
                req.application_id, e
            );
        }
    }
}

// =========================
// Commands
// =========================

pub async fn create_application(
    records: &dyn ApplicationRecords,
    req: &CreateApplicationRequest,
) -> ApiResponse<ApplicationRow> {
    let correlation_id = Uuid::new_v4().simple().to_string();
    info!(
        "[PHASE: applications] [STEP: create] Creating application for {} (correlation_id={})",
        req.merchant_name, correlation_id
    );

    if req.merchant_name.trim().is_empty() {
        return ApiResponse::fail("Merchant name is required");
    }
    if validate_email(&req.merchant_email).is_err() {
        return ApiResponse::fail("A valid merchant email is required");
    }

    match records.insert_application(req).await {
        Ok(row) => ApiResponse::ok(row),
        Err(e) => {
            error!(
                "[PHASE: applications] [STEP: create] Insert failed (correlation_id={}): {}",
                correlation_id, e
            );
            ApiResponse::fail(format!("Failed to create application: {}", e))
        }
    }
}

pub async fn load_application(
    gateway: &PersistenceGateway,
    application_id: &str,
) -> ApiResponse<LoadedApplication> {
    let correlation_id = Uuid::new_v4().simple().to_string();
    info!(
        "[PHASE: applications] [STEP: load] Loading application {} (correlation_id={})",
        application_id, correlation_id
    );

    match gateway.load(application_id).await {
        Ok(loaded) => ApiResponse::ok(loaded),
        Err(e) => {
            error!(
                "[PHASE: applications] [STEP: load] Load failed for {} (correlation_id={}): {}",
                application_id, correlation_id, e
            );
            ApiResponse::fail(format!("Failed to load application: {}", e))
        }
    }
}

pub async fn decline_application(
    records: &dyn ApplicationRecords,
    application_id: &str,
) -> ApiResponse<()> {
    set_application_status(records, application_id, ApplicationStatus::Declined).await
}

pub async fn remove_application(
    records: &dyn ApplicationRecords,
    application_id: &str,
) -> ApiResponse<()> {
    set_application_status(records, application_id, ApplicationStatus::Removed).await
}

async fn set_application_status(
    records: &dyn ApplicationRecords,
    application_id: &str,
    status: ApplicationStatus,
) -> ApiResponse<()> {
    let correlation_id = Uuid::new_v4().simple().to_string();
    info!(
        "[PHASE: applications] [STEP: set_status] Setting {} to {} (correlation_id={})",
        application_id, status, correlation_id
    );

    if application_id.trim().is_empty() {
        return ApiResponse::fail("Application id is required");
    }

    match records.set_status(application_id, status).await {
        Ok(()) => ApiResponse::ok_with_message((), format!("Application marked {}", status)),
        Err(e) => {
            error!(
                "[PHASE: applications] [STEP: set_status] Update failed for {} (correlation_id={}): {}",
                application_id, correlation_id, e
            );
            ApiResponse::fail(format!("Failed to update application status: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::application::SnapshotSource;
    use crate::models::document::DocumentRecord;
    use crate::persistence::local_cache::LocalCache;
    use async_trait::async_trait;
    use serde_json::json;

    struct NullRecords;

    #[async_trait]
    impl ApplicationRecords for NullRecords {
        async fn insert_application(
            &self,
            req: &CreateApplicationRequest,
        ) -> anyhow::Result<ApplicationRow> {
            Ok(ApplicationRow {
                id: "app-new".to_string(),
                merchant_name: req.merchant_name.clone(),
                merchant_email: req.merchant_email.clone(),
                application_data: json!({}),
                completed: false,
                status: ApplicationStatus::InProgress.as_str().to_string(),
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            })
        }

        async fn fetch_application(&self, _id: &str) -> anyhow::Result<Option<ApplicationRow>> {
            Ok(None)
        }

        async fn update_application_data(
            &self,
            _id: &str,
            _data: &Value,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        async fn list_applications(&self) -> anyhow::Result<Vec<ApplicationRow>> {
            Ok(Vec::new())
        }

        async fn set_status(
            &self,
            _id: &str,
            _status: ApplicationStatus,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        async fn mark_completed(&self, _id: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn list_documents(&self, _merchant_id: &str) -> anyhow::Result<Vec<DocumentRecord>> {
            Ok(Vec::new())
        }
    }

    /// Records whose writes take a while, so a second edit can land while a
    /// save is still in flight.
    struct SlowRecords {
        delay: Duration,
    }

    #[async_trait]
    impl ApplicationRecords for SlowRecords {
        async fn insert_application(
            &self,
            req: &CreateApplicationRequest,
        ) -> anyhow::Result<ApplicationRow> {
            NullRecords.insert_application(req).await
        }

        async fn fetch_application(&self, _id: &str) -> anyhow::Result<Option<ApplicationRow>> {
            Ok(None)
        }

        async fn update_application_data(
            &self,
            _id: &str,
            _data: &Value,
        ) -> anyhow::Result<()> {
            tokio::time::sleep(self.delay).await;
            Ok(())
        }

        async fn list_applications(&self) -> anyhow::Result<Vec<ApplicationRow>> {
            Ok(Vec::new())
        }

        async fn set_status(
            &self,
            _id: &str,
            _status: ApplicationStatus,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        async fn mark_completed(&self, _id: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn list_documents(&self, _merchant_id: &str) -> anyhow::Result<Vec<DocumentRecord>> {
            Ok(Vec::new())
        }
    }

    fn session() -> (tempfile::TempDir, ApplicationSession) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cache = Arc::new(LocalCache::new(tmp.path().join("cache")).expect("cache"));
        let gateway = Arc::new(PersistenceGateway::new(
            Arc::new(NullRecords),
            cache,
            Duration::from_millis(200),
            Duration::from_millis(100),
        ));
        let loaded = LoadedApplication {
            row: None,
            form_data: json!({}),
            progress: 0,
            active_tab: Tab::Business,
            source: SnapshotSource::Remote,
        };
        let session = ApplicationSession::open(
            &loaded,
            "app-1",
            gateway,
            Duration::from_millis(20),
        );
        (tmp, session)
    }

    #[tokio::test]
    async fn create_rejects_blank_name_and_bad_email() {
        let records = NullRecords;
        let bad_name = create_application(
            &records,
            &CreateApplicationRequest {
                merchant_name: "  ".to_string(),
                merchant_email: "owner@acme.test".to_string(),
            },
        )
        .await;
        assert!(!bad_name.success);

        let bad_email = create_application(
            &records,
            &CreateApplicationRequest {
                merchant_name: "Acme".to_string(),
                merchant_email: "not-an-email".to_string(),
            },
        )
        .await;
        assert!(!bad_email.success);

        let ok = create_application(
            &records,
            &CreateApplicationRequest {
                merchant_name: "Acme".to_string(),
                merchant_email: "owner@acme.test".to_string(),
            },
        )
        .await;
        assert!(ok.success);
        assert_eq!(ok.data.expect("row").merchant_name, "Acme");
    }

    #[tokio::test]
    async fn tab_change_updates_progress_and_snapshot_bookkeeping() {
        let (_tmp, mut session) = session();
        let change = session.handle_tab_change(Tab::Financial);
        assert_eq!(change.tab, Tab::Financial);
        assert_eq!(change.progress, 72);
        assert_eq!(session.active_tab(), Tab::Financial);
        assert_eq!(session.progress(), 72);
        assert_eq!(session.store().current_tab(), Tab::Financial);
    }

    #[tokio::test]
    async fn navigation_clamps_at_the_first_and_last_tab() {
        let (_tmp, mut session) = session();
        let back = session.navigate(NavDirection::Back);
        assert_eq!(back.tab, Tab::Business);

        session.handle_tab_change(Tab::Documents);
        let next = session.navigate(NavDirection::Next);
        assert_eq!(next.tab, Tab::Documents);
        assert_eq!(next.progress, 100);
    }

    #[tokio::test]
    async fn confirmed_autosave_resets_the_dirty_baseline() {
        let (_tmp, mut session) = session();
        session.set_field("businessName", json!("Acme"));
        assert!(session.store().is_dirty());

        // Let the debounce window elapse and the save land.
        tokio::time::sleep(Duration::from_millis(120)).await;
        let outcomes = session.pump_outcomes();
        assert!(outcomes
            .iter()
            .any(|o| matches!(o, AutosaveOutcome::Saved(_))));
        assert!(!session.store().is_dirty());
    }

    #[tokio::test]
    async fn edit_during_an_in_flight_save_stays_dirty_after_confirmation() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cache = Arc::new(LocalCache::new(tmp.path().join("cache")).expect("cache"));
        let gateway = Arc::new(PersistenceGateway::new(
            Arc::new(SlowRecords {
                delay: Duration::from_millis(150),
            }),
            cache,
            Duration::from_millis(500),
            Duration::from_millis(100),
        ));
        let loaded = LoadedApplication {
            row: None,
            form_data: json!({}),
            progress: 0,
            active_tab: Tab::Business,
            source: SnapshotSource::Remote,
        };
        let mut session = ApplicationSession::open(
            &loaded,
            "app-1",
            gateway,
            Duration::from_millis(20),
        );

        session.set_field("businessName", json!("Acme"));
        // Let the window close and the slow save start.
        tokio::time::sleep(Duration::from_millis(60)).await;
        session.set_field("businessName", json!("Acme LLC"));

        // Wait out the in-flight save and its confirmation.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let outcomes = session.pump_outcomes();
        assert!(outcomes
            .iter()
            .any(|o| matches!(o, AutosaveOutcome::Saved(_))));

        // The confirmation covered "Acme"; the later edit must survive it.
        assert!(
            session.store().is_dirty(),
            "an edit made during the save must keep the store dirty"
        );
        assert_eq!(
            session.store().get_field("businessName"),
            Some(&json!("Acme LLC"))
        );
    }

    #[tokio::test]
    async fn clean_updates_do_not_arm_the_autosave() {
        let (_tmp, mut session) = session();
        session.set_field("businessName", json!("Acme"));
        tokio::time::sleep(Duration::from_millis(120)).await;
        session.pump_outcomes();

        // Same value again: store stays clean, no new save fires.
        session.set_field("businessName", json!("Acme"));
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(session.pump_outcomes().is_empty());
    }
}
