// Persistence gateway: the dual-write save path.
//
// Every save writes the snapshot to the on-device cache first (write-ahead,
// best-effort) and then races the remote update against a timeout. The
// single-flight guard is keyed by application id and shared process-wide,
// so two mounted views of the same application serialize their saves; a
// concurrent second call short-circuits to a no-op outcome instead of
// queueing. Two different processes writing the same id remain an accepted
// last-write-wins race.

use log::{info, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

use crate::form::tabs::Tab;
use crate::models::application::SnapshotSource;
use crate::models::requests::SaveApplicationRequest;
use crate::models::responses::{LoadedApplication, ReconcileReport};
use crate::remote::records::ApplicationRecords;
use crate::utils::validation::validate_application_id;

use super::local_cache::{cache_entry_for_save, LocalCache};

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Application id is required")]
    MissingApplicationId,
    #[error("Remote save timed out after {0:?}; local copy retained")]
    RemoteTimeout(Duration),
    #[error("Remote save failed; local copy retained")]
    Remote(#[source] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Another save for the same application id was already in flight; this
    /// call did nothing.
    SkippedInFlight,
}

pub struct PersistenceGateway {
    records: Arc<dyn ApplicationRecords>,
    cache: Arc<LocalCache>,
    save_timeout: Duration,
    close_timeout: Duration,
    in_flight: Mutex<HashSet<String>>,
}

/// Removes the id from the in-flight set when the save finishes, including
/// on early returns.
struct FlightGuard<'a> {
    gateway: &'a PersistenceGateway,
    id: String,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.gateway.in_flight.lock() {
            set.remove(&self.id);
        }
    }
}

impl PersistenceGateway {
    pub fn new(
        records: Arc<dyn ApplicationRecords>,
        cache: Arc<LocalCache>,
        save_timeout: Duration,
        close_timeout: Duration,
    ) -> Self {
        Self {
            records,
            cache,
            save_timeout,
            close_timeout,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Dual-write save raced against the regular (3 s) timeout.
    pub async fn save(&self, req: &SaveApplicationRequest) -> Result<SaveOutcome, SaveError> {
        self.save_with_timeout(req, self.save_timeout).await
    }

    /// Final best-effort save on session close, raced against the shorter
    /// (2 s) window.
    pub async fn save_on_close(&self, req: &SaveApplicationRequest) -> Result<SaveOutcome, SaveError> {
        self.save_with_timeout(req, self.close_timeout).await
    }

    async fn save_with_timeout(
        &self,
        req: &SaveApplicationRequest,
        window: Duration,
    ) -> Result<SaveOutcome, SaveError> {
        validate_application_id(&req.application_id)
            .map_err(|_| SaveError::MissingApplicationId)?;

        let _guard = match self.try_begin(&req.application_id) {
            Some(guard) => guard,
            None => {
                info!(
                    "[PHASE: persistence] [STEP: single_flight] Save already in flight for {}; skipping",
                    req.application_id
                );
                return Ok(SaveOutcome::SkippedInFlight);
            }
        };

        // Write-ahead: the local copy stands for this session even when the
        // remote write fails.
        let entry = cache_entry_for_save(req.form_data.clone(), req.progress, req.active_tab.id());
        if let Err(e) = self.cache.put_application_state(&req.application_id, &entry) {
            warn!(
                "[PHASE: persistence] [STEP: cache_write] Cache write failed for {}: {}",
                req.application_id, e
            );
        }

        match timeout(
            window,
            self.records
                .update_application_data(&req.application_id, &req.form_data),
        )
        .await
        {
            Ok(Ok(())) => {
                if let Err(e) = self.cache.mark_synced(&req.application_id) {
                    warn!(
                        "[PHASE: persistence] [STEP: mark_synced] Failed for {}: {}",
                        req.application_id, e
                    );
                }
                Ok(SaveOutcome::Saved)
            }
            Ok(Err(e)) => {
                warn!(
                    "[PHASE: persistence] [STEP: remote_write] Remote save failed for {}: {}",
                    req.application_id, e
                );
                Err(SaveError::Remote(e))
            }
            Err(_) => {
                warn!(
                    "[PHASE: persistence] [STEP: remote_write] Remote save timed out for {} after {:?}",
                    req.application_id, window
                );
                Err(SaveError::RemoteTimeout(window))
            }
        }
    }

    fn try_begin(&self, application_id: &str) -> Option<FlightGuard<'_>> {
        let mut set = self.in_flight.lock().ok()?;
        if !set.insert(application_id.to_string()) {
            return None;
        }
        Some(FlightGuard {
            gateway: self,
            id: application_id.to_string(),
        })
    }

    /// Load an application for editing. The cached local copy, when one
    /// exists, wins over the remote blob for the snapshot/progress/tab trio.
    pub async fn load(&self, application_id: &str) -> anyhow::Result<LoadedApplication> {
        validate_application_id(application_id)?;

        let row = self.records.fetch_application(application_id).await?;
        let local = self.cache.get_application_state(application_id).unwrap_or_else(|e| {
            warn!(
                "[PHASE: persistence] [STEP: load] Cache read failed for {}: {}",
                application_id, e
            );
            None
        });

        if let Some(state) = local {
            let active_tab = Tab::from_id(&state.active_tab).unwrap_or(Tab::Business);
            return Ok(LoadedApplication {
                row,
                form_data: state.form_data,
                progress: state.progress,
                active_tab,
                source: SnapshotSource::Local,
            });
        }

        let (form_data, progress, active_tab) = match &row {
            Some(row) => {
                let blob = row.application_data.clone();
                let active_tab = blob
                    .get(crate::form::store::CURRENT_TAB_KEY)
                    .and_then(|v| v.as_str())
                    .and_then(Tab::from_id)
                    .unwrap_or(Tab::Business);
                let progress = blob
                    .get(crate::form::store::PROGRESS_KEY)
                    .and_then(Value::as_u64)
                    .map(|p| p.min(100) as u8)
                    .unwrap_or(0);
                (blob, progress, active_tab)
            }
            None => (serde_json::json!({}), 0, Tab::Business),
        };

        Ok(LoadedApplication {
            row,
            form_data,
            progress,
            active_tab,
            source: SnapshotSource::Remote,
        })
    }

    /// Push every unsynced write-ahead entry to the record store. Run at
    /// startup/reconnect; replaces scattered "local wins" checks with one
    /// reconciliation routine.
    pub async fn reconcile(&self) -> anyhow::Result<ReconcileReport> {
        let pending = self.cache.pending_application_ids()?;
        let mut report = ReconcileReport {
            pending: pending.len(),
            ..Default::default()
        };

        for id in pending {
            let Some(state) = self.cache.get_application_state(&id)? else {
                continue;
            };
            match timeout(
                self.save_timeout,
                self.records.update_application_data(&id, &state.form_data),
            )
            .await
            {
                Ok(Ok(())) => {
                    if let Err(e) = self.cache.mark_synced(&id) {
                        warn!(
                            "[PHASE: reconcile] [STEP: mark_synced] Failed for {}: {}",
                            id, e
                        );
                    }
                    info!("[PHASE: reconcile] [STEP: push] Pushed pending snapshot for {}", id);
                    report.pushed.push(id);
                }
                Ok(Err(e)) => {
                    warn!("[PHASE: reconcile] [STEP: push] Remote write failed for {}: {}", id, e);
                    report.failed.push(id);
                }
                Err(_) => {
                    warn!("[PHASE: reconcile] [STEP: push] Timed out for {}", id);
                    report.failed.push(id);
                }
            }
        }

        Ok(report)
    }
}
