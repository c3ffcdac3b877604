// On-device write-ahead cache.
//
// One JSON file per key, mirroring the console's storage keys:
// - `application_<id>.json` — last-known-good form snapshot + navigation
//   bookkeeping, with a `pendingSync` marker until the remote write lands
// - `temp_documents_<id>.json` — metadata array for documents uploaded
//   before the application itself was persisted
//
// Writes are best-effort from the caller's point of view: the gateway logs
// cache errors instead of surfacing them.

use anyhow::{Context, Result};
use chrono::Utc;
use log::warn;
use std::path::{Path, PathBuf};

use crate::models::application::CachedApplicationState;
use crate::models::document::DocumentRecord;
use crate::utils::validation::sanitize_file_name;

const APPLICATION_PREFIX: &str = "application_";
const TEMP_DOCUMENTS_PREFIX: &str = "temp_documents_";

#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
}

impl LocalCache {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create cache folder {:?}", root))?;
        Ok(Self { root })
    }

    /// Cache rooted in the per-user data folder.
    pub fn open_default() -> Result<Self> {
        let root = crate::utils::path_resolver::resolve_data_folder()?.join("cache");
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn application_path(&self, application_id: &str) -> PathBuf {
        self.root.join(format!(
            "{}{}.json",
            APPLICATION_PREFIX,
            sanitize_file_name(application_id)
        ))
    }

    fn temp_documents_path(&self, application_id: &str) -> PathBuf {
        self.root.join(format!(
            "{}{}.json",
            TEMP_DOCUMENTS_PREFIX,
            sanitize_file_name(application_id)
        ))
    }

    // =========================
    // Application snapshots
    // =========================

    pub fn put_application_state(
        &self,
        application_id: &str,
        state: &CachedApplicationState,
    ) -> Result<()> {
        let path = self.application_path(application_id);
        // Stamp the real id into the entry: the file name is sanitized, so
        // scans recover the id from the entry body, not the name.
        let mut entry = state.clone();
        entry.application_id = application_id.to_string();
        let body = serde_json::to_vec_pretty(&entry).context("Failed to serialize cache entry")?;
        std::fs::write(&path, body)
            .with_context(|| format!("Failed to write cache entry {:?}", path))?;
        Ok(())
    }

    pub fn get_application_state(
        &self,
        application_id: &str,
    ) -> Result<Option<CachedApplicationState>> {
        let path = self.application_path(application_id);
        if !path.exists() {
            return Ok(None);
        }
        let body = std::fs::read(&path)
            .with_context(|| format!("Failed to read cache entry {:?}", path))?;
        match serde_json::from_slice::<CachedApplicationState>(&body) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                // A corrupt entry should not wedge the session; treat as absent.
                warn!(
                    "[PHASE: cache] [STEP: read] Discarding unreadable cache entry {:?}: {}",
                    path, e
                );
                Ok(None)
            }
        }
    }

    /// Flip `pendingSync` off after a confirmed remote write. The
    /// `lastUpdated` stamp is preserved.
    pub fn mark_synced(&self, application_id: &str) -> Result<()> {
        if let Some(mut state) = self.get_application_state(application_id)? {
            if state.pending_sync {
                state.pending_sync = false;
                self.put_application_state(application_id, &state)?;
            }
        }
        Ok(())
    }

    pub fn remove_application_state(&self, application_id: &str) -> Result<()> {
        let path = self.application_path(application_id);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove cache entry {:?}", path))?;
        }
        Ok(())
    }

    /// Application ids with unsynced write-ahead entries, for the
    /// reconciliation routine.
    pub fn pending_application_ids(&self) -> Result<Vec<String>> {
        let mut pending = Vec::new();
        for entry in std::fs::read_dir(&self.root)
            .with_context(|| format!("Failed to list cache folder {:?}", self.root))?
        {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(id) = name
                .strip_prefix(APPLICATION_PREFIX)
                .and_then(|rest| rest.strip_suffix(".json"))
            else {
                continue;
            };
            match self.get_application_state(id) {
                Ok(Some(state)) if state.pending_sync => {
                    // Prefer the stamped id; the file-name id is a sanitized
                    // form and only stands in for pre-stamp entries.
                    if state.application_id.is_empty() {
                        pending.push(id.to_string());
                    } else {
                        pending.push(state.application_id);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(
                    "[PHASE: cache] [STEP: scan] Skipping cache entry for {}: {}",
                    id, e
                ),
            }
        }
        pending.sort();
        Ok(pending)
    }

    // =========================
    // Temporary-session documents
    // =========================

    pub fn append_temp_document(
        &self,
        application_id: &str,
        record: &DocumentRecord,
    ) -> Result<()> {
        let mut records = self.temp_documents(application_id)?;
        records.push(record.clone());
        let path = self.temp_documents_path(application_id);
        let body =
            serde_json::to_vec_pretty(&records).context("Failed to serialize temp documents")?;
        std::fs::write(&path, body)
            .with_context(|| format!("Failed to write temp documents {:?}", path))?;
        Ok(())
    }

    pub fn temp_documents(&self, application_id: &str) -> Result<Vec<DocumentRecord>> {
        let path = self.temp_documents_path(application_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let body = std::fs::read(&path)
            .with_context(|| format!("Failed to read temp documents {:?}", path))?;
        serde_json::from_slice(&body)
            .with_context(|| format!("Failed to parse temp documents {:?}", path))
    }

    pub fn clear_temp_documents(&self, application_id: &str) -> Result<()> {
        let path = self.temp_documents_path(application_id);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove temp documents {:?}", path))?;
        }
        Ok(())
    }
}

/// Build a fresh cache entry for a save about to happen.
pub fn cache_entry_for_save(
    form_data: serde_json::Value,
    progress: u8,
    active_tab: &str,
) -> CachedApplicationState {
    CachedApplicationState {
        // Stamped with the real id by `put_application_state`.
        application_id: String::new(),
        form_data,
        progress,
        active_tab: active_tab.to_string(),
        last_updated: Utc::now(),
        pending_sync: true,
    }
}
