// Form data store.
//
// Holds the full wizard snapshot (a top-level JSON object) plus the copy
// recorded at the last successful save. Dirtiness is structural equality
// between the two, NOT string-serialization equality, so key ordering and
// formatting can never produce a spurious dirty flag.

use serde_json::{Map, Value};

use super::tabs::Tab;

/// Snapshot keys maintained by the console itself rather than by a tab panel.
pub const CURRENT_TAB_KEY: &str = "currentTab";
pub const PROGRESS_KEY: &str = "progress";

#[derive(Debug, Clone, Default)]
pub struct FormStore {
    snapshot: Map<String, Value>,
    last_saved: Map<String, Value>,
    dirty: bool,
}

impl FormStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a previously persisted snapshot. The loaded state is
    /// treated as the last-saved baseline, so a fresh session starts clean.
    pub fn from_snapshot(snapshot: Map<String, Value>) -> Self {
        Self {
            last_saved: snapshot.clone(),
            snapshot,
            dirty: false,
        }
    }

    pub fn snapshot(&self) -> &Map<String, Value> {
        &self.snapshot
    }

    pub fn snapshot_value(&self) -> Value {
        Value::Object(self.snapshot.clone())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Shallow top-level merge of `partial` into the snapshot. Sets the
    /// dirty flag only when the merged result actually differs from the
    /// last-saved snapshot.
    pub fn update_form_data(&mut self, partial: Map<String, Value>) {
        for (key, value) in partial {
            self.snapshot.insert(key, value);
        }
        self.recompute_dirty();
    }

    /// Clears the dirty flag and records the current snapshot as the new
    /// last-saved baseline.
    pub fn reset_dirty_state(&mut self) {
        self.last_saved = self.snapshot.clone();
        self.dirty = false;
    }

    /// Record what a confirmed save actually wrote. Unlike
    /// `reset_dirty_state`, edits made while that save was in flight keep
    /// the store dirty.
    pub fn record_saved_snapshot(&mut self, saved: Map<String, Value>) {
        self.last_saved = saved;
        self.recompute_dirty();
    }

    /// Set a single field by dotted path (e.g. `financial.bank_name`),
    /// creating intermediate objects as needed. This is the per-field
    /// binding surface the tab panels write through.
    pub fn set_field(&mut self, path: &str, value: Value) {
        let parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();
        if parts.is_empty() {
            return;
        }

        if parts.len() == 1 {
            self.snapshot.insert(parts[0].to_string(), value);
            self.recompute_dirty();
            return;
        }

        let mut current = self
            .snapshot
            .entry(parts[0].to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        for part in &parts[1..parts.len() - 1] {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            let obj = match current.as_object_mut() {
                Some(obj) => obj,
                None => return,
            };
            current = obj
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        if let Some(obj) = current.as_object_mut() {
            obj.insert(parts[parts.len() - 1].to_string(), value);
        }
        self.recompute_dirty();
    }

    /// Read a single field by dotted path.
    pub fn get_field(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.').filter(|p| !p.is_empty());
        let first = parts.next()?;
        let mut current = self.snapshot.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// Active tab as recorded inside the snapshot (defaults to the first
    /// panel when absent or unparseable).
    pub fn current_tab(&self) -> Tab {
        self.snapshot
            .get(CURRENT_TAB_KEY)
            .and_then(|v| v.as_str())
            .and_then(Tab::from_id)
            .unwrap_or(Tab::Business)
    }

    pub fn set_current_tab(&mut self, tab: Tab) {
        self.snapshot
            .insert(CURRENT_TAB_KEY.to_string(), Value::String(tab.id().to_string()));
        self.recompute_dirty();
    }

    pub fn set_progress(&mut self, progress: u8) {
        self.snapshot
            .insert(PROGRESS_KEY.to_string(), Value::from(progress));
        self.recompute_dirty();
    }

    /// Apply declared section defaults uniformly: every tab that keeps its
    /// fields under a namespaced sub-object gets an empty object when the
    /// section is absent. Runs before each save.
    pub fn apply_section_defaults(&mut self) {
        for tab in Tab::ALL {
            if let Some(key) = tab.section_key() {
                self.snapshot
                    .entry(key.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
            }
        }
        self.recompute_dirty();
    }

    /// Count of top-level sections that hold actual data, ignoring the
    /// console bookkeeping keys. Used as the fallback progress source.
    pub fn populated_sections(&self) -> usize {
        self.snapshot
            .iter()
            .filter(|(key, value)| {
                key.as_str() != CURRENT_TAB_KEY
                    && key.as_str() != PROGRESS_KEY
                    && is_populated(value)
            })
            .count()
    }

    fn recompute_dirty(&mut self) {
        self.dirty = self.snapshot != self.last_saved;
    }
}

fn is_populated(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Array(a) => !a.is_empty(),
        _ => true,
    }
}
