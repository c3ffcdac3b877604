// Tab navigation planning.
//
// The session layer fires the persistence save; this module only decides
// which tab becomes active and what the resulting progress is. The save is
// intentionally not awaited before the switch (matching the console's UX
// contract), so two fast navigations can interleave their dual-writes —
// each write is per-call best-effort with no cross-call ordering guarantee.

use super::progress::progress_for_tab;
use super::store::FormStore;
use super::tabs::Tab;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavDirection {
    Back,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabChange {
    pub tab: Tab,
    pub progress: u8,
}

/// Adjacent tab in the given direction, clamped at the wizard edges.
pub fn adjacent(current: Tab, direction: NavDirection) -> Tab {
    match direction {
        NavDirection::Back => current.prev(),
        NavDirection::Next => current.next(),
    }
}

/// Prepare the store for a tab switch: apply section defaults, record the
/// new tab and derived progress inside the snapshot, and report both so the
/// caller can dispatch the save.
pub fn plan_tab_change(store: &mut FormStore, target: Tab) -> TabChange {
    store.apply_section_defaults();
    let progress = progress_for_tab(target);
    store.set_current_tab(target);
    store.set_progress(progress);
    TabChange {
        tab: target,
        progress,
    }
}
