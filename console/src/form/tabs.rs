// Wizard tab vocabulary for the onboarding form.
//
// The seven panels are fixed; navigation clamps at the first/last tab (no
// wraparound). Tabs whose fields live under a namespaced sub-object declare
// a section key so defaults can be applied uniformly before a save instead
// of special-casing individual tabs in the autosave path.

use serde::{Deserialize, Serialize};

pub const TAB_COUNT: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Business,
    Ownership,
    Operations,
    Marketing,
    Financial,
    Processing,
    Documents,
}

impl Tab {
    pub const ALL: [Tab; TAB_COUNT] = [
        Tab::Business,
        Tab::Ownership,
        Tab::Operations,
        Tab::Marketing,
        Tab::Financial,
        Tab::Processing,
        Tab::Documents,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Tab::Business => "business",
            Tab::Ownership => "ownership",
            Tab::Operations => "operations",
            Tab::Marketing => "marketing",
            Tab::Financial => "financial",
            Tab::Processing => "processing",
            Tab::Documents => "documents",
        }
    }

    pub fn from_id(id: &str) -> Option<Tab> {
        Tab::ALL.iter().copied().find(|t| t.id() == id.trim())
    }

    /// Zero-based position in the wizard.
    pub fn index(&self) -> usize {
        Tab::ALL.iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn from_index(index: usize) -> Option<Tab> {
        Tab::ALL.get(index).copied()
    }

    /// Namespaced sub-object key for tabs that keep their field values under
    /// a single section of the snapshot. Tabs returning `None` write their
    /// fields at the top level.
    pub fn section_key(&self) -> Option<&'static str> {
        match self {
            Tab::Operations => Some("operations"),
            Tab::Financial => Some("financial"),
            Tab::Processing => Some("processing"),
            _ => None,
        }
    }

    /// Next tab, clamped at the last panel.
    pub fn next(&self) -> Tab {
        Tab::from_index(self.index() + 1).unwrap_or(*self)
    }

    /// Previous tab, clamped at the first panel.
    pub fn prev(&self) -> Tab {
        match self.index() {
            0 => *self,
            i => Tab::from_index(i - 1).unwrap_or(*self),
        }
    }
}

impl std::fmt::Display for Tab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}
