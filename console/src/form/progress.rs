// Progress derivation.
//
// The primary source is the active tab position: ceil((index + 1) / total * 100).
// The dashboard falls back to counting populated top-level sections when a
// record's blob carries no progress value.

use serde_json::{Map, Value};

use super::store::FormStore;
use super::tabs::{Tab, TAB_COUNT};

/// Percentage for a tab position: `ceil((index + 1) / TAB_COUNT * 100)`.
pub fn progress_for_tab(tab: Tab) -> u8 {
    let numerator = (tab.index() + 1) * 100;
    ((numerator + TAB_COUNT - 1) / TAB_COUNT) as u8
}

/// Percentage from the count of populated top-level sections.
pub fn progress_from_store(store: &FormStore) -> u8 {
    section_progress(store.populated_sections())
}

/// Same derivation for an already-fetched application-data blob.
pub fn progress_from_blob(blob: &Map<String, Value>) -> u8 {
    let populated = blob
        .iter()
        .filter(|(key, value)| {
            key.as_str() != super::store::CURRENT_TAB_KEY
                && key.as_str() != super::store::PROGRESS_KEY
                && match value {
                    Value::Null => false,
                    Value::String(s) => !s.trim().is_empty(),
                    Value::Object(o) => !o.is_empty(),
                    Value::Array(a) => !a.is_empty(),
                    _ => true,
                }
        })
        .count();
    section_progress(populated)
}

fn section_progress(populated: usize) -> u8 {
    let populated = populated.min(TAB_COUNT);
    ((populated * 100 + TAB_COUNT - 1) / TAB_COUNT) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tab_progress_matches_ceiling_formula() {
        assert_eq!(progress_for_tab(Tab::Business), 15); // ceil(1/7*100)
        assert_eq!(progress_for_tab(Tab::Ownership), 29); // ceil(2/7*100)
        assert_eq!(progress_for_tab(Tab::Operations), 43);
        assert_eq!(progress_for_tab(Tab::Marketing), 58);
        assert_eq!(progress_for_tab(Tab::Financial), 72);
        assert_eq!(progress_for_tab(Tab::Processing), 86);
        assert_eq!(progress_for_tab(Tab::Documents), 100);
    }

    #[test]
    fn tab_progress_is_monotone_in_tab_order() {
        let values: Vec<u8> = Tab::ALL.iter().map(|t| progress_for_tab(*t)).collect();
        for pair in values.windows(2) {
            assert!(pair[0] < pair[1], "progress must increase tab to tab: {:?}", values);
        }
    }

    #[test]
    fn section_fallback_counts_populated_sections() {
        let blob = json!({
            "businessName": "Acme",
            "financial": { "bankName": "First" },
            "operations": {},
            "progress": 86,
            "currentTab": "processing"
        });
        let blob = blob.as_object().cloned().unwrap();
        // Two populated sections out of seven.
        assert_eq!(progress_from_blob(&blob), 29);
    }

    #[test]
    fn section_fallback_saturates_at_100() {
        assert_eq!(section_progress(TAB_COUNT), 100);
        assert_eq!(section_progress(TAB_COUNT + 3), 100);
        assert_eq!(section_progress(0), 0);
    }
}
