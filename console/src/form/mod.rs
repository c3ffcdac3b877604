// Wizard form state: snapshot store, tab vocabulary, progress derivation,
// and navigation planning.

pub mod navigation;
pub mod progress;
pub mod store;
pub mod tabs;
