//! Editor/catalog state reconciliation

mod alt_titles;

pub use alt_titles::{AltTitlesSync, ExternalUpdate, LocalizedTitle, VersionedTitles};
