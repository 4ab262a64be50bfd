//! Geteilte Typen für layer-übergreifende Verträge.
//!
//! Enthält die Konfiguration, die Session, Binary und Tests teilen.

pub mod options;

pub use options::EngineOptions;
pub use options::{HISTORY_MAX_DEPTH, TAG_VALUE_MAX_CHARS, TREE_LEVEL_BASE};
