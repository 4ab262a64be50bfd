//! Zentrale Konfiguration der Edit-Engine.
//!
//! `EngineOptions` enthält alle zur Laufzeit änderbaren Werte.
//! Die `const`-Werte bleiben als Fallback/Default erhalten.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ── History ─────────────────────────────────────────────────────────

/// Maximale Anzahl Undo-Schritte (0 = unbegrenzt).
pub const HISTORY_MAX_DEPTH: usize = 0;

// ── Tags ────────────────────────────────────────────────────────────

/// Längenbudget zusammengeführter Tag-Werte in Unicode-Codepoints.
pub const TAG_VALUE_MAX_CHARS: usize = crate::core::MAX_TAG_VALUE_CHARS;

// ── Spatial-Index ───────────────────────────────────────────────────

/// Kleinste Größenklasse des Spatial-Index (Welteinheiten, typ. Grad).
pub const TREE_LEVEL_BASE: f64 = crate::core::tree::DEFAULT_LEVEL_BASE;

/// Alle zur Laufzeit änderbaren Engine-Optionen.
/// Wird als `osm_graph_editor.toml` neben der Binary gespeichert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOptions {
    // ── History ─────────────────────────────────────────────────
    /// Maximale Anzahl Edits über dem Basiszustand (0 = unbegrenzt)
    #[serde(default = "default_history_max_depth")]
    pub history_max_depth: usize,

    // ── Tags ────────────────────────────────────────────────────
    /// Längenbudget beim Zusammenführen von Tag-Werten
    #[serde(default = "default_tag_value_max_chars")]
    pub tag_value_max_chars: usize,

    // ── Validierung ─────────────────────────────────────────────
    /// Nach jeder Änderung sofort validieren (sonst erst bei `validate_pending`)
    #[serde(default = "default_validate_eagerly")]
    pub validate_eagerly: bool,
    /// Abgeschaltete Validatoren (Typ-Schlüssel)
    #[serde(default)]
    pub disabled_validations: Vec<String>,

    // ── Spatial-Index ───────────────────────────────────────────
    /// Kleinste Größenklasse des Tree
    #[serde(default = "default_tree_level_base")]
    pub tree_level_base: f64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            history_max_depth: HISTORY_MAX_DEPTH,
            tag_value_max_chars: TAG_VALUE_MAX_CHARS,
            validate_eagerly: true,
            disabled_validations: Vec::new(),
            tree_level_base: TREE_LEVEL_BASE,
        }
    }
}

fn default_history_max_depth() -> usize {
    HISTORY_MAX_DEPTH
}

fn default_tag_value_max_chars() -> usize {
    TAG_VALUE_MAX_CHARS
}

fn default_validate_eagerly() -> bool {
    true
}

fn default_tree_level_base() -> f64 {
    TREE_LEVEL_BASE
}

impl EngineOptions {
    /// Lädt Optionen aus einer TOML-Datei. Bei Fehler: Standardwerte.
    pub fn load_from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<EngineOptions>(&content) {
                Ok(opts) => {
                    log::info!("Optionen geladen aus: {}", path.display());
                    opts.sanitized()
                }
                Err(e) => {
                    log::warn!("Optionen-Datei fehlerhaft, verwende Standardwerte: {}", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("Keine Optionen-Datei gefunden, verwende Standardwerte");
                Self::default()
            }
        }
    }

    /// Speichert Optionen als TOML-Datei.
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        log::info!("Optionen gespeichert nach: {}", path.display());
        Ok(())
    }

    /// Ermittelt den Pfad zur Optionen-Datei neben der Binary.
    pub fn config_path() -> PathBuf {
        std::env::current_exe()
            .unwrap_or_else(|_| PathBuf::from("osm-graph-check"))
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("osm_graph_editor.toml")
    }

    /// Ersetzt unbrauchbare Werte durch Standardwerte.
    fn sanitized(mut self) -> Self {
        if self.tag_value_max_chars == 0 {
            log::warn!("tag_value_max_chars = 0 ist ungültig, verwende {}", TAG_VALUE_MAX_CHARS);
            self.tag_value_max_chars = TAG_VALUE_MAX_CHARS;
        }
        if !(self.tree_level_base.is_finite() && self.tree_level_base > 0.0) {
            log::warn!(
                "tree_level_base = {} ist ungültig, verwende {}",
                self.tree_level_base,
                TREE_LEVEL_BASE
            );
            self.tree_level_base = TREE_LEVEL_BASE;
        }
        self
    }
}
