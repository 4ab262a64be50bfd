//! Parser für JSON-Entity-Bestände.

use std::collections::HashSet;

use anyhow::{bail, Context, Result};

use super::record::EntityRecord;
use crate::core::Entity;

/// Parsed einen Entity-Bestand aus einem JSON-String.
///
/// Doppelte IDs und Points ohne Koordinate sind Fehler. Verweise auf nicht
/// enthaltene Entities sind erlaubt und werden von der Validierung gemeldet.
pub fn parse_entities(json_content: &str) -> Result<Vec<Entity>> {
    let records: Vec<EntityRecord> =
        serde_json::from_str(json_content).context("JSON-Array mit Entity-Records erwartet")?;

    let mut seen = HashSet::with_capacity(records.len());
    let mut entities = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let id = record.id;
        if !seen.insert(id) {
            bail!("Doppelte Entity-ID {} (Eintrag {})", id, index);
        }
        let entity = Entity::try_from(record)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Eintrag {} ungültig", index))?;
        entities.push(entity);
    }

    log::info!("{} Entities aus JSON gelesen", entities.len());
    Ok(entities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EntityId, EntityKind};
    use glam::DVec2;

    const SAMPLE: &str = r#"[
        {"id": "n1", "loc": [0.0, 0.0]},
        {"id": "n2", "loc": [1.0, 0.5], "tags": {"highway": "crossing"}},
        {"id": "w1", "nodes": ["n1", "n2"], "tags": {"highway": "footway", "footway": "crossing"}},
        {"id": "r1", "members": [{"id": "w1", "role": "outer"}, {"id": "n2"}], "tags": {"type": "route"}}
    ]"#;

    #[test]
    fn test_parse_sample() {
        let entities = parse_entities(SAMPLE).expect("gültiger Bestand");
        assert_eq!(entities.len(), 4);

        assert_eq!(entities[1].loc(), Some(DVec2::new(1.0, 0.5)));
        assert_eq!(entities[1].tag("highway"), Some("crossing"));
        assert_eq!(entities[2].kind(), EntityKind::Line);
        assert_eq!(entities[2].nodes(), &[EntityId::point(1), EntityId::point(2)]);
        assert_eq!(entities[3].members().len(), 2);
        assert_eq!(entities[3].members()[1].role, "");
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let result = parse_entities(r#"[{"id": "n1", "loc": [0, 0]}, {"id": "n1", "loc": [1, 1]}]"#);
        let message = format!("{:#}", result.expect_err("Fehler erwartet"));
        assert!(message.contains("Doppelte Entity-ID n1"));
    }

    #[test]
    fn test_point_without_loc_is_rejected() {
        let result = parse_entities(r#"[{"id": "n7"}]"#);
        let message = format!("{:#}", result.expect_err("Fehler erwartet"));
        assert!(message.contains("n7"));
    }

    #[test]
    fn test_invalid_id_prefix_is_rejected() {
        assert!(parse_entities(r#"[{"id": "x1"}]"#).is_err());
        assert!(parse_entities("{}").is_err());
    }
}
