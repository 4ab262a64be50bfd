//! Writer für JSON-Entity-Bestände und Issue-Listen.

use anyhow::Result;

use super::record::EntityRecord;
use crate::app::validation::Issue;
use crate::core::Graph;

/// Schreibt alle lebenden Entities des Graphen, sortiert nach ID.
pub fn write_entities(graph: &Graph) -> Result<String> {
    let mut records: Vec<EntityRecord> = graph.entities().map(|e| EntityRecord::from(&**e)).collect();
    records.sort_by_key(|r| r.id);
    let json = serde_json::to_string_pretty(&records)?;
    log::info!("{} Entities als JSON geschrieben", records.len());
    Ok(json)
}

/// Schreibt Issues als JSON-Array.
pub fn write_issues(issues: &[Issue]) -> Result<String> {
    Ok(serde_json::to_string_pretty(issues)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{tags_from, Entity, EntityId, Tags};
    use crate::json::parse_entities;
    use glam::DVec2;

    #[test]
    fn test_written_graph_parses_back() {
        let graph = Graph::new([
            Entity::point(EntityId::point(2), DVec2::new(1.0, 2.0), tags_from([("amenity", "bench")])),
            Entity::point(EntityId::point(1), DVec2::ZERO, Tags::new()),
            Entity::line(
                EntityId::line(1),
                vec![EntityId::point(1), EntityId::point(2)],
                Tags::new(),
            ),
        ])
        .remove(EntityId::point(1));

        let json = write_entities(&graph).expect("Export erwartet");
        let parsed = parse_entities(&json).expect("Import erwartet");

        let ids: Vec<EntityId> = parsed.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![EntityId::point(2), EntityId::line(1)]);
        assert_eq!(parsed[0].tag("amenity"), Some("bench"));
        // hängende Referenz bleibt erhalten
        assert_eq!(parsed[1].nodes(), &[EntityId::point(1), EntityId::point(2)]);
    }
}
