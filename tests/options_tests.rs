//! Integrationstests: Optionen-Datei steuert die Edit-Session.

use osm_graph_editor::{parse_entities, EditSession, EngineOptions};
use std::path::PathBuf;

fn temp_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("osm_graph_editor_it_{}_{}", std::process::id(), name))
}

#[test]
fn test_disabled_validation_from_file() {
    let path = temp_file("disabled.toml");
    std::fs::write(&path, "disabled_validations = [\"ambiguous_crossing_tags\"]\n")
        .expect("Schreiben erwartet");
    let options = EngineOptions::load_from_file(&path);
    let _ = std::fs::remove_file(&path);

    let entities =
        parse_entities(include_str!("fixtures/crossing_sample.json")).expect("Fixture");
    let session = EditSession::from_entities(entities, options);
    let issues = session.issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue_type, "dangling_reference");
}

#[test]
fn test_history_depth_from_options() {
    use glam::DVec2;
    use osm_graph_editor::app::actions::MoveNode;
    use osm_graph_editor::EntityId;

    let options = EngineOptions {
        history_max_depth: 2,
        ..EngineOptions::default()
    };
    let entities =
        parse_entities(include_str!("fixtures/crossing_sample.json")).expect("Fixture");
    let mut session = EditSession::from_entities(entities, options);

    for step in 1..=4 {
        let loc = DVec2::new(13.40 + step as f64 * 0.01, 52.5);
        session.perform(&MoveNode::new(EntityId::point(6), loc), Some("Bank verschieben"));
    }
    assert!(session.undo().is_some());
    assert!(session.undo().is_some());
    assert!(session.undo().is_none(), "Nur zwei Schritte dürfen erhalten bleiben");
}
