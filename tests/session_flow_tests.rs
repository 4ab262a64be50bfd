//! Integrationstests für den Edit-Ablauf über die Session:
//! - Perform/Undo/Redo stellt exakt den vorherigen Graphen wieder her
//! - Tree folgt verschobenen Entities
//! - Hintergrund-Laden mit Tickets
//! - Crossing-Validierung inkl. Korrektur

use glam::DVec2;
use osm_graph_editor::app::actions::{DeleteEntity, ExtractPoint, MoveNode};
use osm_graph_editor::app::ChangeKind;
use osm_graph_editor::core::tags_from;
use osm_graph_editor::{
    parse_entities, BBox, Difference, EditSession, EngineOptions, Entity, EntityId, EntityKind,
    Severity, Tags,
};

fn p(raw: i64) -> EntityId {
    EntityId::point(raw)
}

fn w(raw: i64) -> EntityId {
    EntityId::line(raw)
}

/// Session über dem Kreuzungs-Beispiel (Straße w1, Übergang w2, Stichweg w3).
fn sample_session() -> EditSession {
    let json = include_str!("fixtures/crossing_sample.json");
    let entities = parse_entities(json).expect("Fixture muss gültig sein");
    EditSession::from_entities(entities, EngineOptions::default())
}

fn around(loc: DVec2) -> BBox {
    BBox::new(loc - DVec2::splat(1e-5), loc + DVec2::splat(1e-5))
}

// ─── Undo / Redo ─────────────────────────────────────────────────────

#[test]
fn test_undo_restores_exact_previous_graph() {
    let mut session = sample_session();
    let before = session.graph().clone();

    let new_id = session.next_id(EntityKind::Point);
    let extract = ExtractPoint::new(p(2), new_id).with_loc(DVec2::new(13.4011, 52.5002));
    let event = session
        .perform(&extract, Some("Punkt herauslösen"))
        .expect("Perform muss eine Änderung melden");
    assert_eq!(event.kind, ChangeKind::Perform);
    assert!(session.graph().entity(new_id).is_some(), "Ersatz-Vertex erwartet");
    assert_eq!(session.graph().entity(w(1)).expect("w1").nodes()[1], new_id);

    let undo = session.undo().expect("Undo muss möglich sein");
    assert_eq!(undo.annotation.as_deref(), Some("Punkt herauslösen"));
    assert!(
        Difference::new(&before, session.graph()).is_empty(),
        "Nach Undo muss der Graph dem Ausgangszustand entsprechen"
    );
    assert!(session.graph().entity(new_id).is_none());

    session.redo().expect("Redo muss möglich sein");
    assert!(session.graph().entity(new_id).is_some());
    assert!(!session.history().can_redo());
}

#[test]
fn test_batch_is_one_undo_step() {
    let mut session = sample_session();
    let before = session.graph().clone();

    let (_, event) = session.batch(|s| {
        s.perform(&MoveNode::new(p(6), DVec2::new(13.5, 52.6)), Some("Bank verschieben"));
        s.perform(&DeleteEntity::new(w(3)), Some("Stichweg löschen"));
    });
    let event = event.expect("Batch muss ein Sammel-Ereignis liefern");
    assert_eq!(event.kind, ChangeKind::Batch);
    assert!(event.changed_ids().contains(&p(6)));
    assert!(event.changed_ids().contains(&w(3)));

    session.undo();
    session.undo();
    assert!(Difference::new(&before, session.graph()).is_empty());
}

// ─── Tree ────────────────────────────────────────────────────────────

#[test]
fn test_tree_follows_moved_point() {
    let mut session = sample_session();
    let old_loc = DVec2::new(13.4030, 52.5010);
    let new_loc = DVec2::new(13.5000, 52.6000);
    assert!(session.query(&around(old_loc)).iter().any(|e| e.id() == p(6)));

    session.perform(&MoveNode::new(p(6), new_loc), Some("Bank verschieben"));
    assert!(
        !session.query(&around(old_loc)).iter().any(|e| e.id() == p(6)),
        "Alter Ort darf den Point nicht mehr liefern"
    );
    assert!(session.query(&around(new_loc)).iter().any(|e| e.id() == p(6)));

    session.undo();
    assert!(session.query(&around(old_loc)).iter().any(|e| e.id() == p(6)));
    assert!(!session.query(&around(new_loc)).iter().any(|e| e.id() == p(6)));
}

#[test]
fn test_tree_reindexes_lines_of_moved_vertex() {
    let mut session = sample_session();
    let far = DVec2::new(14.0, 53.0);
    session.perform(&MoveNode::new(p(3), far), Some("Vertex verschieben"));

    let ids: Vec<EntityId> = session.query(&around(far)).iter().map(|e| e.id()).collect();
    assert!(ids.contains(&p(3)));
    assert!(ids.contains(&w(1)), "Eltern-Line muss neue Ausdehnung haben");
}

// ─── Laden ───────────────────────────────────────────────────────────

#[test]
fn test_complete_load_resolves_dangling_reference() {
    let mut session = sample_session();
    assert!(session.has_errors_for_test());

    let ticket = session.begin_load();
    let loaded = vec![Entity::point(p(9), DVec2::new(13.4040, 52.5000), Tags::new())];
    assert!(session.complete_load(ticket, &loaded));

    assert!(session.graph().base_entity(p(9)).is_some(), "Geladenes gehört zur Basis");
    assert!(session.query(&around(DVec2::new(13.4040, 52.5000))).iter().any(|e| e.id() == p(9)));
    assert!(!session.has_errors_for_test());
}

#[test]
fn test_superseded_load_is_discarded() {
    let mut session = sample_session();
    let first = session.begin_load();
    let second = session.begin_load();

    let loaded = vec![Entity::point(p(9), DVec2::ZERO, Tags::new())];
    assert!(!session.complete_load(first, &loaded), "Verdrängtes Ticket");
    assert!(session.graph().entity(p(9)).is_none());

    session.abort_load(second);
    assert!(!session.complete_load(second, &loaded), "Abgebrochenes Ticket");
    assert!(session.graph().entity(p(9)).is_none());
}

#[test]
fn test_load_keeps_local_edits() {
    let mut session = sample_session();
    session.merge_tags(p(6), &tags_from([("backrest", "yes")]), Some("Lehne"));

    let ticket = session.begin_load();
    let stale = Entity::point(p(6), DVec2::new(13.4030, 52.5010), tags_from([("amenity", "bench")]));
    assert!(session.complete_load(ticket, &[stale]));

    let bench = session.graph().entity(p(6)).expect("Bank");
    assert_eq!(bench.tag("backrest"), Some("yes"), "Lokale Änderung bleibt erhalten");
}

// ─── Validierung ─────────────────────────────────────────────────────

#[test]
fn test_crossing_issue_and_fix() {
    let mut session = sample_session();
    let crossing: Vec<_> = session
        .issues()
        .into_iter()
        .filter(|i| i.issue_type == "ambiguous_crossing_tags")
        .collect();
    assert_eq!(crossing.len(), 1, "Genau ein Crossing-Issue erwartet");
    let issue = &crossing[0];
    assert_eq!(issue.key, "ambiguous_crossing_tags-w1,w2-n2");
    assert_eq!(issue.severity, Severity::Warning);
    assert_eq!(issue.entity_ids, vec![w(1), w(2)]);

    let fix = issue.fixes.first().expect("Korrektur erwartet").action();
    session.perform(&fix, Some("Markierung angleichen"));
    assert!(session
        .issues()
        .iter()
        .all(|i| i.issue_type != "ambiguous_crossing_tags"));

    session.undo();
    assert!(session
        .issues()
        .iter()
        .any(|i| i.key == "ambiguous_crossing_tags-w1,w2-n2"));
}

#[test]
fn test_lazy_validation_waits_for_pending() {
    let options = EngineOptions {
        validate_eagerly: false,
        ..EngineOptions::default()
    };
    let json = include_str!("fixtures/crossing_sample.json");
    let mut session =
        EditSession::from_entities(parse_entities(json).expect("Fixture"), options);
    assert!(session.issues().is_empty());
    assert!(session.has_pending_validation());

    session.validate_pending();
    assert!(!session.has_pending_validation());
    assert_eq!(session.issues().len(), 2);
}

/// Kurzform für Tests: gibt es noch Fehler (nicht nur Warnungen)?
trait SessionExt {
    fn has_errors_for_test(&self) -> bool;
}

impl SessionExt for EditSession {
    fn has_errors_for_test(&self) -> bool {
        self.issues().iter().any(|i| i.severity == Severity::Error)
    }
}
