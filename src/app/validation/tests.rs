use super::*;
use crate::core::{tags_from, Entity, EntityPatch};
use glam::DVec2;

fn p(raw: i64) -> EntityId {
    EntityId::point(raw)
}

fn w(raw: i64) -> EntityId {
    EntityId::line(raw)
}

/// Fußweg-Übergang w1 über Straße w2 an Point 2, Markierung widersprüchlich.
fn conflicting_crossing() -> Graph {
    Graph::new([
        Entity::point(p(1), DVec2::new(0.0, 0.0), Tags::new()),
        Entity::point(p(2), DVec2::new(1.0, 0.0), tags_from([("crossing:markings", "yes")])),
        Entity::point(p(3), DVec2::new(2.0, 0.0), Tags::new()),
        Entity::point(p(4), DVec2::new(1.0, -1.0), Tags::new()),
        Entity::point(p(5), DVec2::new(1.0, 1.0), Tags::new()),
        Entity::line(
            w(1),
            vec![p(1), p(2), p(3)],
            tags_from([("highway", "footway"), ("footway", "crossing"), ("crossing", "unmarked")]),
        ),
        Entity::line(w(2), vec![p(4), p(2), p(5)], tags_from([("highway", "residential")])),
    ])
}

#[test]
fn test_issue_key_is_order_independent() {
    let a = Issue::new("x", Severity::Warning, vec![w(2), w(1)], Some("n5"));
    let b = Issue::new("x", Severity::Warning, vec![w(1), w(2)], Some("n5"));
    assert_eq!(a.key, b.key);
    assert_eq!(a.key, "x-w1,w2-n5");
    assert_eq!(a.entity_ids, vec![w(1), w(2)]);
}

#[test]
fn test_validate_all_dedups_by_key() {
    let graph = conflicting_crossing();
    let mut engine = ValidationEngine::with_default_validators();
    engine.validate_all(&graph);

    let issues = engine.issues();
    let crossing: Vec<&Issue> = issues
        .iter()
        .filter(|i| i.issue_type == "ambiguous_crossing_tags")
        .collect();
    assert_eq!(crossing.len(), 1);
    assert_eq!(engine.entity_issues(w(2)).len(), 1);
    assert!(!engine.has_errors());
}

#[test]
fn test_disabled_validators_are_skipped() {
    let graph = conflicting_crossing();
    let mut engine = ValidationEngine::with_default_validators();
    engine.set_disabled(["ambiguous_crossing_tags"]);
    engine.validate_all(&graph);
    assert!(engine.issues().is_empty());
}

#[test]
fn test_closure_validator_registration() {
    let mut engine = ValidationEngine::new();
    engine.register(validator_fn("far_away", |entity: &Entity, _graph: &Graph| {
        match entity.loc() {
            Some(loc) if loc.length() > 100.0 => {
                vec![Issue::new("far_away", Severity::Error, vec![entity.id()], None)]
            }
            _ => Vec::new(),
        }
    }));
    assert_eq!(engine.validator_types(), vec!["far_away"]);

    let graph = Graph::new([Entity::point(p(1), DVec2::new(500.0, 0.0), Tags::new())]);
    engine.validate_all(&graph);
    assert!(engine.has_errors());
    assert_eq!(engine.issues()[0].key, "far_away-n1");
}

#[test]
fn test_validate_entities_refreshes_affected_set() {
    let graph = conflicting_crossing();
    let mut engine = ValidationEngine::with_default_validators();
    engine.validate_all(&graph);
    assert_eq!(engine.issues().len(), 1);

    // Point-Markierung an die Line angleichen
    let node = graph.entity(p(2)).cloned().expect("Point 2");
    let fixed = graph.replace(node.update(EntityPatch::tags(tags_from([("crossing", "unmarked")]))));
    engine.validate_entities(&fixed, &[p(2), w(1), w(2)]);
    assert!(engine.issues().is_empty());
}

#[test]
fn test_deleted_entity_drops_its_issues() {
    let graph = Graph::new([Entity::point(p(1), DVec2::ZERO, Tags::new())]);
    let mut engine = ValidationEngine::with_default_validators();
    engine.validate_all(&graph);
    assert_eq!(engine.entity_issues(p(1)).len(), 1);

    engine.validate_entities(&graph.remove(p(1)), &[p(1)]);
    assert!(engine.issues().is_empty());
}

#[test]
fn test_validate_extent_uses_tree() {
    let graph = conflicting_crossing()
        .replace(Entity::point(p(9), DVec2::new(50.0, 50.0), Tags::new()));
    let tree = Tree::from_graph(&graph, crate::core::tree::DEFAULT_LEVEL_BASE);
    let mut engine = ValidationEngine::with_default_validators();

    let near = engine.validate_extent(&graph, &tree, &BBox::new(DVec2::new(-1.0, -1.0), DVec2::new(3.0, 2.0)));
    assert_eq!(near.len(), 1);
    assert_eq!(near[0].issue_type, "ambiguous_crossing_tags");

    let far = engine.validate_extent(&graph, &tree, &BBox::new(DVec2::new(49.0, 49.0), DVec2::new(51.0, 51.0)));
    assert_eq!(far.len(), 1);
    assert_eq!(far[0].issue_type, "missing_tag");
}

#[test]
fn test_errors_sort_before_warnings() {
    let graph = conflicting_crossing().remove(p(3));
    let mut engine = ValidationEngine::with_default_validators();
    engine.validate_all(&graph);
    let issues = engine.issues();
    assert_eq!(issues[0].severity, Severity::Error);
    assert_eq!(issues[0].issue_type, "dangling_reference");
    assert!(engine.has_errors());
}

#[test]
fn test_issue_serializes_with_type_field() {
    let issue = Issue::new("missing_tag", Severity::Warning, vec![p(1)], Some("any"))
        .with_loc(Some(DVec2::new(1.0, 2.0)));
    let json = serde_json::to_value(&issue).expect("serialisierbar");
    assert_eq!(json["type"], "missing_tag");
    assert_eq!(json["severity"], "warning");
    assert_eq!(json["entity_ids"][0], "n1");
}

#[test]
fn test_line_change_refreshes_sibling_line_at_shared_point() {
    let graph = conflicting_crossing();
    let mut engine = ValidationEngine::with_default_validators();
    engine.validate_all(&graph);
    assert_eq!(engine.entity_issues(w(2)).len(), 1);

    // Nur der Übergang w1 ändert sich; w2 hielt das Issue ebenfalls im Cache
    let footway = graph.entity(w(1)).cloned().expect("Line 1");
    let fixed = graph.replace(footway.update(EntityPatch::tags(tags_from([
        ("highway", "footway"),
        ("footway", "crossing"),
        ("crossing", "marked"),
    ]))));
    let affected = crate::core::Difference::new(&graph, &fixed).complete(&graph, &fixed);
    assert!(!affected.contains(&w(2)));

    engine.validate_entities(&fixed, &affected);
    assert!(engine.issues().is_empty());
}
