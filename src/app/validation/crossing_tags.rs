//! Validator `ambiguous_crossing_tags`: widersprüchliche oder unvollständige
//! Markierungsangaben an Übergängen.
//!
//! Betrachtet wird jeder Point, der zu genau zwei Lines gehört. Seiten des
//! Vergleichs sind die Übergangs-Lines (z. B. `footway=crossing`) und der
//! Point selbst. Gemeldet wird bei
//! - widersprüchlichem Zustand (markiert/unmarkiert/informell),
//! - gleich markiert, aber mit anderem Markierungsstil,
//! - markiert oder informell gegenüber einer Seite ohne Angabe.
//!
//! Unmarkiert gegenüber einer Seite ohne Angabe wird bewusst nicht gemeldet.

use super::{Fix, Issue, Severity, Validator};
use crate::core::{Entity, EntityId, EntityKind, Graph, Tags};

pub const ISSUE_TYPE: &str = "ambiguous_crossing_tags";

/// Keys, die den Markierungszustand tragen.
const MARKING_KEYS: &[&str] = &["crossing", "crossing:markings"];
/// Werte von `footway`, `cycleway` bzw. `path`, die eine Übergangs-Line kennzeichnen.
const CROSSING_WAY_KEYS: &[&str] = &["footway", "cycleway", "path"];

/// Markierungszustand einer Seite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Marking {
    /// Keine Angabe
    Untagged,
    Unmarked,
    /// Markiert, optional mit Stil (`zebra`, `lines`, …)
    Marked(Option<String>),
    Informal,
}

impl Marking {
    /// Leitet den Zustand aus den Tags ab. `crossing:markings` hat Vorrang.
    pub(crate) fn from_tags(tags: &Tags) -> Self {
        if let Some(markings) = tags.get("crossing:markings").map(String::as_str) {
            return match markings {
                "no" => Marking::Unmarked,
                "yes" => Marking::Marked(None),
                "" => Marking::Untagged,
                style => Marking::Marked(Some(style.to_owned())),
            };
        }
        match tags.get("crossing").map(String::as_str) {
            Some("unmarked") => Marking::Unmarked,
            Some("marked") | Some("uncontrolled") => Marking::Marked(None),
            Some("zebra") => Marking::Marked(Some("zebra".to_owned())),
            Some("informal") => Marking::Informal,
            _ => Marking::Untagged,
        }
    }

    fn is_untagged(&self) -> bool {
        matches!(self, Marking::Untagged)
    }

    /// Zustand ohne Stil, für den Vergleich markiert/unmarkiert/informell.
    fn class(&self) -> u8 {
        match self {
            Marking::Untagged => 0,
            Marking::Unmarked => 1,
            Marking::Marked(_) => 2,
            Marking::Informal => 3,
        }
    }
}

/// Art der Mehrdeutigkeit.
fn conflict(a: &Marking, b: &Marking) -> Option<&'static str> {
    match (a, b) {
        (Marking::Untagged, Marking::Untagged) => None,
        (Marking::Untagged, Marking::Unmarked) | (Marking::Unmarked, Marking::Untagged) => None,
        (Marking::Untagged, _) | (_, Marking::Untagged) => Some("unresolved"),
        (Marking::Marked(Some(x)), Marking::Marked(Some(y))) if x != y => Some("conflicting_style"),
        _ if a.class() != b.class() => Some("conflicting_state"),
        _ => None,
    }
}

/// Ist die Line als Übergang getaggt?
fn is_crossing_way(line: &Entity) -> bool {
    CROSSING_WAY_KEYS
        .iter()
        .any(|key| line.tag(key) == Some("crossing"))
        || MARKING_KEYS.iter().any(|key| line.tag(key).is_some())
}

/// Tags von `target` mit den Markierungs-Keys von `source`.
fn with_markings_of(target: &Tags, source: &Tags) -> Tags {
    let mut tags: Tags = target
        .iter()
        .filter(|(k, _)| !MARKING_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    for key in MARKING_KEYS {
        if let Some(value) = source.get(*key) {
            tags.insert((*key).to_owned(), value.clone());
        }
    }
    tags
}

/// Prüft Übergangs-Points auf mehrdeutige Markierungsangaben.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmbiguousCrossingTags;

impl AmbiguousCrossingTags {
    /// Issue für den Übergang am Point `node_id`, falls mehrdeutig.
    fn check_node(&self, node_id: EntityId, graph: &Graph) -> Option<Issue> {
        let node = graph.entity(node_id)?;
        let parents = graph.parent_ways(node_id);
        if parents.len() != 2 {
            return None;
        }

        let lines: Vec<&Entity> = parents
            .iter()
            .filter_map(|id| graph.entity(*id).map(|e| e.as_ref()))
            .collect();
        if lines.len() != 2 {
            return None;
        }
        let crossing_lines: Vec<&Entity> =
            lines.iter().copied().filter(|l| is_crossing_way(l)).collect();
        if crossing_lines.is_empty() {
            return None;
        }

        let node_marking = Marking::from_tags(node.tags());
        let node_has_marking = !node_marking.is_untagged();
        let mut sides: Vec<(&Entity, Marking)> = crossing_lines
            .iter()
            .map(|l| (*l, Marking::from_tags(l.tags())))
            .collect();
        sides.push((&**node, node_marking));

        let subtype = sides.iter().enumerate().find_map(|(i, (_, a))| {
            sides[i + 1..].iter().find_map(|(_, b)| conflict(a, b))
        })?;

        let mut issue = Issue::new(
            ISSUE_TYPE,
            Severity::Warning,
            vec![lines[0].id(), lines[1].id()],
            Some(&node_id.to_string()),
        )
        .with_subtype(subtype)
        .with_loc(node.loc())
        .with_message(format!(
            "Mehrdeutige Übergangs-Markierung an {} zwischen {} und {}",
            node_id,
            lines[0].id(),
            lines[1].id()
        ));

        // Korrekturen zwischen der ersten Übergangs-Line und dem Point
        let line = crossing_lines[0];
        let line_marking = &sides[0].1;
        if node_has_marking {
            issue = issue.with_fix(Fix {
                id: "set_line_marking_from_node".to_owned(),
                title: "Markierung des Points auf die Line übernehmen".to_owned(),
                entity_id: line.id(),
                tags: with_markings_of(line.tags(), node.tags()),
            });
        }
        if !line_marking.is_untagged() {
            issue = issue.with_fix(Fix {
                id: "set_node_marking_from_line".to_owned(),
                title: "Markierung der Line auf den Point übernehmen".to_owned(),
                entity_id: node_id,
                tags: with_markings_of(node.tags(), line.tags()),
            });
        }
        Some(issue)
    }
}

impl Validator for AmbiguousCrossingTags {
    fn issue_type(&self) -> &str {
        ISSUE_TYPE
    }

    fn validate(&self, entity: &Entity, graph: &Graph) -> Vec<Issue> {
        match entity.kind() {
            EntityKind::Point => self.check_node(entity.id(), graph).into_iter().collect(),
            EntityKind::Line => {
                let mut nodes = entity.nodes().to_vec();
                nodes.sort_unstable();
                nodes.dedup();
                nodes
                    .into_iter()
                    .filter_map(|node| self.check_node(node, graph))
                    .collect()
            }
            EntityKind::Relation => Vec::new(),
        }
    }
}
