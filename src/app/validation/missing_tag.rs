//! Validator `missing_tag`: Entities ohne inhaltliche Tags.

use super::{Issue, Severity, Validator};
use crate::core::{Entity, EntityKind, Geometry, Graph};

pub const ISSUE_TYPE: &str = "missing_tag";

/// Meldet ungetaggte Points, Lines und Relations.
///
/// Vertices und Relations-Mitglieder werden übersprungen, da sie ihre
/// Bedeutung von den Eltern erhalten.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingTag;

impl Validator for MissingTag {
    fn issue_type(&self) -> &str {
        ISSUE_TYPE
    }

    fn validate(&self, entity: &Entity, graph: &Graph) -> Vec<Issue> {
        let id = entity.id();
        if graph.geometry(id) == Some(Geometry::Vertex) || !graph.parent_relations(id).is_empty() {
            return Vec::new();
        }

        let subtype = if entity.tags().is_empty() {
            "any"
        } else if !entity.has_interesting_tags() {
            "descriptive"
        } else if entity.kind() == EntityKind::Relation && entity.tag("type").is_none() {
            "relation_type"
        } else {
            return Vec::new();
        };

        let loc = match entity.kind() {
            EntityKind::Point => entity.loc(),
            _ => graph.extent(id).map(|b| b.center()),
        };
        vec![Issue::new(ISSUE_TYPE, Severity::Warning, vec![id], Some(subtype))
            .with_subtype(subtype)
            .with_loc(loc)
            .with_message(format!("{} hat keine aussagekräftigen Tags ({})", id, subtype))]
    }
}
