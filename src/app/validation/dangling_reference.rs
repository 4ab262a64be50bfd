//! Validator `dangling_reference`: Line verweist auf einen nicht vorhandenen Point.

use super::{Issue, Severity, Validator};
use crate::core::{Entity, EntityKind, Graph};

pub const ISSUE_TYPE: &str = "dangling_reference";

/// Meldet je fehlendem Point einer Line einen Fehler.
#[derive(Debug, Clone, Copy, Default)]
pub struct DanglingReference;

impl Validator for DanglingReference {
    fn issue_type(&self) -> &str {
        ISSUE_TYPE
    }

    fn validate(&self, entity: &Entity, graph: &Graph) -> Vec<Issue> {
        if entity.kind() != EntityKind::Line {
            return Vec::new();
        }
        let mut missing = entity.nodes().to_vec();
        missing.sort_unstable();
        missing.dedup();
        missing.retain(|node| !graph.has_entity(*node));

        missing
            .into_iter()
            .map(|node| {
                Issue::new(
                    ISSUE_TYPE,
                    Severity::Error,
                    vec![entity.id()],
                    Some(&node.to_string()),
                )
                .with_message(format!("{} verweist auf fehlenden Point {}", entity.id(), node))
            })
            .collect()
    }
}
