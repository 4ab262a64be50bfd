//! Action: Point in eine Line einfügen.

use super::{Action, DisabledReason};
use crate::core::{EntityId, EntityKind, Graph};

/// Fügt `node` an Position `index` in `line` ein (`None` = anhängen).
#[derive(Debug, Clone, Copy)]
pub struct AddVertex {
    pub line: EntityId,
    pub node: EntityId,
    pub index: Option<usize>,
}

impl AddVertex {
    pub fn new(line: EntityId, node: EntityId, index: Option<usize>) -> Self {
        Self { line, node, index }
    }
}

impl Action for AddVertex {
    fn apply(&self, graph: &Graph) -> Graph {
        if let Some(reason) = self.disabled(graph) {
            log::warn!(
                "AddVertex: {} → {} nicht möglich ({})",
                self.node,
                self.line,
                reason.code()
            );
            return graph.clone();
        }
        match graph.entity(self.line) {
            Some(line) => graph.replace(line.add_node(self.node, self.index)),
            None => graph.clone(),
        }
    }

    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        let Some(line) = graph.entity(self.line) else {
            return Some(DisabledReason::NotFound);
        };
        if line.kind() != EntityKind::Line {
            return Some(DisabledReason::NotALine);
        }
        if self.node.kind() != EntityKind::Point {
            return Some(DisabledReason::NotAPoint);
        }
        if self.index.is_some_and(|i| i > line.nodes().len()) {
            return Some(DisabledReason::IndexOutOfRange);
        }
        None
    }
}
