//! Action: Point auf der Kante zwischen zwei benachbarten Points einfügen.

use super::{Action, DisabledReason};
use crate::core::{Entity, EntityId, EntityKind, EntityPatch, Graph, Loc};

/// Setzt `node` an `loc` und fügt ihn in jede Line ein, in der die Kante
/// `edge` vorkommt. Pro Line wird nur das erste Vorkommen bedient.
#[derive(Debug, Clone)]
pub struct AddMidpoint {
    pub edge: (EntityId, EntityId),
    pub loc: Loc,
    pub node: Entity,
}

impl AddMidpoint {
    pub fn new(edge: (EntityId, EntityId), loc: Loc, node: Entity) -> Self {
        Self { edge, loc, node }
    }

    /// Lines, die `a` und `b` gemeinsam enthalten.
    fn shared_lines(&self, graph: &Graph) -> Vec<EntityId> {
        let (a, b) = self.edge;
        let of_b = graph.parent_ways(b);
        graph
            .parent_ways(a)
            .iter()
            .copied()
            .filter(|w| of_b.contains(w))
            .collect()
    }
}

/// Index der ersten Kante `a`–`b` (ungerichtet) in `nodes`.
fn edge_index(nodes: &[EntityId], (a, b): (EntityId, EntityId)) -> Option<usize> {
    nodes
        .windows(2)
        .position(|pair| (pair[0] == a && pair[1] == b) || (pair[0] == b && pair[1] == a))
}

impl Action for AddMidpoint {
    fn apply(&self, graph: &Graph) -> Graph {
        if let Some(reason) = self.disabled(graph) {
            log::warn!(
                "AddMidpoint: {}–{} nicht möglich ({})",
                self.edge.0,
                self.edge.1,
                reason.code()
            );
            return graph.clone();
        }

        let node_id = self.node.id();
        let mut next = graph.replace(self.node.update(EntityPatch::loc(self.loc)));

        for line_id in self.shared_lines(graph) {
            let Some(line) = next.entity(line_id).cloned() else {
                continue;
            };
            if let Some(i) = edge_index(line.nodes(), self.edge) {
                next = next.replace(line.add_node(node_id, Some(i + 1)));
            }
        }

        log::debug!(
            "AddMidpoint: {} zwischen {} und {} eingefügt",
            node_id,
            self.edge.0,
            self.edge.1
        );
        next
    }

    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        if self.node.kind() != EntityKind::Point {
            return Some(DisabledReason::NotAPoint);
        }
        if graph.has_entity(self.node.id()) {
            return Some(DisabledReason::IdCollision);
        }
        let (a, b) = self.edge;
        if !graph.has_entity(a) || !graph.has_entity(b) {
            return Some(DisabledReason::NotFound);
        }
        let adjacent = self.shared_lines(graph).into_iter().any(|w| {
            graph
                .entity(w)
                .is_some_and(|line| edge_index(line.nodes(), self.edge).is_some())
        });
        (!adjacent).then_some(DisabledReason::NotAdjacent)
    }
}
