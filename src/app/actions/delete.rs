//! Action: Entity löschen und Eltern/Kinder aufräumen.

use super::{Action, DisabledReason};
use crate::core::{EntityId, EntityKind, Graph};

/// Löscht ein Entity unter Wahrung der referenziellen Integrität.
///
/// - Eltern werden zuerst gelöst. Dadurch entartete Lines und leere
///   Relations werden mitgelöscht.
/// - Points einer gelöschten Line, die danach ohne Eltern und ohne
///   relevante Tags sind, werden mitgelöscht (analog Mitglieder einer
///   Relation).
#[derive(Debug, Clone, Copy)]
pub struct DeleteEntity {
    pub id: EntityId,
}

impl DeleteEntity {
    pub fn new(id: EntityId) -> Self {
        Self { id }
    }
}

impl Action for DeleteEntity {
    fn apply(&self, graph: &Graph) -> Graph {
        if !graph.has_entity(self.id) {
            log::warn!("DeleteEntity: {} nicht gefunden", self.id);
            return graph.clone();
        }
        let next = delete(graph.clone(), self.id);
        log::debug!("DeleteEntity: {} gelöscht", self.id);
        next
    }

    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        (!graph.has_entity(self.id)).then_some(DisabledReason::NotFound)
    }
}

fn delete(graph: Graph, id: EntityId) -> Graph {
    let Some(entity) = graph.entity(id).cloned() else {
        return graph;
    };
    let mut graph = detach_from_relations(graph, id);

    match entity.kind() {
        EntityKind::Point => {
            for line_id in graph.parent_ways(id).to_vec() {
                let Some(line) = graph.entity(line_id).cloned() else {
                    continue;
                };
                let line = line.remove_node(id);
                graph = if line.is_degenerate() {
                    delete(graph, line_id)
                } else {
                    graph.replace(line)
                };
            }
            graph.remove(id)
        }
        EntityKind::Line => {
            let mut nodes = entity.nodes().to_vec();
            nodes.sort_unstable();
            nodes.dedup();
            graph = graph.remove(id);
            for node in nodes {
                if is_orphan(&graph, node) {
                    graph = graph.remove(node);
                }
            }
            graph
        }
        EntityKind::Relation => {
            graph = graph.remove(id);
            let mut members: Vec<EntityId> = entity.members().iter().map(|m| m.id).collect();
            members.sort_unstable();
            members.dedup();
            for member in members {
                if is_orphan(&graph, member) {
                    graph = delete(graph, member);
                }
            }
            graph
        }
    }
}

/// Entfernt `id` aus allen Eltern-Relations; leere Relations werden gelöscht.
fn detach_from_relations(mut graph: Graph, id: EntityId) -> Graph {
    for rel_id in graph.parent_relations(id).to_vec() {
        let Some(rel) = graph.entity(rel_id).cloned() else {
            continue;
        };
        let rel = rel.remove_members_with_id(id);
        graph = if rel.is_degenerate() {
            delete(graph, rel_id)
        } else {
            graph.replace(rel)
        };
    }
    graph
}

/// Vorhanden, ohne Eltern und ohne relevante Tags.
fn is_orphan(graph: &Graph, id: EntityId) -> bool {
    graph.entity(id).is_some_and(|e| !e.has_interesting_tags())
        && graph.parent_ways(id).is_empty()
        && graph.parent_relations(id).is_empty()
}
