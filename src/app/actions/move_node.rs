//! Action: Point verschieben.

use super::{Action, DisabledReason};
use crate::core::{EntityId, EntityKind, EntityPatch, Graph, Loc};

/// Setzt die Koordinate eines Points. Eltern-Lines bleiben unverändert,
/// ihre Geometrie folgt automatisch.
#[derive(Debug, Clone, Copy)]
pub struct MoveNode {
    pub id: EntityId,
    pub loc: Loc,
}

impl MoveNode {
    pub fn new(id: EntityId, loc: Loc) -> Self {
        Self { id, loc }
    }
}

impl Action for MoveNode {
    fn apply(&self, graph: &Graph) -> Graph {
        if self.disabled(graph).is_some() {
            log::warn!("MoveNode: {} ist kein vorhandener Point", self.id);
            return graph.clone();
        }
        match graph.entity(self.id) {
            Some(point) => graph.replace(point.update(EntityPatch::loc(self.loc))),
            None => graph.clone(),
        }
    }

    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        match graph.entity(self.id) {
            None => Some(DisabledReason::NotFound),
            Some(e) if e.kind() != EntityKind::Point => Some(DisabledReason::NotAPoint),
            Some(_) => None,
        }
    }
}
