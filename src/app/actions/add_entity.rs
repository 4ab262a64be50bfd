//! Action: neues Entity in den Graphen einfügen.

use super::{Action, DisabledReason};
use crate::core::{Entity, Graph};

/// Fügt ein neues Entity ein.
///
/// Die ID darf im Graphen noch nicht vergeben sein. Lines dürfen Points
/// referenzieren, die erst in einem späteren Schritt eingefügt werden.
#[derive(Debug, Clone)]
pub struct AddEntity {
    pub entity: Entity,
}

impl AddEntity {
    pub fn new(entity: Entity) -> Self {
        Self { entity }
    }
}

impl Action for AddEntity {
    fn apply(&self, graph: &Graph) -> Graph {
        let id = self.entity.id();
        debug_assert!(!graph.has_entity(id), "ID {id} ist bereits vergeben");
        if graph.has_entity(id) {
            log::error!("AddEntity: ID {} ist bereits vergeben, Graph unverändert", id);
            return graph.clone();
        }
        log::debug!("AddEntity: {} eingefügt", id);
        graph.replace(self.entity.clone())
    }

    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        graph
            .has_entity(self.entity.id())
            .then_some(DisabledReason::IdCollision)
    }
}
