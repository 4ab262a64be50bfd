//! Action: Tags eines Entities ersetzen.

use super::{Action, DisabledReason};
use crate::core::{EntityId, EntityPatch, Graph, Tags};

/// Ersetzt die komplette Tag-Map eines Entities.
#[derive(Debug, Clone)]
pub struct ChangeTags {
    pub id: EntityId,
    pub tags: Tags,
}

impl ChangeTags {
    pub fn new(id: EntityId, tags: Tags) -> Self {
        Self { id, tags }
    }
}

impl Action for ChangeTags {
    fn apply(&self, graph: &Graph) -> Graph {
        let Some(entity) = graph.entity(self.id) else {
            log::warn!("ChangeTags: {} nicht gefunden", self.id);
            return graph.clone();
        };
        graph.replace(entity.update(EntityPatch::tags(self.tags.clone())))
    }

    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        (!graph.has_entity(self.id)).then_some(DisabledReason::NotFound)
    }
}
