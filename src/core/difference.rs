//! Differenz zwischen zwei Graph-Versionen.
//!
//! Verglichen werden nur die lokalen Schichten beider Graphen. Das genügt,
//! solange beide dieselbe Basis teilen (Normalfall innerhalb einer History).

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;

use super::entity::{Entity, EntityId, EntityKind};
use super::geo::BBox;
use super::graph::Graph;

/// Änderung eines einzelnen Entities.
#[derive(Debug, Clone)]
pub struct Change {
    /// Zustand im Ausgangsgraphen (`None` = neu erstellt)
    pub base: Option<Arc<Entity>>,
    /// Zustand im Zielgraphen (`None` = gelöscht)
    pub head: Option<Arc<Entity>>,
}

/// Anzahl erstellter, geänderter und gelöschter Entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DifferenceSummary {
    pub created: usize,
    pub modified: usize,
    pub deleted: usize,
}

/// Geänderte Entities zwischen `base` und `head`, sortiert nach ID.
#[derive(Debug, Clone, Default)]
pub struct Difference {
    changes: IndexMap<EntityId, Change>,
}

impl Difference {
    /// Berechnet die Differenz `base` → `head`.
    pub fn new(base: &Graph, head: &Graph) -> Self {
        if !head.shares_base_with(base) {
            log::debug!("Differenz über unterschiedliche Basen, nur lokale Schichten verglichen");
        }

        let ids: BTreeSet<EntityId> = head.local_ids().chain(base.local_ids()).collect();
        let mut changes = IndexMap::new();
        for id in ids {
            let before = base.entity(id);
            let after = head.entity(id);
            let unchanged = match (before, after) {
                (None, None) => true,
                (Some(b), Some(h)) => Arc::ptr_eq(b, h) || b == h,
                _ => false,
            };
            if !unchanged {
                changes.insert(
                    id,
                    Change {
                        base: before.cloned(),
                        head: after.cloned(),
                    },
                );
            }
        }
        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn get(&self, id: EntityId) -> Option<&Change> {
        self.changes.get(&id)
    }

    pub fn changes(&self) -> impl Iterator<Item = (&EntityId, &Change)> {
        self.changes.iter()
    }

    /// IDs aller geänderten Entities (sortiert).
    pub fn changed_ids(&self) -> Vec<EntityId> {
        self.changes.keys().copied().collect()
    }

    pub fn created(&self) -> Vec<Arc<Entity>> {
        self.changes
            .values()
            .filter(|c| c.base.is_none())
            .filter_map(|c| c.head.clone())
            .collect()
    }

    pub fn modified(&self) -> Vec<Arc<Entity>> {
        self.changes
            .values()
            .filter(|c| c.base.is_some())
            .filter_map(|c| c.head.clone())
            .collect()
    }

    pub fn deleted(&self) -> Vec<Arc<Entity>> {
        self.changes
            .values()
            .filter(|c| c.head.is_none())
            .filter_map(|c| c.base.clone())
            .collect()
    }

    pub fn summary(&self) -> DifferenceSummary {
        let mut summary = DifferenceSummary::default();
        for change in self.changes.values() {
            match (&change.base, &change.head) {
                (None, Some(_)) => summary.created += 1,
                (Some(_), Some(_)) => summary.modified += 1,
                (Some(_), None) => summary.deleted += 1,
                (None, None) => {}
            }
        }
        summary
    }

    /// Gemeinsame Ausdehnung aller Änderungen (alte und neue Lage).
    pub fn extent(&self, base: &Graph, head: &Graph) -> Option<BBox> {
        self.changes
            .keys()
            .flat_map(|&id| [base.extent(id), head.extent(id)])
            .flatten()
            .reduce(BBox::union)
    }

    /// Alle von der Änderung betroffenen IDs.
    ///
    /// Zusätzlich zu den geänderten Entities: Eltern-Lines und -Relations
    /// (in `head` und `base`), die Points geänderter Lines sowie die
    /// Mitglieder geänderter Relations (alt und neu).
    pub fn complete(&self, base: &Graph, head: &Graph) -> Vec<EntityId> {
        let mut ids: BTreeSet<EntityId> = BTreeSet::new();

        for (&id, change) in &self.changes {
            ids.insert(id);

            for version in [&change.base, &change.head].into_iter().flatten() {
                match version.kind() {
                    EntityKind::Line => ids.extend(version.nodes().iter().copied()),
                    EntityKind::Relation => ids.extend(version.members().iter().map(|m| m.id)),
                    EntityKind::Point => {}
                }
            }

            for graph in [base, head] {
                ids.extend(graph.parent_ways(id).iter().copied());
                ids.extend(graph.parent_relations(id).iter().copied());
            }
        }

        ids.into_iter().collect()
    }
}
