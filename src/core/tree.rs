//! Spatial-Index (KD-Trees über Box-Mittelpunkte) für Entity-Bounding-Boxes.
//!
//! Boxen werden nach Größe in Zweierpotenz-Klassen einsortiert. Pro Klasse
//! liegt ein eigener KD-Tree über den Box-Mittelpunkten; eine Abfrage
//! erweitert das Suchrechteck je Klasse um deren maximale Halbausdehnung
//! und filtert anschließend exakt.
//!
//! Jeder KD-Tree-Eintrag steht für einen Mittelpunkt; Entities mit exakt
//! gleichem Mittelpunkt teilen sich den Eintrag (gestapelte Points).
//!
//! Der Index folgt dem Graphen inkrementell (`rebase`/`update_to`): nur
//! geänderte Entities und ihre Eltern werden neu eingetragen.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use kiddo::{KdTree, SquaredEuclidean};

use super::difference::Difference;
use super::entity::{Entity, EntityId};
use super::geo::BBox;
use super::graph::Graph;

/// Kleinste Größenklasse (Halbausdehnung in Grad, ca. 1 m).
pub const DEFAULT_LEVEL_BASE: f64 = 1e-5;

/// Eintrag eines Entities im Index.
#[derive(Debug, Clone, Copy)]
struct TreeEntry {
    bbox: BBox,
    version: u64,
    slot: u64,
    level: i32,
}

/// KD-Tree einer Größenklasse.
#[derive(Debug, Clone)]
struct Level {
    kd: KdTree<f64, 2>,
    /// Mittelpunkt (Bitmuster) → Slot
    centers: HashMap<[u64; 2], u64>,
}

/// Inkrementell aktualisierter Bounding-Box-Index über einem Graphen.
#[derive(Debug, Clone)]
pub struct Tree {
    levels: BTreeMap<i32, Level>,
    entries: HashMap<EntityId, TreeEntry>,
    /// Slot (KD-Tree-Item) → Entities mit diesem Mittelpunkt
    slots: Vec<Vec<EntityId>>,
    free_slots: Vec<u64>,
    /// Graph-Version des letzten Rebase
    graph: Graph,
    level_base: f64,
}

fn center_key(bbox: &BBox) -> [f64; 2] {
    let c = bbox.center();
    // -0.0 und 0.0 auf denselben Schlüssel abbilden
    [c.x + 0.0, c.y + 0.0]
}

fn center_bits(center: &[f64; 2]) -> [u64; 2] {
    [center[0].to_bits(), center[1].to_bits()]
}

impl Tree {
    /// Leerer Index mit Standard-Größenklassen.
    pub fn new() -> Self {
        Self::with_level_base(DEFAULT_LEVEL_BASE)
    }

    /// Leerer Index mit eigener kleinster Größenklasse.
    pub fn with_level_base(level_base: f64) -> Self {
        let level_base = if level_base > 0.0 {
            level_base
        } else {
            log::warn!("Ungültige Level-Basis {level_base}, verwende Standardwert");
            DEFAULT_LEVEL_BASE
        };
        Self {
            levels: BTreeMap::new(),
            entries: HashMap::new(),
            slots: Vec::new(),
            free_slots: Vec::new(),
            graph: Graph::empty(),
            level_base,
        }
    }

    /// Baut den Index vollständig aus allen Entities des Graphen.
    pub fn from_graph(graph: &Graph, level_base: f64) -> Self {
        let mut tree = Self::with_level_base(level_base);
        let ids: Vec<EntityId> = graph.entities().map(|e| e.id()).collect();
        tree.rebase(graph, &ids, true);
        tree
    }

    /// Anzahl indexierter Entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Gespeicherte Box eines Entities.
    pub fn bbox_of(&self, id: EntityId) -> Option<BBox> {
        self.entries.get(&id).map(|e| e.bbox)
    }

    /// Graph-Version, gegen die zuletzt rebased wurde.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    fn level_for(&self, bbox: &BBox) -> i32 {
        let half = bbox.half_size().max_element();
        if half <= self.level_base {
            return 0;
        }
        let level = (half / self.level_base).log2().ceil() as i32;
        // log2 kann knapp über einer Zweierpotenz abrunden
        if self.level_bound(level) < half {
            level + 1
        } else {
            level
        }
    }

    fn level_bound(&self, level: i32) -> f64 {
        self.level_base * 2f64.powi(level)
    }

    fn insert_entry(&mut self, id: EntityId, bbox: BBox, version: u64) {
        let level = self.level_for(&bbox);
        let center = center_key(&bbox);
        let bits = center_bits(&center);
        let entry = self.levels.entry(level).or_insert_with(|| Level {
            kd: KdTree::new(),
            centers: HashMap::new(),
        });

        let slot = match entry.centers.get(&bits) {
            Some(&slot) => {
                self.slots[slot as usize].push(id);
                slot
            }
            None => {
                let slot = match self.free_slots.pop() {
                    Some(slot) => {
                        self.slots[slot as usize] = vec![id];
                        slot
                    }
                    None => {
                        self.slots.push(vec![id]);
                        (self.slots.len() - 1) as u64
                    }
                };
                entry.kd.add(&center, slot);
                entry.centers.insert(bits, slot);
                slot
            }
        };

        self.entries.insert(
            id,
            TreeEntry {
                bbox,
                version,
                slot,
                level,
            },
        );
    }

    fn remove_entry(&mut self, id: EntityId) -> bool {
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };
        let ids = &mut self.slots[entry.slot as usize];
        ids.retain(|&other| other != id);
        if !ids.is_empty() {
            return true;
        }

        if let Some(level) = self.levels.get_mut(&entry.level) {
            let center = center_key(&entry.bbox);
            level.kd.remove(&center, entry.slot);
            level.centers.remove(&center_bits(&center));
            if level.centers.is_empty() {
                self.levels.remove(&entry.level);
            }
        }
        self.free_slots.push(entry.slot);
        true
    }

    /// Trägt ein einzelnes Entity neu ein bzw. entfernt es, wenn es keine
    /// Geometrie (mehr) hat. Gibt `true` zurück, wenn sich der Eintrag ändert.
    fn reindex(&mut self, graph: &Graph, id: EntityId) -> bool {
        let current = graph.entity(id).map(|e| e.version());
        let bbox = current.and_then(|_| graph.extent(id));

        match (current, bbox) {
            (Some(version), Some(bbox)) => {
                if let Some(entry) = self.entries.get(&id) {
                    if entry.bbox == bbox && entry.version == version {
                        return false;
                    }
                }
                self.remove_entry(id);
                self.insert_entry(id, bbox, version);
                true
            }
            _ => self.remove_entry(id),
        }
    }

    /// Aktualisiert den Index für die gegebenen Entities gegen `graph`.
    ///
    /// Geänderte Entities ziehen ihre Eltern-Lines und -Relations transitiv
    /// nach. Nicht mehr vorhandene IDs werden entfernt. Ohne `force` werden
    /// Entities mit unveränderter Version übersprungen.
    pub fn rebase(&mut self, graph: &Graph, ids: &[EntityId], force: bool) {
        let mut pending: Vec<EntityId> = Vec::new();
        let mut seen: HashSet<EntityId> = HashSet::new();

        for &id in ids {
            let dirty = force
                || match (graph.entity(id), self.entries.get(&id)) {
                    (Some(entity), Some(entry)) => entity.version() != entry.version,
                    (None, None) => false,
                    _ => true,
                };
            if dirty && seen.insert(id) {
                pending.push(id);
            }
        }

        let mut updated = 0usize;
        let mut cursor = 0;
        while cursor < pending.len() {
            let id = pending[cursor];
            cursor += 1;
            if self.reindex(graph, id) {
                updated += 1;
            }

            // Eltern in neuem und altem Graphen, damit auch gelöste Verknüpfungen erfasst werden
            for source in [graph, &self.graph] {
                for &parent in source
                    .parent_ways(id)
                    .iter()
                    .chain(source.parent_relations(id))
                {
                    if seen.insert(parent) {
                        pending.push(parent);
                    }
                }
            }
        }

        self.graph = graph.clone();
        log::debug!(
            "Tree-Rebase: {} Einträge geprüft, {} aktualisiert, {} indexiert",
            pending.len(),
            updated,
            self.entries.len()
        );
    }

    /// Rebase gegen die Differenz zwischen letztem und neuem Graphen.
    pub fn update_to(&mut self, graph: &Graph) {
        if !graph.shares_base_with(&self.graph) && !self.graph.is_local_empty() {
            log::debug!("Tree-Update über Basiswechsel, Basis-Änderungen kommen über rebase()");
        }
        let diff = Difference::new(&self.graph, graph);
        self.rebase(graph, &diff.changed_ids(), false);
    }

    /// Entities, deren gespeicherte Box `bbox` schneidet (Stand: letzter Rebase).
    ///
    /// Ergebnis ist nach ID sortiert.
    pub fn query(&self, bbox: &BBox) -> Vec<Arc<Entity>> {
        let mut ids = self.query_ids(bbox);
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.graph.entity(id).cloned())
            .collect()
    }

    /// Wie [`Tree::query`], nur die IDs (unsortiert).
    pub fn query_ids(&self, bbox: &BBox) -> Vec<EntityId> {
        let mut result = Vec::new();
        for (&level, entries) in &self.levels {
            let search = bbox.padded(self.level_bound(level));
            let center = search.center();
            // Umkreis des erweiterten Suchrechtecks, danach exakte Prüfung
            let radius_sq = search.half_size().length_squared();

            for hit in entries
                .kd
                .within::<SquaredEuclidean>(&[center.x, center.y], radius_sq)
            {
                let Some(ids) = self.slots.get(hit.item as usize) else {
                    continue;
                };
                for id in ids {
                    if self
                        .entries
                        .get(id)
                        .is_some_and(|entry| entry.bbox.intersects(bbox))
                    {
                        result.push(*id);
                    }
                }
            }
        }
        result
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::{EntityPatch, Member};
    use crate::core::tags::Tags;
    use glam::DVec2;

    fn p(raw: i64) -> EntityId {
        EntityId::point(raw)
    }

    fn sample_graph() -> Graph {
        Graph::new([
            Entity::point(p(1), DVec2::new(0.0, 0.0), Tags::new()),
            Entity::point(p(2), DVec2::new(0.001, 0.0), Tags::new()),
            Entity::point(p(3), DVec2::new(0.004, 0.003), Tags::new()),
            Entity::line(EntityId::line(1), vec![p(1), p(2)], Tags::new()),
        ])
    }

    fn ids(entities: Vec<Arc<Entity>>) -> Vec<EntityId> {
        entities.into_iter().map(|e| e.id()).collect()
    }

    fn around(x: f64, y: f64, pad: f64) -> BBox {
        BBox::from_point(DVec2::new(x, y)).padded(pad)
    }

    #[test]
    fn from_graph_indexes_all_entities() {
        let tree = Tree::from_graph(&sample_graph(), DEFAULT_LEVEL_BASE);
        assert_eq!(tree.len(), 4);
        let bbox = tree.bbox_of(EntityId::line(1)).expect("Line indexiert");
        assert_eq!(bbox.max, DVec2::new(0.001, 0.0));
    }

    #[test]
    fn query_returns_intersecting_entities_sorted() {
        let tree = Tree::from_graph(&sample_graph(), DEFAULT_LEVEL_BASE);
        let hits = ids(tree.query(&around(0.0005, 0.0, 0.0001)));
        assert_eq!(hits, vec![EntityId::line(1)]);

        let hits = ids(tree.query(&around(0.0, 0.0, 0.0001)));
        assert_eq!(hits, vec![p(1), EntityId::line(1)]);
    }

    #[test]
    fn moved_point_is_found_only_at_new_location() {
        let graph = sample_graph();
        let mut tree = Tree::from_graph(&graph, DEFAULT_LEVEL_BASE);

        let moved = graph
            .entity(p(3))
            .expect("Point 3")
            .update(EntityPatch::loc(DVec2::new(1.0, 1.0)));
        let next = graph.replace(moved);
        tree.update_to(&next);

        assert!(ids(tree.query(&around(1.0, 1.0, 0.001))).contains(&p(3)));
        assert!(!ids(tree.query(&around(0.004, 0.003, 0.0001))).contains(&p(3)));
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn moving_a_vertex_updates_parent_line_box() {
        let graph = sample_graph();
        let mut tree = Tree::from_graph(&graph, DEFAULT_LEVEL_BASE);

        let moved = graph
            .entity(p(2))
            .expect("Point 2")
            .update(EntityPatch::loc(DVec2::new(0.5, 0.5)));
        let next = graph.replace(moved);
        tree.rebase(&next, &[p(2)], false);

        let bbox = tree.bbox_of(EntityId::line(1)).expect("Line indexiert");
        assert_eq!(bbox.max, DVec2::new(0.5, 0.5));
        assert!(ids(tree.query(&around(0.25, 0.25, 0.01))).contains(&EntityId::line(1)));
    }

    #[test]
    fn removed_entities_are_purged() {
        let graph = sample_graph();
        let mut tree = Tree::from_graph(&graph, DEFAULT_LEVEL_BASE);

        let next = graph.remove(EntityId::line(1));
        tree.update_to(&next);

        assert!(!tree.contains(EntityId::line(1)));
        assert_eq!(tree.len(), 3);
        assert!(ids(tree.query(&around(0.0005, 0.0, 0.0001))).is_empty());
    }

    #[test]
    fn unchanged_version_is_skipped_without_force() {
        let graph = sample_graph();
        let mut tree = Tree::from_graph(&graph, DEFAULT_LEVEL_BASE);
        let before = tree.bbox_of(p(1));

        tree.rebase(&graph, &[p(1)], false);
        assert_eq!(tree.bbox_of(p(1)), before);
        tree.rebase(&graph, &[p(1)], true);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn large_relation_is_found_from_small_query() {
        let graph = sample_graph().replace_all([
            Entity::point(p(10), DVec2::new(-10.0, -10.0), Tags::new()),
            Entity::point(p(11), DVec2::new(10.0, 10.0), Tags::new()),
            Entity::relation(
                EntityId::relation(1),
                vec![Member::new(p(10), ""), Member::new(p(11), "")],
                Tags::new(),
            ),
        ]);
        let tree = Tree::from_graph(&graph, DEFAULT_LEVEL_BASE);

        // Abfrage weit weg vom Mittelpunkt, aber innerhalb der Relation-Box
        let hits = ids(tree.query(&around(9.0, -9.0, 0.01)));
        assert_eq!(hits, vec![EntityId::relation(1)]);
    }

    #[test]
    fn stacked_points_share_one_center() {
        let loc = DVec2::new(8.5, 47.0);
        let graph = Graph::new((1..=100).map(|raw| Entity::point(p(raw), loc, Tags::new())));
        let mut tree = Tree::from_graph(&graph, DEFAULT_LEVEL_BASE);
        assert_eq!(tree.len(), 100);
        assert_eq!(tree.query_ids(&around(8.5, 47.0, 0.0001)).len(), 100);

        // Teil des Stapels verschieben, Rest bleibt auffindbar
        let mut next = graph.clone();
        for raw in 1..=40 {
            let moved = next
                .entity(p(raw))
                .expect("Point im Stapel")
                .update(EntityPatch::loc(DVec2::new(9.0, 47.0)));
            next = next.replace(moved);
        }
        tree.update_to(&next);
        assert_eq!(tree.query_ids(&around(8.5, 47.0, 0.0001)).len(), 60);
        assert_eq!(tree.query_ids(&around(9.0, 47.0, 0.0001)).len(), 40);

        let emptied = (1..=100).fold(next, |g, raw| g.remove(p(raw)));
        tree.update_to(&emptied);
        assert!(tree.is_empty());
        assert!(tree.query_ids(&around(8.5, 47.0, 1.0)).is_empty());
    }

    #[test]
    fn level_bound_covers_half_size_above_power_of_two() {
        let tree = Tree::with_level_base(1.0);
        for exp in -8..=8 {
            // 1 ulp über der Zweierpotenz
            let half = f64::from_bits(2f64.powi(exp).to_bits() + 1);
            let bbox = BBox::new(DVec2::splat(-half), DVec2::splat(half));
            let level = tree.level_for(&bbox);
            assert!(
                tree.level_bound(level) >= bbox.half_size().max_element(),
                "Klasse {level} zu klein für Halbausdehnung {half}"
            );
        }
    }

    #[test]
    fn query_touching_box_edge_finds_entry() {
        let half = f64::from_bits(4f64.to_bits() + 1);
        let graph = Graph::new([
            Entity::point(p(1), DVec2::new(-half, 0.0), Tags::new()),
            Entity::point(p(2), DVec2::new(half, 0.0), Tags::new()),
            Entity::line(EntityId::line(1), vec![p(1), p(2)], Tags::new()),
        ]);
        let tree = Tree::from_graph(&graph, 1.0);
        let edge = BBox::from_point(DVec2::new(half, 0.0));
        assert!(tree.query_ids(&edge).contains(&EntityId::line(1)));
    }

    #[test]
    fn line_without_resolvable_nodes_is_not_indexed() {
        let graph = Graph::new([Entity::line(
            EntityId::line(5),
            vec![p(98), p(99)],
            Tags::new(),
        )]);
        let tree = Tree::from_graph(&graph, DEFAULT_LEVEL_BASE);
        assert!(tree.is_empty());
    }
}
