//! Der versionierte Entity-Graph: unveränderliche Basis plus kleine lokale Schicht.
//!
//! `replace`/`remove` liefern neue Graph-Werte. Die Basis wird per `Arc`
//! geteilt, die lokale Schicht per `Arc::make_mut` nur bei Bedarf kopiert.
//! Ein Snapshot (Clone) ist damit O(1).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::entity::{Entity, EntityId, EntityKind};
use super::geo::BBox;

/// Eltern-Index: Kind-ID → IDs der referenzierenden Lines bzw. Relations.
type ParentMap = HashMap<EntityId, Vec<EntityId>>;

/// Abgeleitete Geometrie-Klasse eines Entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Geometry {
    /// Point ohne Eltern-Line
    Point,
    /// Point mit mindestens einer Eltern-Line
    Vertex,
    Line,
    Area,
    Relation,
}

impl Geometry {
    pub fn as_str(&self) -> &'static str {
        match self {
            Geometry::Point => "point",
            Geometry::Vertex => "vertex",
            Geometry::Line => "line",
            Geometry::Area => "area",
            Geometry::Relation => "relation",
        }
    }
}

/// Geladener Datenbestand inkl. vollständiger Eltern-Indizes.
#[derive(Debug, Clone, Default)]
struct BaseLayer {
    entities: HashMap<EntityId, Arc<Entity>>,
    parent_ways: ParentMap,
    parent_rels: ParentMap,
}

/// Seit Etablierung der Basis berührte Entities (`None` = gelöscht) und
/// die dadurch geänderten Eltern-Listen.
#[derive(Debug, Clone, Default)]
struct LocalLayer {
    entities: HashMap<EntityId, Option<Arc<Entity>>>,
    parent_ways: ParentMap,
    parent_rels: ParentMap,
}

/// Persistenter Graph über Entities.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    base: Arc<BaseLayer>,
    local: Arc<LocalLayer>,
}

/// Eindeutige Kind-IDs eines Entities (Points einer Line, Mitglieder einer Relation).
fn children(entity: &Entity) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = match entity.kind() {
        EntityKind::Line => entity.nodes().to_vec(),
        EntityKind::Relation => entity.members().iter().map(|m| m.id).collect(),
        EntityKind::Point => Vec::new(),
    };
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Kind-Differenz zwischen alter und neuer Version: (entfernt, hinzugefügt).
fn child_delta(old: Option<&Entity>, new: Option<&Entity>) -> (Vec<EntityId>, Vec<EntityId>) {
    let old_children: HashSet<EntityId> = old.map(children).unwrap_or_default().into_iter().collect();
    let new_children: Vec<EntityId> = new.map(children).unwrap_or_default();
    let new_set: HashSet<EntityId> = new_children.iter().copied().collect();

    let mut removed: Vec<EntityId> = old_children.difference(&new_set).copied().collect();
    removed.sort_unstable();
    let added = new_children
        .into_iter()
        .filter(|id| !old_children.contains(id))
        .collect();
    (removed, added)
}

/// Trägt `parent` bei den Kindern aus/ein. Fehlt eine Liste in `parents`,
/// wird sie aus `fallback` kopiert (lokale Überschreibung der Basis).
fn relink(
    parents: &mut ParentMap,
    fallback: Option<&ParentMap>,
    parent: EntityId,
    removed: &[EntityId],
    added: &[EntityId],
) {
    fn current(parents: &ParentMap, fallback: Option<&ParentMap>, child: EntityId) -> Vec<EntityId> {
        parents
            .get(&child)
            .or_else(|| fallback.and_then(|f| f.get(&child)))
            .cloned()
            .unwrap_or_default()
    }

    for &child in removed {
        let mut list = current(parents, fallback, child);
        list.retain(|&p| p != parent);
        parents.insert(child, list);
    }
    for &child in added {
        let mut list = current(parents, fallback, child);
        if !list.contains(&parent) {
            list.push(parent);
        }
        parents.insert(child, list);
    }
}

impl BaseLayer {
    fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let mut base = BaseLayer::default();
        for entity in entities {
            base.insert(Arc::new(entity));
        }
        for list in base.parent_ways.values_mut().chain(base.parent_rels.values_mut()) {
            list.sort_unstable();
        }
        base
    }

    fn insert(&mut self, entity: Arc<Entity>) {
        let id = entity.id();
        let old = self.entities.get(&id).cloned();
        let (removed, added) = child_delta(old.as_deref(), Some(&*entity));
        let parents = match id.kind() {
            EntityKind::Relation => &mut self.parent_rels,
            _ => &mut self.parent_ways,
        };
        relink(parents, None, id, &removed, &added);
        self.entities.insert(id, entity);
    }
}

impl Graph {
    /// Erstellt einen Graphen mit den gegebenen Entities als Basis.
    pub fn new(entities: impl IntoIterator<Item = Entity>) -> Self {
        let base = BaseLayer::from_entities(entities);
        log::debug!("Graph-Basis mit {} Entities aufgebaut", base.entities.len());
        Self {
            base: Arc::new(base),
            local: Arc::new(LocalLayer::default()),
        }
    }

    /// Leerer Graph.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Entity zur ID (lokal vor Basis), `None` wenn unbekannt oder gelöscht.
    pub fn entity(&self, id: EntityId) -> Option<&Arc<Entity>> {
        match self.local.entities.get(&id) {
            Some(local) => local.as_ref(),
            None => self.base.entities.get(&id),
        }
    }

    pub fn has_entity(&self, id: EntityId) -> bool {
        self.entity(id).is_some()
    }

    /// Entity in der Basis-Schicht, unabhängig von lokalen Änderungen.
    pub fn base_entity(&self, id: EntityId) -> Option<&Arc<Entity>> {
        self.base.entities.get(&id)
    }

    /// Gleicher Graph mit leerer lokaler Schicht.
    pub fn base_graph(&self) -> Graph {
        Self {
            base: Arc::clone(&self.base),
            local: Arc::new(LocalLayer::default()),
        }
    }

    /// Teilen beide Graphen dieselbe Basis?
    pub fn shares_base_with(&self, other: &Graph) -> bool {
        Arc::ptr_eq(&self.base, &other.base)
    }

    /// IDs aller lokal berührten Entities (inkl. gelöschter).
    pub fn local_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.local.entities.keys().copied()
    }

    pub fn is_local_empty(&self) -> bool {
        self.local.entities.is_empty()
    }

    /// Alle lebenden Entities (Reihenfolge unbestimmt).
    pub fn entities(&self) -> impl Iterator<Item = &Arc<Entity>> + '_ {
        let base = self
            .base
            .entities
            .iter()
            .filter(|(id, _)| !self.local.entities.contains_key(id))
            .map(|(_, entity)| entity);
        let local = self.local.entities.values().filter_map(Option::as_ref);
        base.chain(local)
    }

    /// Lines, die den Point referenzieren.
    pub fn parent_ways(&self, id: EntityId) -> &[EntityId] {
        self.local
            .parent_ways
            .get(&id)
            .or_else(|| self.base.parent_ways.get(&id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Relations, die das Entity als Mitglied führen.
    pub fn parent_relations(&self, id: EntityId) -> &[EntityId] {
        self.local
            .parent_rels
            .get(&id)
            .or_else(|| self.base.parent_rels.get(&id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Auflösbare Points einer Line in Reihenfolge.
    pub fn child_nodes(&self, line: &Entity) -> Vec<Arc<Entity>> {
        line.nodes()
            .iter()
            .filter_map(|id| self.entity(*id).cloned())
            .collect()
    }

    /// Geometrie-Klasse aus Variante, Tags und Eltern-Verknüpfung.
    pub fn geometry(&self, id: EntityId) -> Option<Geometry> {
        let entity = self.entity(id)?;
        Some(match entity.kind() {
            EntityKind::Point if self.parent_ways(id).is_empty() => Geometry::Point,
            EntityKind::Point => Geometry::Vertex,
            EntityKind::Line if entity.is_area() => Geometry::Area,
            EntityKind::Line => Geometry::Line,
            EntityKind::Relation if entity.is_area() => Geometry::Area,
            EntityKind::Relation => Geometry::Relation,
        })
    }

    /// Ausdehnung eines Entities; Relations rekursiv über ihre Mitglieder.
    ///
    /// Nicht auflösbare Referenzen werden übersprungen.
    pub fn extent(&self, id: EntityId) -> Option<BBox> {
        let mut visited = HashSet::new();
        self.extent_inner(id, &mut visited)
    }

    fn extent_inner(&self, id: EntityId, visited: &mut HashSet<EntityId>) -> Option<BBox> {
        if !visited.insert(id) {
            return None;
        }
        let entity = self.entity(id)?;
        match entity.kind() {
            EntityKind::Point => entity.loc().map(BBox::from_point),
            EntityKind::Line => {
                BBox::from_points(entity.nodes().iter().filter_map(|n| self.entity(*n)?.loc()))
            }
            EntityKind::Relation => entity
                .members()
                .iter()
                .filter_map(|m| self.extent_inner(m.id, visited))
                .reduce(BBox::union),
        }
    }

    /// Installiert `entity` in der lokalen Schicht.
    ///
    /// Referenzielle Integrität wird hier nicht erzwungen; hängende
    /// Referenzen meldet die Validierung.
    pub fn replace(&self, entity: Entity) -> Graph {
        self.replace_arc(Arc::new(entity))
    }

    /// Wie [`Graph::replace`], für bereits geteilte Entities.
    pub fn replace_arc(&self, entity: Arc<Entity>) -> Graph {
        let id = entity.id();
        let old = self.entity(id).cloned();
        if old.as_ref().is_some_and(|o| Arc::ptr_eq(o, &entity)) {
            return self.clone();
        }

        let mut next = self.clone();
        let base = &next.base;
        let local = Arc::make_mut(&mut next.local);
        local.relink(base, id, old.as_deref(), Some(&*entity));
        local.entities.insert(id, Some(entity));
        next
    }

    /// Setzt einen Tombstone für `id`.
    ///
    /// Hat das Entity noch Eltern, bleiben deren Referenzen hängend stehen.
    pub fn remove(&self, id: EntityId) -> Graph {
        let Some(old) = self.entity(id).cloned() else {
            return self.clone();
        };
        if !self.parent_ways(id).is_empty() || !self.parent_relations(id).is_empty() {
            log::debug!("{} wird entfernt, obwohl noch Eltern existieren", id);
        }

        let mut next = self.clone();
        let base = &next.base;
        let local = Arc::make_mut(&mut next.local);
        local.relink(base, id, Some(&*old), None);
        local.entities.insert(id, None);
        next
    }

    /// Mehrere Entities nacheinander ersetzen.
    pub fn replace_all(&self, entities: impl IntoIterator<Item = Entity>) -> Graph {
        entities
            .into_iter()
            .fold(self.clone(), |graph, entity| graph.replace(entity))
    }

    /// Führt nachgeladene Entities in eine neue Basis ein.
    ///
    /// Bereits vorhandene Basis-Entities bleiben unverändert, außer bei `force`.
    /// Lokale Änderungen haben weiterhin Vorrang.
    pub fn rebase(&self, entities: &[Entity], force: bool) -> Graph {
        let mut base = (*self.base).clone();
        let mut local = (*self.local).clone();
        let mut inserted = 0usize;

        for entity in entities {
            let id = entity.id();
            let old = base.entities.get(&id).cloned();
            if old.is_some() && !force {
                continue;
            }
            let entity = Arc::new(entity.clone());

            local.adjust_overrides(id, old.as_deref(), &entity);
            base.insert(entity);
            inserted += 1;
        }

        log::debug!(
            "Graph-Rebase: {} von {} Entities übernommen (force={})",
            inserted,
            entities.len(),
            force
        );
        Self {
            base: Arc::new(base),
            local: Arc::new(local),
        }
    }

    /// Übernimmt die Basis von `rebased` (Ergebnis von [`Graph::rebase`] auf
    /// einem Geschwister-Graphen) unter Beibehaltung der eigenen lokalen Schicht.
    ///
    /// `loaded` nennt die IDs, die beim Rebase eingeführt wurden.
    pub(crate) fn adopt_base(&self, rebased: &Graph, loaded: &[EntityId]) -> Graph {
        if self.shares_base_with(rebased) {
            return self.clone();
        }
        let mut local = (*self.local).clone();
        for &id in loaded {
            let Some(entity) = rebased.base.entities.get(&id) else {
                continue;
            };
            let old = self.base.entities.get(&id);
            if old.is_some_and(|o| Arc::ptr_eq(o, entity)) {
                continue;
            }
            local.adjust_overrides(id, old.map(|o| o.as_ref()), entity);
        }
        Self {
            base: Arc::clone(&rebased.base),
            local: Arc::new(local),
        }
    }
}

impl LocalLayer {
    /// Zieht bestehende Eltern-Überschreibungen nach, wenn sich die Basis-Version
    /// von `id` ändert. Lokal geänderte Elternteile behalten ihre Sicht.
    fn adjust_overrides(&mut self, id: EntityId, old: Option<&Entity>, new: &Entity) {
        if self.entities.contains_key(&id) {
            return;
        }
        let (removed, added) = child_delta(old, Some(new));
        let overrides = match id.kind() {
            EntityKind::Relation => &mut self.parent_rels,
            _ => &mut self.parent_ways,
        };
        for child in &removed {
            if let Some(list) = overrides.get_mut(child) {
                list.retain(|&p| p != id);
            }
        }
        for child in &added {
            if let Some(list) = overrides.get_mut(child) {
                if !list.contains(&id) {
                    list.push(id);
                }
            }
        }
    }

    /// Aktualisiert die Eltern-Listen der Kinder von `id` für den Wechsel `old` → `new`.
    fn relink(&mut self, base: &BaseLayer, id: EntityId, old: Option<&Entity>, new: Option<&Entity>) {
        let (removed, added) = child_delta(old, new);
        if removed.is_empty() && added.is_empty() {
            return;
        }
        match id.kind() {
            EntityKind::Relation => relink(
                &mut self.parent_rels,
                Some(&base.parent_rels),
                id,
                &removed,
                &added,
            ),
            _ => relink(
                &mut self.parent_ways,
                Some(&base.parent_ways),
                id,
                &removed,
                &added,
            ),
        }
    }
}
