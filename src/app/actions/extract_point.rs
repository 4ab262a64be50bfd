//! Action: getaggten Point aus seinen Eltern herauslösen bzw. die Tags
//! einer Line/Fläche auf einen eigenen Point übertragen.

use super::{Action, DisabledReason};
use crate::core::{Entity, EntityId, EntityKind, EntityPatch, Graph, Loc, Tags};

/// Keys, die auf Line/Fläche bleiben und zusätzlich kopiert werden.
const COPY_AND_RETAIN_KEYS: &[&str] = &["source", "wheelchair"];
/// Keys, die ausschließlich auf Line/Fläche bleiben.
const RETAIN_KEYS: &[&str] = &["area"];
/// Zusätzlich bei Gebäuden auf der Fläche verbleibende Keys.
const BUILDING_RETAIN_KEYS: &[&str] = &["architect", "building", "height", "layer"];

/// Löst einen Point heraus.
///
/// - **Vertex:** Der getaggte Point verlässt alle Eltern; an seiner Stelle
///   wird ein ungetaggter Point `new_id` eingesetzt. Herausgelöst wird `id`.
/// - **Line/Relation:** Ein neuer Point `new_id` übernimmt die Tags
///   (bis auf flächenbezogene Keys) und liegt im Schwerpunkt.
///
/// Mit `loc` wird der herausgelöste Point direkt dorthin gesetzt.
#[derive(Debug, Clone, Copy)]
pub struct ExtractPoint {
    pub id: EntityId,
    pub new_id: EntityId,
    pub loc: Option<Loc>,
}

impl ExtractPoint {
    pub fn new(id: EntityId, new_id: EntityId) -> Self {
        Self {
            id,
            new_id,
            loc: None,
        }
    }

    pub fn with_loc(mut self, loc: Loc) -> Self {
        self.loc = Some(loc);
        self
    }

    /// ID des Points, der nach der Action die Tags trägt.
    pub fn extracted_node_id(&self) -> EntityId {
        match self.id.kind() {
            EntityKind::Point => self.id,
            _ => self.new_id,
        }
    }

    fn extract_vertex(&self, graph: &Graph, node: &Entity) -> Graph {
        let Some(loc) = node.loc() else {
            return graph.clone();
        };
        let mut next = graph.replace(Entity::point(self.new_id, loc, Tags::new()));

        for &line_id in graph.parent_ways(self.id) {
            if let Some(line) = next.entity(line_id).cloned() {
                next = next.replace(line.replace_node(self.id, self.new_id));
            }
        }
        for &rel_id in graph.parent_relations(self.id) {
            if let Some(rel) = next.entity(rel_id).cloned() {
                next = next.replace(rel.replace_member(self.id, self.new_id));
            }
        }
        if let Some(target) = self.loc {
            next = next.replace(node.update(EntityPatch::loc(target)));
        }

        log::debug!("ExtractPoint: {} herausgelöst, Ersatz {}", self.id, self.new_id);
        next
    }

    fn extract_from_feature(&self, graph: &Graph, feature: &Entity) -> Graph {
        let Some(centroid) = self.loc.or_else(|| centroid(graph, feature)) else {
            return graph.clone();
        };

        let is_building = feature.tag("building").is_some_and(|v| v != "no");
        let mut kept = Tags::new();
        let mut moved = Tags::new();
        for (key, value) in feature.tags() {
            let key_str = key.as_str();
            if RETAIN_KEYS.contains(&key_str)
                || (is_building && BUILDING_RETAIN_KEYS.contains(&key_str))
            {
                kept.insert(key.clone(), value.clone());
            } else if COPY_AND_RETAIN_KEYS.contains(&key_str) {
                kept.insert(key.clone(), value.clone());
                moved.insert(key.clone(), value.clone());
            } else {
                moved.insert(key.clone(), value.clone());
            }
        }

        let next = graph
            .replace(feature.update(EntityPatch::tags(kept)))
            .replace(Entity::point(self.new_id, centroid, moved));

        log::debug!(
            "ExtractPoint: Tags von {} auf neuen Point {} übertragen",
            self.id,
            self.new_id
        );
        next
    }
}

/// Mittelwert der eindeutigen Points einer Line, Zentrum der Ausdehnung sonst.
fn centroid(graph: &Graph, feature: &Entity) -> Option<Loc> {
    if feature.kind() != EntityKind::Line {
        return graph.extent(feature.id()).map(|b| b.center());
    }
    let mut ids = feature.nodes().to_vec();
    if feature.is_closed() {
        ids.pop();
    }
    let locs: Vec<Loc> = ids
        .iter()
        .filter_map(|id| graph.entity(*id)?.loc())
        .collect();
    if locs.is_empty() {
        return None;
    }
    Some(locs.iter().copied().sum::<Loc>() / locs.len() as f64)
}

impl Action for ExtractPoint {
    fn apply(&self, graph: &Graph) -> Graph {
        if let Some(reason) = self.disabled(graph) {
            log::warn!("ExtractPoint: {} nicht möglich ({})", self.id, reason.code());
            return graph.clone();
        }
        let Some(entity) = graph.entity(self.id).cloned() else {
            return graph.clone();
        };
        match entity.kind() {
            EntityKind::Point => self.extract_vertex(graph, &entity),
            _ => self.extract_from_feature(graph, &entity),
        }
    }

    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        let Some(entity) = graph.entity(self.id) else {
            return Some(DisabledReason::NotFound);
        };
        if self.new_id.kind() != EntityKind::Point {
            return Some(DisabledReason::NotAPoint);
        }
        if graph.has_entity(self.new_id) {
            return Some(DisabledReason::IdCollision);
        }
        if !entity.has_interesting_tags() {
            return Some(DisabledReason::NoInterestingTags);
        }
        match entity.kind() {
            EntityKind::Point => {
                let attached = !graph.parent_ways(self.id).is_empty()
                    || !graph.parent_relations(self.id).is_empty();
                (!attached).then_some(DisabledReason::NotAttached)
            }
            _ => graph
                .extent(self.id)
                .is_none()
                .then_some(DisabledReason::NotFound),
        }
    }
}
