//! Edit-Session: verbindet History, Tree, Validierung und ID-Vergabe.
//!
//! Alle Änderungen laufen über die Session. Jede Meldung der History zieht
//! den Tree nach und validiert die betroffenen Entities (sofort oder
//! gesammelt über `validate_pending`).

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::app::actions::Action;
use crate::app::history::{ChangeEvent, History};
use crate::app::validation::{Issue, ValidationEngine};
use crate::core::{
    BBox, Difference, Entity, EntityId, EntityKind, Graph, IdAllocator, NewEntity, Tags, Tree,
};
use crate::shared::EngineOptions;

/// Kennung eines laufenden Hintergrund-Ladevorgangs.
///
/// Nur das Ticket des jüngsten, nicht abgebrochenen Ladevorgangs darf
/// Daten einspielen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket(u64);

/// Eine Edit-Session über einem geladenen Datenbestand.
pub struct EditSession {
    history: History,
    tree: Tree,
    validator: ValidationEngine,
    ids: IdAllocator,
    options: EngineOptions,
    /// Noch nicht validierte IDs (nur ohne `validate_eagerly`)
    pending: BTreeSet<EntityId>,
    load_generation: u64,
    active_load: Option<u64>,
}

impl EditSession {
    /// Session mit den eingebauten Validatoren.
    pub fn new(base: Graph, options: EngineOptions) -> Self {
        Self::with_validator(base, options, ValidationEngine::with_default_validators())
    }

    /// Session über frisch geladenen Entities.
    pub fn from_entities(entities: impl IntoIterator<Item = Entity>, options: EngineOptions) -> Self {
        Self::new(Graph::new(entities), options)
    }

    /// Session mit eigener Validierungs-Engine.
    pub fn with_validator(base: Graph, options: EngineOptions, mut validator: ValidationEngine) -> Self {
        validator.set_disabled(options.disabled_validations.iter().cloned());
        let tree = Tree::from_graph(&base, options.tree_level_base);
        let history = History::with_max_depth(base, options.history_max_depth);

        let mut session = Self {
            history,
            tree,
            validator,
            ids: IdAllocator::new(),
            options,
            pending: BTreeSet::new(),
            load_generation: 0,
            active_load: None,
        };
        if session.options.validate_eagerly {
            session.validator.validate_all(session.history.graph());
        } else {
            session.pending = session.history.graph().entities().map(|e| e.id()).collect();
        }
        log::info!(
            "Edit-Session gestartet: {} Entities indexiert, {} Issues",
            session.tree.len(),
            session.validator.issues().len()
        );
        session
    }

    // ── Lesen ───────────────────────────────────────────────────────

    pub fn graph(&self) -> &Graph {
        self.history.graph()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Entities im Ausschnitt (Stand: letzte gemeldete Änderung).
    pub fn query(&self, bbox: &BBox) -> Vec<Arc<Entity>> {
        self.tree.query(bbox)
    }

    pub fn issues(&self) -> Vec<Issue> {
        self.validator.issues()
    }

    pub fn entity_issues(&self, id: EntityId) -> Vec<Issue> {
        self.validator.entity_issues(id)
    }

    pub fn has_pending_validation(&self) -> bool {
        !self.pending.is_empty()
    }

    // ── Entities anlegen ────────────────────────────────────────────

    /// Nächste lokale ID der Variante.
    pub fn next_id(&mut self, kind: EntityKind) -> EntityId {
        self.ids.next(kind)
    }

    /// Erstellt ein Entity (noch nicht im Graphen).
    pub fn create(&mut self, attrs: NewEntity) -> Entity {
        self.ids.create(attrs)
    }

    // ── Edits ───────────────────────────────────────────────────────

    pub fn perform<A: Action + ?Sized>(&mut self, action: &A, annotation: Option<&str>) -> Option<ChangeEvent> {
        let event = self.history.perform(action, annotation);
        self.on_change(event)
    }

    pub fn replace<A: Action + ?Sized>(&mut self, action: &A, annotation: Option<&str>) -> Option<ChangeEvent> {
        let event = self.history.replace(action, annotation);
        self.on_change(event)
    }

    pub fn overwrite<A: Action + ?Sized>(&mut self, action: &A, annotation: Option<&str>) -> Option<ChangeEvent> {
        let event = self.history.overwrite(action, annotation);
        self.on_change(event)
    }

    pub fn pop(&mut self, n: usize) -> Option<ChangeEvent> {
        let event = self.history.pop(n);
        self.on_change(event)
    }

    pub fn undo(&mut self) -> Option<ChangeEvent> {
        let event = self.history.undo();
        self.on_change(event)
    }

    pub fn redo(&mut self) -> Option<ChangeEvent> {
        let event = self.history.redo();
        self.on_change(event)
    }

    pub fn reset(&mut self) -> Option<ChangeEvent> {
        let event = self.history.reset();
        self.on_change(event)
    }

    /// Führt `incoming` in die Tags von `id` ein (Längenbudget aus den Optionen).
    pub fn merge_tags(&mut self, id: EntityId, incoming: &Tags, annotation: Option<&str>) -> Option<ChangeEvent> {
        let max_chars = self.options.tag_value_max_chars;
        let merge = |graph: &Graph| match graph.entity(id) {
            Some(entity) => graph.replace(entity.merge_tags_with_limit(incoming, max_chars)),
            None => {
                log::warn!("Tags für {} nicht zusammenführbar: Entity fehlt", id);
                graph.clone()
            }
        };
        self.perform(&merge, annotation)
    }

    // ── Transaktionen ───────────────────────────────────────────────

    pub fn pause_change_dispatch(&mut self) {
        self.history.pause_change_dispatch();
    }

    /// Hebt eine Pause auf; das äußerste Resume aktualisiert Tree und Issues.
    pub fn resume_change_dispatch(&mut self) -> Option<ChangeEvent> {
        let event = self.history.resume_change_dispatch();
        self.on_change(event)
    }

    /// Führt `f` als eine beobachtbare Transaktion aus.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut EditSession) -> R) -> (R, Option<ChangeEvent>) {
        self.pause_change_dispatch();
        let result = f(self);
        let event = self.resume_change_dispatch();
        (result, event)
    }

    // ── Hintergrund-Laden ───────────────────────────────────────────

    /// Startet einen Ladevorgang. Ein noch laufender wird dadurch verdrängt.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.load_generation += 1;
        if let Some(previous) = self.active_load.replace(self.load_generation) {
            log::debug!("Ladevorgang {} durch {} verdrängt", previous, self.load_generation);
        }
        LoadTicket(self.load_generation)
    }

    /// Bricht den Ladevorgang ab; spätere Ergebnisse werden verworfen.
    pub fn abort_load(&mut self, ticket: LoadTicket) {
        if self.active_load == Some(ticket.0) {
            self.active_load = None;
            log::info!("Ladevorgang {} abgebrochen", ticket.0);
        }
    }

    /// Spielt geladene Entities ein. `false`, wenn das Ticket abgebrochen
    /// oder verdrängt wurde; Graph und Tree bleiben dann unberührt.
    pub fn complete_load(&mut self, ticket: LoadTicket, entities: &[Entity]) -> bool {
        if self.active_load != Some(ticket.0) {
            log::debug!("Ergebnis von Ladevorgang {} verworfen", ticket.0);
            return false;
        }
        self.active_load = None;

        let loaded = self.history.merge(entities, false);
        // Während einer Pause bleibt der Stand vor der Pause sichtbar; die
        // Änderungen der Transaktion kommen mit der Sammelmeldung beim Resume
        let graph = self.history.observed_graph().clone();

        let mut ids: BTreeSet<EntityId> = Difference::new(self.tree.graph(), &graph)
            .changed_ids()
            .into_iter()
            .collect();
        ids.extend(loaded.iter().copied());
        let ids: Vec<EntityId> = ids.into_iter().collect();
        self.tree.rebase(&graph, &ids, false);

        let affected = with_neighbors(&graph, &loaded);
        self.schedule_validation(&graph, affected);

        log::info!("Ladevorgang {}: {} Entities übernommen", ticket.0, loaded.len());
        true
    }

    // ── Validierung ─────────────────────────────────────────────────

    /// Validiert alle gesammelten IDs.
    pub fn validate_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let ids: Vec<EntityId> = std::mem::take(&mut self.pending).into_iter().collect();
        self.validator.validate_entities(self.history.observed_graph(), &ids);
    }

    /// Validiert den gesamten Graphen neu.
    pub fn validate_all(&mut self) {
        self.pending.clear();
        self.validator.validate_all(self.history.observed_graph());
    }

    /// Validiert die Entities im Ausschnitt und liefert deren Issues.
    pub fn validate_extent(&mut self, bbox: &BBox) -> Vec<Issue> {
        self.validator
            .validate_extent(self.history.observed_graph(), &self.tree, bbox)
    }

    fn on_change(&mut self, event: Option<ChangeEvent>) -> Option<ChangeEvent> {
        let event = event?;
        self.tree.update_to(&event.current);
        let affected = event.difference.complete(&event.previous, &event.current);
        self.schedule_validation(&event.current, affected);
        Some(event)
    }

    fn schedule_validation(&mut self, graph: &Graph, ids: Vec<EntityId>) {
        if self.options.validate_eagerly {
            self.validator.validate_entities(graph, &ids);
        } else {
            self.pending.extend(ids);
        }
    }
}

/// IDs plus Eltern, Points geladener Lines und Mitglieder geladener Relations.
fn with_neighbors(graph: &Graph, ids: &[EntityId]) -> Vec<EntityId> {
    let mut all: BTreeSet<EntityId> = BTreeSet::new();
    for &id in ids {
        all.insert(id);
        all.extend(graph.parent_ways(id).iter().copied());
        all.extend(graph.parent_relations(id).iter().copied());
        if let Some(entity) = graph.entity(id) {
            all.extend(entity.nodes().iter().copied());
            all.extend(entity.members().iter().map(|m| m.id));
        }
    }
    all.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::actions::{AddEntity, AddVertex, ChangeTags, MoveNode};
    use crate::core::{tags_from, EntityData, Member};
    use glam::DVec2;

    fn p(raw: i64) -> EntityId {
        EntityId::point(raw)
    }

    fn w(raw: i64) -> EntityId {
        EntityId::line(raw)
    }

    fn street() -> Vec<Entity> {
        vec![
            Entity::point(p(1), DVec2::new(0.0, 0.0), Tags::new()),
            Entity::point(p(2), DVec2::new(1.0, 0.0), Tags::new()),
            Entity::line(w(1), vec![p(1), p(2)], tags_from([("highway", "residential")])),
        ]
    }

    fn around(x: f64, y: f64) -> BBox {
        BBox::new(DVec2::new(x - 0.1, y - 0.1), DVec2::new(x + 0.1, y + 0.1))
    }

    #[test]
    fn test_perform_updates_tree_and_issues() {
        let mut session = EditSession::from_entities(street(), EngineOptions::default());
        assert!(session.issues().is_empty());

        let point = session.create(NewEntity {
            id: None,
            tags: Tags::new(),
            data: EntityData::Point {
                loc: DVec2::new(5.0, 5.0),
            },
        });
        let id = point.id();
        assert_eq!(id, p(-1));

        let event = session.perform(&AddEntity::new(point), Some("Punkt hinzugefügt"));
        assert_eq!(event.map(|e| e.changed_ids()), Some(vec![id]));
        assert_eq!(session.query(&around(5.0, 5.0)).len(), 1);
        // ungetaggter, freistehender Point
        assert_eq!(session.entity_issues(id).len(), 1);

        session.undo();
        assert!(session.query(&around(5.0, 5.0)).is_empty());
        assert!(session.issues().is_empty());
    }

    #[test]
    fn test_batch_is_one_transaction() {
        let mut session = EditSession::from_entities(street(), EngineOptions::default());
        let id = session.next_id(EntityKind::Point);

        let (_, event) = session.batch(|s| {
            s.perform(&AddEntity::new(Entity::point(id, DVec2::new(2.0, 0.0), Tags::new())), None);
            s.perform(&AddVertex::new(w(1), id, None), Some("Line verlängert"));
            // Tree wird erst beim Resume nachgezogen
            assert!(s.query(&around(2.0, 0.0)).is_empty());
        });

        let event = event.expect("Sammelmeldung erwartet");
        assert_eq!(event.annotation.as_deref(), Some("Line verlängert"));
        assert_eq!(event.changed_ids(), vec![id, w(1)]);
        assert_eq!(session.query(&around(2.0, 0.0)).len(), 2);
        // Vertex der Line: kein missing_tag
        assert!(session.issues().is_empty());
    }

    #[test]
    fn test_lazy_validation_waits_for_pending() {
        let options = EngineOptions {
            validate_eagerly: false,
            ..EngineOptions::default()
        };
        let mut session = EditSession::from_entities(street(), options);
        assert!(session.has_pending_validation());
        session.validate_pending();

        session.perform(&ChangeTags::new(w(1), Tags::new()), Some("Tags entfernt"));
        assert!(session.issues().is_empty());
        assert!(session.has_pending_validation());

        session.validate_pending();
        assert_eq!(session.entity_issues(w(1)).len(), 1);
    }

    #[test]
    fn test_complete_load_merges_into_all_states() {
        let mut session = EditSession::from_entities(street(), EngineOptions::default());
        session.perform(&MoveNode::new(p(1), DVec2::new(0.0, 1.0)), Some("Verschoben"));

        let ticket = session.begin_load();
        let loaded = vec![
            Entity::point(p(3), DVec2::new(3.0, 3.0), Tags::new()),
            Entity::point(p(4), DVec2::new(4.0, 3.0), Tags::new()),
            Entity::line(w(2), vec![p(3), p(4)], tags_from([("highway", "track")])),
        ];
        assert!(session.complete_load(ticket, &loaded));
        assert!(session.graph().has_entity(w(2)));
        assert_eq!(session.query(&around(3.0, 3.0)).len(), 2);

        session.undo();
        assert!(session.graph().has_entity(w(2)));
        assert_eq!(session.graph().entity(p(1)).and_then(|e| e.loc()), Some(DVec2::ZERO));
        assert_eq!(session.query(&around(0.0, 0.0)).len(), 2);
    }

    #[test]
    fn test_aborted_or_superseded_load_is_ignored() {
        let mut session = EditSession::from_entities(street(), EngineOptions::default());
        let extra = [Entity::point(p(9), DVec2::new(9.0, 9.0), Tags::new())];

        let aborted = session.begin_load();
        session.abort_load(aborted);
        assert!(!session.complete_load(aborted, &extra));

        let old = session.begin_load();
        let current = session.begin_load();
        assert!(!session.complete_load(old, &extra));
        assert!(!session.graph().has_entity(p(9)));
        assert!(session.query(&around(9.0, 9.0)).is_empty());

        assert!(session.complete_load(current, &extra));
        assert!(session.graph().has_entity(p(9)));
        // Ticket ist nur einmal gültig
        assert!(!session.complete_load(current, &extra));
    }

    #[test]
    fn test_merge_tags_respects_budget() {
        let options = EngineOptions {
            tag_value_max_chars: 10,
            ..EngineOptions::default()
        };
        let mut session = EditSession::from_entities(street(), options);
        session.merge_tags(w(1), &tags_from([("highway", "service_road_long")]), Some("Tags zusammengeführt"));

        let value = session
            .graph()
            .entity(w(1))
            .and_then(|e| e.tag("highway").map(str::to_owned))
            .expect("highway erwartet");
        assert_eq!(value.chars().count(), 10);
        assert!(value.starts_with("residentia"));
    }

    #[test]
    fn test_detached_relation_member_is_revalidated() {
        let mut entities = street();
        entities[2] = Entity::line(w(1), vec![p(1), p(2)], Tags::new());
        entities.push(Entity::relation(
            EntityId::relation(1),
            vec![Member::new(w(1), "outer")],
            tags_from([("type", "multipolygon"), ("landuse", "meadow")]),
        ));
        let mut session = EditSession::from_entities(entities, EngineOptions::default());
        assert!(session.entity_issues(w(1)).is_empty(), "Mitglied ohne Tags ist erlaubt");

        let detach = |graph: &Graph| match graph.entity(EntityId::relation(1)) {
            Some(relation) => graph.replace(relation.remove_members_with_id(w(1))),
            None => graph.clone(),
        };
        session.perform(&detach, Some("Mitglied entfernt"));

        let keys: Vec<String> = session.entity_issues(w(1)).into_iter().map(|i| i.key).collect();
        assert_eq!(keys, vec!["missing_tag-w1-any".to_string()]);

        let mut fresh = ValidationEngine::with_default_validators();
        fresh.validate_all(session.graph());
        let fresh_keys: Vec<String> = fresh.issues().into_iter().map(|i| i.key).collect();
        let session_keys: Vec<String> = session.issues().into_iter().map(|i| i.key).collect();
        assert_eq!(session_keys, fresh_keys);
    }

    #[test]
    fn test_load_during_pause_keeps_transaction_hidden() {
        let mut session = EditSession::from_entities(street(), EngineOptions::default());
        session.pause_change_dispatch();
        session.perform(&MoveNode::new(p(1), DVec2::new(5.0, 5.0)), Some("Verschoben"));

        let ticket = session.begin_load();
        let loaded = vec![Entity::point(p(9), DVec2::new(3.0, 3.0), tags_from([("amenity", "bench")]))];
        assert!(session.complete_load(ticket, &loaded));

        // Geladenes ist sichtbar, die laufende Transaktion nicht
        assert!(session.query(&around(3.0, 3.0)).iter().any(|e| e.id() == p(9)));
        assert!(session.query(&around(5.0, 5.0)).is_empty());
        assert!(session.query(&around(0.0, 0.0)).iter().any(|e| e.id() == p(1)));

        let event = session.resume_change_dispatch().expect("Sammelmeldung erwartet");
        assert!(event.changed_ids().contains(&p(1)));
        assert!(!event.changed_ids().contains(&p(9)), "Geladenes ist keine Änderung");
        assert!(session.query(&around(5.0, 5.0)).iter().any(|e| e.id() == p(1)));
        assert!(!session.query(&around(0.0, 0.0)).iter().any(|e| e.id() == p(1)));
        assert!(session.query(&around(3.0, 3.0)).iter().any(|e| e.id() == p(9)));
    }

    #[test]
    fn test_disabled_validations_from_options() {
        let options = EngineOptions {
            disabled_validations: vec!["missing_tag".into()],
            ..EngineOptions::default()
        };
        let mut session = EditSession::from_entities(street(), options);
        session.perform(&ChangeTags::new(w(1), Tags::new()), Some("Tags entfernt"));
        assert!(session.issues().is_empty());
    }
}
