//! Validierung: reine Prüffunktionen `(Entity, Graph) → Issues`.
//!
//! Validatoren halten keinen Zustand. Die [`ValidationEngine`] ruft sie für
//! alle oder nur die betroffenen Entities auf, cached die Ergebnisse je
//! Entity und fasst gleiche Issues über ihren `key` zusammen.

mod crossing_tags;
mod dangling_reference;
mod missing_tag;

pub use crossing_tags::AmbiguousCrossingTags;
pub use dangling_reference::DanglingReference;
pub use missing_tag::MissingTag;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use indexmap::IndexMap;
use serde::Serialize;

use crate::app::actions::ChangeTags;
use crate::core::{BBox, Entity, EntityId, EntityKind, Graph, Loc, Tags, Tree};

/// Schweregrad eines Issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// Vorgeschlagene Korrektur: neue Tag-Map für ein Entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fix {
    /// Stabiler Bezeichner der Korrektur
    pub id: String,
    pub title: String,
    pub entity_id: EntityId,
    pub tags: Tags,
}

impl Fix {
    /// Die Korrektur als ausführbare Action.
    pub fn action(&self) -> ChangeTags {
        ChangeTags::new(self.entity_id, self.tags.clone())
    }
}

/// Gefundenes Problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub issue_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub severity: Severity,
    /// Beteiligte Entities (sortiert)
    pub entity_ids: Vec<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<Loc>,
    /// Identität unabhängig davon, welches Entity das Issue gemeldet hat
    pub key: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fixes: Vec<Fix>,
}

impl Issue {
    /// Neues Issue. Der Key setzt sich aus Typ, sortierten IDs und dem
    /// optionalen Unterscheider zusammen.
    pub fn new(
        issue_type: &str,
        severity: Severity,
        mut entity_ids: Vec<EntityId>,
        discriminator: Option<&str>,
    ) -> Self {
        entity_ids.sort_unstable();
        entity_ids.dedup();

        let ids: Vec<String> = entity_ids.iter().map(EntityId::to_string).collect();
        let mut key = format!("{}-{}", issue_type, ids.join(","));
        if let Some(extra) = discriminator {
            key.push('-');
            key.push_str(extra);
        }

        Self {
            issue_type: issue_type.to_owned(),
            subtype: None,
            severity,
            entity_ids,
            loc: None,
            key,
            message: String::new(),
            fixes: Vec::new(),
        }
    }

    pub fn with_subtype(mut self, subtype: &str) -> Self {
        self.subtype = Some(subtype.to_owned());
        self
    }

    pub fn with_loc(mut self, loc: Option<Loc>) -> Self {
        self.loc = loc;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_fix(mut self, fix: Fix) -> Self {
        self.fixes.push(fix);
        self
    }

    pub fn involves(&self, id: EntityId) -> bool {
        self.entity_ids.contains(&id)
    }
}

/// Reine Prüffunktion, registriert unter einem Typ-Schlüssel.
pub trait Validator {
    fn issue_type(&self) -> &str;

    fn validate(&self, entity: &Entity, graph: &Graph) -> Vec<Issue>;
}

/// Validator aus einer Closure.
pub struct FnValidator<F> {
    issue_type: String,
    check: F,
}

impl<F> Validator for FnValidator<F>
where
    F: Fn(&Entity, &Graph) -> Vec<Issue>,
{
    fn issue_type(&self) -> &str {
        &self.issue_type
    }

    fn validate(&self, entity: &Entity, graph: &Graph) -> Vec<Issue> {
        (self.check)(entity, graph)
    }
}

/// Verpackt eine Closure als [`Validator`].
pub fn validator_fn<F>(issue_type: &str, check: F) -> FnValidator<F>
where
    F: Fn(&Entity, &Graph) -> Vec<Issue>,
{
    FnValidator {
        issue_type: issue_type.to_owned(),
        check,
    }
}

/// Führt registrierte Validatoren aus und verwaltet die Ergebnisse.
pub struct ValidationEngine {
    validators: Vec<Box<dyn Validator>>,
    disabled: HashSet<String>,
    /// Ergebnisse je geprüftem Entity
    cache: BTreeMap<EntityId, Vec<Issue>>,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::with_default_validators()
    }
}

impl ValidationEngine {
    /// Engine ohne Validatoren.
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
            disabled: HashSet::new(),
            cache: BTreeMap::new(),
        }
    }

    /// Engine mit allen eingebauten Validatoren.
    pub fn with_default_validators() -> Self {
        let mut engine = Self::new();
        engine.register(AmbiguousCrossingTags);
        engine.register(DanglingReference);
        engine.register(MissingTag);
        engine
    }

    /// Registriert einen Validator. Ein bereits vorhandener Typ wird ersetzt.
    pub fn register(&mut self, validator: impl Validator + 'static) {
        let issue_type = validator.issue_type().to_owned();
        self.validators.retain(|v| v.issue_type() != issue_type);
        self.validators.push(Box::new(validator));
    }

    pub fn validator_types(&self) -> Vec<&str> {
        self.validators.iter().map(|v| v.issue_type()).collect()
    }

    /// Schaltet Validatoren per Typ-Schlüssel ab.
    pub fn set_disabled<I, S>(&mut self, types: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled = types.into_iter().map(Into::into).collect();
        let known: HashSet<&str> = self.validator_types().into_iter().collect();
        for issue_type in &self.disabled {
            if !known.contains(issue_type.as_str()) {
                log::warn!("Unbekannter Validator '{}' kann nicht deaktiviert werden", issue_type);
            }
        }
    }

    /// Alle Validatoren auf ein Entity anwenden (ohne Cache).
    pub fn validate_entity(&self, entity: &Entity, graph: &Graph) -> Vec<Issue> {
        self.validators
            .iter()
            .filter(|v| !self.disabled.contains(v.issue_type()))
            .flat_map(|v| v.validate(entity, graph))
            .collect()
    }

    /// Verwirft alle Ergebnisse und prüft den ganzen Graphen.
    pub fn validate_all(&mut self, graph: &Graph) {
        self.cache.clear();
        for entity in graph.entities() {
            let issues = self.validate_entity(entity, graph);
            if !issues.is_empty() {
                self.cache.insert(entity.id(), issues);
            }
        }
        log::info!(
            "Validierung: {} Entities geprüft, {} Issues",
            self.cache.len(),
            self.issues().len()
        );
    }

    /// Prüft nur die gegebenen IDs neu. Nicht mehr vorhandene IDs verlieren
    /// ihre Ergebnisse.
    ///
    /// Lines an gegebenen Points werden mitgeprüft, da ihre Issues vom
    /// Nachbarn am gemeinsamen Point abhängen können.
    pub fn validate_entities(&mut self, graph: &Graph, ids: &[EntityId]) {
        let mut related: BTreeSet<EntityId> = ids.iter().copied().collect();
        for &id in ids {
            if id.kind() == EntityKind::Point {
                related.extend(graph.parent_ways(id).iter().copied());
            }
        }

        for &id in &related {
            let issues = match graph.entity(id) {
                Some(entity) => self.validate_entity(entity, graph),
                None => Vec::new(),
            };
            if issues.is_empty() {
                self.cache.remove(&id);
            } else {
                self.cache.insert(id, issues);
            }
        }
        log::debug!("Validierung: {} Entities neu geprüft", related.len());
    }

    /// Prüft alle im Ausschnitt indizierten Entities und liefert deren Issues.
    pub fn validate_extent(&mut self, graph: &Graph, tree: &Tree, bbox: &BBox) -> Vec<Issue> {
        let ids = tree.query_ids(bbox);
        self.validate_entities(graph, &ids);
        let in_extent: HashSet<EntityId> = ids.into_iter().collect();
        self.issues()
            .into_iter()
            .filter(|issue| issue.entity_ids.iter().any(|id| in_extent.contains(id)))
            .collect()
    }

    /// Alle Issues, über `key` dedupliziert. Fehler vor Warnungen.
    pub fn issues(&self) -> Vec<Issue> {
        let mut by_key: IndexMap<&str, &Issue> = IndexMap::new();
        for issue in self.cache.values().flatten() {
            by_key.entry(issue.key.as_str()).or_insert(issue);
        }
        let mut issues: Vec<Issue> = by_key.into_values().cloned().collect();
        issues.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.key.cmp(&b.key)));
        issues
    }

    /// Issues, an denen `id` beteiligt ist.
    pub fn entity_issues(&self, id: EntityId) -> Vec<Issue> {
        self.issues()
            .into_iter()
            .filter(|issue| issue.involves(id))
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        self.cache
            .values()
            .flatten()
            .any(|issue| issue.severity == Severity::Error)
    }

    /// Verwirft alle Ergebnisse.
    pub fn reset(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests;
