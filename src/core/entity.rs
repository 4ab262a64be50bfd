//! Versionierte Entities (Point, Line, Relation) mit Copy-on-Write-Updates.
//!
//! Entities sind Werte: `update` verändert nie den Empfänger, sondern liefert
//! ein neues Entity, das unveränderte Felder per `Arc` teilt. Jede Erzeugung
//! und jedes Update zieht eine neue Version aus einem prozessweiten Zähler,
//! sodass `id + version` als Cache-Schlüssel taugt.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::geo::Loc;
use super::tags::{self, Tags, MAX_TAG_VALUE_CHARS};

/// Prozessweiter Versionszähler. Versionen werden nie wiederverwendet.
static VERSION_CLOCK: AtomicU64 = AtomicU64::new(0);

fn next_version() -> u64 {
    VERSION_CLOCK.fetch_add(1, Ordering::Relaxed) + 1
}

/// Variante eines Entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// Einzelner Punkt mit Koordinate
    Point,
    /// Geordnete Folge von Points
    Line,
    /// Beliebige Mitglieder mit Rolle
    Relation,
}

impl EntityKind {
    fn prefix(self) -> char {
        match self {
            EntityKind::Point => 'n',
            EntityKind::Line => 'w',
            EntityKind::Relation => 'r',
        }
    }
}

/// Global eindeutige Entity-ID. Negative Werte markieren lokal erzeugte Entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    kind: EntityKind,
    raw: i64,
}

impl EntityId {
    /// ID mit expliziter Variante.
    pub const fn new(kind: EntityKind, raw: i64) -> Self {
        Self { kind, raw }
    }

    /// Point-ID.
    pub const fn point(raw: i64) -> Self {
        Self::new(EntityKind::Point, raw)
    }

    /// Line-ID.
    pub const fn line(raw: i64) -> Self {
        Self::new(EntityKind::Line, raw)
    }

    /// Relation-ID.
    pub const fn relation(raw: i64) -> Self {
        Self::new(EntityKind::Relation, raw)
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn raw(&self) -> i64 {
        self.raw
    }

    /// Noch keine kanonische ID vergeben (lokal erzeugt).
    pub fn is_local(&self) -> bool {
        self.raw < 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.raw)
    }
}

impl FromStr for EntityId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let kind = match chars.next() {
            Some('n') => EntityKind::Point,
            Some('w') => EntityKind::Line,
            Some('r') => EntityKind::Relation,
            _ => return Err(format!("Ungültiges ID-Präfix: {s:?}")),
        };
        let raw = chars
            .as_str()
            .parse::<i64>()
            .map_err(|e| format!("Ungültige ID {s:?}: {e}"))?;
        Ok(Self { kind, raw })
    }
}

impl TryFrom<String> for EntityId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

/// Mitglied einer Relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Referenziertes Entity
    pub id: EntityId,
    /// Rolle innerhalb der Relation (darf leer sein)
    #[serde(default)]
    pub role: String,
}

impl Member {
    pub fn new(id: EntityId, role: impl Into<String>) -> Self {
        Self {
            id,
            role: role.into(),
        }
    }
}

/// Variantenspezifische Daten. Große Listen liegen hinter `Arc` (Structural Sharing).
#[derive(Debug, Clone, PartialEq)]
pub enum EntityData {
    Point { loc: Loc },
    Line { nodes: Arc<[EntityId]> },
    Relation { members: Arc<[Member]> },
}

impl EntityData {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityData::Point { .. } => EntityKind::Point,
            EntityData::Line { .. } => EntityKind::Line,
            EntityData::Relation { .. } => EntityKind::Relation,
        }
    }
}

/// Änderungen für [`Entity::update`]. Nicht gesetzte Felder bleiben geteilt.
#[derive(Debug, Clone, Default)]
pub struct EntityPatch {
    pub tags: Option<Tags>,
    pub loc: Option<Loc>,
    pub nodes: Option<Vec<EntityId>>,
    pub members: Option<Vec<Member>>,
}

impl EntityPatch {
    pub fn tags(tags: Tags) -> Self {
        Self {
            tags: Some(tags),
            ..Self::default()
        }
    }

    pub fn loc(loc: Loc) -> Self {
        Self {
            loc: Some(loc),
            ..Self::default()
        }
    }

    pub fn nodes(nodes: Vec<EntityId>) -> Self {
        Self {
            nodes: Some(nodes),
            ..Self::default()
        }
    }

    pub fn members(members: Vec<Member>) -> Self {
        Self {
            members: Some(members),
            ..Self::default()
        }
    }
}

/// Attribute für [`IdAllocator::create`]. Ohne `id` wird eine lokale ID vergeben.
#[derive(Debug, Clone)]
pub struct NewEntity {
    pub id: Option<EntityId>,
    pub tags: Tags,
    pub data: EntityData,
}

/// Vergibt lokale (negative) IDs pro Variante. Eine Instanz pro Edit-Session.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next_point: i64,
    next_line: i64,
    next_relation: i64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next_point: -1,
            next_line: -1,
            next_relation: -1,
        }
    }

    /// Nächste freie lokale ID der Variante.
    pub fn next(&mut self, kind: EntityKind) -> EntityId {
        let counter = match kind {
            EntityKind::Point => &mut self.next_point,
            EntityKind::Line => &mut self.next_line,
            EntityKind::Relation => &mut self.next_relation,
        };
        let raw = *counter;
        *counter -= 1;
        EntityId::new(kind, raw)
    }

    /// Erstellt ein Entity und vergibt bei Bedarf eine lokale ID.
    pub fn create(&mut self, attrs: NewEntity) -> Entity {
        let id = match attrs.id {
            Some(id) => id,
            None => self.next(attrs.data.kind()),
        };
        Entity::new(id, attrs.data, attrs.tags)
    }
}

/// Versionierter, unveränderlicher Datensatz des Graphen.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    version: u64,
    tags: Arc<Tags>,
    data: EntityData,
}

impl Entity {
    /// Erstellt ein Entity. Die Variante der ID muss zu `data` passen.
    pub fn new(id: EntityId, data: EntityData, tags: Tags) -> Self {
        debug_assert_eq!(id.kind(), data.kind(), "ID-Variante passt nicht zu den Daten");
        if id.kind() != data.kind() {
            log::error!("ID {} passt nicht zu {:?}, Variante wird korrigiert", id, data.kind());
        }
        let id = EntityId::new(data.kind(), id.raw());
        let data = match data {
            EntityData::Line { nodes } => EntityData::Line {
                nodes: sanitize_nodes(id, nodes.to_vec()).into(),
            },
            other => other,
        };
        Self {
            id,
            version: next_version(),
            tags: Arc::new(tags::sanitize(tags)),
            data,
        }
    }

    /// Point mit Koordinate.
    pub fn point(id: EntityId, loc: Loc, tags: Tags) -> Self {
        Self::new(id, EntityData::Point { loc }, tags)
    }

    /// Line über die gegebenen Point-IDs.
    pub fn line(id: EntityId, nodes: Vec<EntityId>, tags: Tags) -> Self {
        Self::new(
            id,
            EntityData::Line {
                nodes: nodes.into(),
            },
            tags,
        )
    }

    /// Relation mit Mitgliedern.
    pub fn relation(id: EntityId, members: Vec<Member>, tags: Tags) -> Self {
        Self::new(
            id,
            EntityData::Relation {
                members: members.into(),
            },
            tags,
        )
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn kind(&self) -> EntityKind {
        self.data.kind()
    }

    pub fn data(&self) -> &EntityData {
        &self.data
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Wert eines einzelnen Tags.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Koordinate, nur für Points.
    pub fn loc(&self) -> Option<Loc> {
        match &self.data {
            EntityData::Point { loc } => Some(*loc),
            _ => None,
        }
    }

    /// Point-IDs einer Line, leer für andere Varianten.
    pub fn nodes(&self) -> &[EntityId] {
        match &self.data {
            EntityData::Line { nodes } => nodes,
            _ => &[],
        }
    }

    /// Mitglieder einer Relation, leer für andere Varianten.
    pub fn members(&self) -> &[Member] {
        match &self.data {
            EntityData::Relation { members } => members,
            _ => &[],
        }
    }

    /// Liefert ein neues Entity mit angewendetem Patch und neuer Version.
    ///
    /// Patch-Felder, die nicht zur Variante passen, werden ignoriert.
    pub fn update(&self, patch: EntityPatch) -> Entity {
        let mut next = self.clone();

        if let Some(tags) = patch.tags {
            next.tags = Arc::new(tags::sanitize(tags));
        }

        match &mut next.data {
            EntityData::Point { loc } => {
                if let Some(new_loc) = patch.loc {
                    *loc = new_loc;
                }
                if patch.nodes.is_some() || patch.members.is_some() {
                    log::warn!("Patch für {} enthält Felder einer anderen Variante", self.id);
                }
            }
            EntityData::Line { nodes } => {
                if let Some(new_nodes) = patch.nodes {
                    *nodes = sanitize_nodes(self.id, new_nodes).into();
                }
                if patch.loc.is_some() || patch.members.is_some() {
                    log::warn!("Patch für {} enthält Felder einer anderen Variante", self.id);
                }
            }
            EntityData::Relation { members } => {
                if let Some(new_members) = patch.members {
                    *members = new_members.into();
                }
                if patch.loc.is_some() || patch.nodes.is_some() {
                    log::warn!("Patch für {} enthält Felder einer anderen Variante", self.id);
                }
            }
        }

        next.version = next_version();
        next
    }

    /// Führt fremde Tags ein (siehe [`tags::merge_tag_maps`]).
    ///
    /// Ohne Änderung wird ein identischer Klon (gleiche Version) zurückgegeben.
    pub fn merge_tags(&self, incoming: &Tags) -> Entity {
        self.merge_tags_with_limit(incoming, MAX_TAG_VALUE_CHARS)
    }

    /// Wie [`Entity::merge_tags`], mit konfigurierbarem Längenbudget.
    pub fn merge_tags_with_limit(&self, incoming: &Tags, max_chars: usize) -> Entity {
        let (merged, changed) = tags::merge_tag_maps(&self.tags, incoming, max_chars);
        if changed {
            self.update(EntityPatch::tags(merged))
        } else {
            self.clone()
        }
    }

    pub fn has_interesting_tags(&self) -> bool {
        tags::has_interesting_tags(&self.tags)
    }

    // ── Line ────────────────────────────────────────────────────────

    /// Geschlossene Line (erster == letzter Point).
    pub fn is_closed(&self) -> bool {
        let nodes = self.nodes();
        nodes.len() > 1 && nodes.first() == nodes.last()
    }

    /// Fläche: geschlossene Line mit Flächen-Tags oder Multipolygon-Relation.
    pub fn is_area(&self) -> bool {
        match &self.data {
            EntityData::Point { .. } => false,
            EntityData::Line { .. } => self.is_closed() && tags::is_area_tags(&self.tags),
            EntityData::Relation { .. } => self.tag("type") == Some("multipolygon"),
        }
    }

    pub fn first_node(&self) -> Option<EntityId> {
        self.nodes().first().copied()
    }

    pub fn last_node(&self) -> Option<EntityId> {
        self.nodes().last().copied()
    }

    pub fn contains_node(&self, node: EntityId) -> bool {
        self.nodes().contains(&node)
    }

    /// Line mit zu wenigen verschiedenen Points für eine sinnvolle Geometrie.
    pub fn is_degenerate(&self) -> bool {
        match &self.data {
            EntityData::Line { nodes } => {
                let mut unique: Vec<EntityId> = nodes.to_vec();
                unique.sort_unstable();
                unique.dedup();
                unique.len() < if self.is_area() { 3 } else { 2 }
            }
            EntityData::Relation { members } => members.is_empty(),
            EntityData::Point { .. } => false,
        }
    }

    /// Fügt `node` an `index` ein (am Ende bei `None` oder zu großem Index).
    pub fn add_node(&self, node: EntityId, index: Option<usize>) -> Entity {
        let mut nodes = self.nodes().to_vec();
        let index = index.unwrap_or(nodes.len()).min(nodes.len());
        nodes.insert(index, node);
        self.update(EntityPatch::nodes(nodes))
    }

    /// Ersetzt alle Vorkommen von `old` durch `new`.
    pub fn replace_node(&self, old: EntityId, new: EntityId) -> Entity {
        let mut nodes: Vec<EntityId> = self
            .nodes()
            .iter()
            .map(|&n| if n == old { new } else { n })
            .collect();
        nodes.dedup();
        self.update(EntityPatch::nodes(nodes))
    }

    /// Entfernt alle Vorkommen von `node`; geschlossene Lines bleiben geschlossen.
    pub fn remove_node(&self, node: EntityId) -> Entity {
        let was_closed = self.is_closed();
        let mut nodes: Vec<EntityId> = self.nodes().iter().copied().filter(|&n| n != node).collect();
        nodes.dedup();
        if was_closed && nodes.len() > 1 && nodes.first() != nodes.last() {
            nodes.push(nodes[0]);
        }
        self.update(EntityPatch::nodes(nodes))
    }

    // ── Relation ────────────────────────────────────────────────────

    pub fn has_member(&self, id: EntityId) -> bool {
        self.members().iter().any(|m| m.id == id)
    }

    /// Ersetzt die Mitglieds-ID `old` durch `new`, Rollen bleiben erhalten.
    pub fn replace_member(&self, old: EntityId, new: EntityId) -> Entity {
        let members = self
            .members()
            .iter()
            .map(|m| {
                if m.id == old {
                    Member::new(new, m.role.clone())
                } else {
                    m.clone()
                }
            })
            .collect();
        self.update(EntityPatch::members(members))
    }

    /// Entfernt alle Mitgliedschaften von `id`.
    pub fn remove_members_with_id(&self, id: EntityId) -> Entity {
        let members = self.members().iter().filter(|m| m.id != id).cloned().collect();
        self.update(EntityPatch::members(members))
    }
}

/// Lines dürfen nur Points referenzieren.
fn sanitize_nodes(line: EntityId, nodes: Vec<EntityId>) -> Vec<EntityId> {
    if nodes.iter().all(|n| n.kind() == EntityKind::Point) {
        return nodes;
    }
    log::warn!("Line {line} referenziert Nicht-Points, Einträge verworfen");
    nodes
        .into_iter()
        .filter(|n| n.kind() == EntityKind::Point)
        .collect()
}
