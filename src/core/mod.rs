//! Core-Domänentypen: Entities, Graph, Differenz und Spatial-Index.

pub mod difference;
/// Versionierte Entities (Point, Line, Relation)
///
/// Entities sind Werte mit Copy-on-Write-Semantik; jede Änderung erzeugt
/// eine neue Version.
pub mod entity;
pub mod geo;
pub mod graph;
pub mod tags;
pub mod tree;

pub use difference::{Change, Difference, DifferenceSummary};
pub use entity::{
    Entity, EntityData, EntityId, EntityKind, EntityPatch, IdAllocator, Member, NewEntity,
};
pub use geo::{BBox, Loc};
pub use graph::{Geometry, Graph};
pub use tags::{tags_from, Tags, MAX_TAG_VALUE_CHARS};
pub use tree::Tree;
