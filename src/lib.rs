//! OSM Graph Editor Library.
//! Versionierter Entity-Graph mit Undo-History, Spatial-Index und Validierung.

pub mod app;
pub mod core;
pub mod json;
pub mod shared;

pub use app::{
    Action, ChangeEvent, DisabledReason, EditSession, History, Issue, LoadTicket, Severity,
    ValidationEngine, Validator,
};
pub use core::{
    BBox, Difference, Entity, EntityData, EntityId, EntityKind, EntityPatch, Geometry, Graph,
    IdAllocator, Loc, Member, NewEntity, Tags, Tree,
};
pub use json::{parse_entities, write_entities, write_issues};
pub use shared::EngineOptions;
