//! Actions: reine Funktionen `Graph → Graph` für einzelne Edits.
//!
//! Aufgeteilt nach Operation:
//! - `noop`: Platzhalter für transiente History-Zustände (Drag-Beginn)
//! - `add_entity`: neues Entity einfügen
//! - `change_tags`: Tags ersetzen
//! - `move_node`: Point verschieben
//! - `add_vertex`: Point in eine Line einfügen
//! - `add_midpoint`: Point auf einer Kante zweier Points einfügen
//! - `extract_point`: getaggten Point aus Line/Fläche herauslösen
//! - `delete`: Entity inkl. Aufräumen der Eltern löschen
//! - `compose`: mehrere Actions hintereinander

mod add_entity;
mod add_midpoint;
mod add_vertex;
mod change_tags;
mod compose;
mod delete;
mod extract_point;
mod move_node;
mod noop;

pub use add_entity::AddEntity;
pub use add_midpoint::AddMidpoint;
pub use add_vertex::AddVertex;
pub use change_tags::ChangeTags;
pub use compose::Compose;
pub use delete::DeleteEntity;
pub use extract_point::ExtractPoint;
pub use move_node::MoveNode;
pub use noop::Noop;

use crate::core::Graph;

/// Grund, warum eine Action im aktuellen Graphen nicht ausführbar ist.
///
/// Wird statt eines Fehlers gemeldet, damit die Oberfläche den Befehl
/// ausgrauen und den Grund anzeigen kann.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledReason {
    /// Referenziertes Entity existiert nicht
    NotFound,
    /// Entity ist kein Point
    NotAPoint,
    /// Entity ist keine Line
    NotALine,
    /// Point hängt an keiner Line oder Relation
    NotAttached,
    /// Keine Tags mit inhaltlicher Aussage
    NoInterestingTags,
    /// ID ist bereits vergeben
    IdCollision,
    /// Die beiden Points sind in keiner Line benachbart
    NotAdjacent,
    /// Einfügeposition außerhalb der Line
    IndexOutOfRange,
}

impl DisabledReason {
    /// Stabiler Kurzcode für Oberflächen und Logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::NotAPoint => "not_a_point",
            Self::NotALine => "not_a_line",
            Self::NotAttached => "not_attached",
            Self::NoInterestingTags => "no_interesting_tags",
            Self::IdCollision => "id_collision",
            Self::NotAdjacent => "not_adjacent",
            Self::IndexOutOfRange => "index_out_of_range",
        }
    }
}

/// Ein einzelner Edit als reine Funktion über dem Graphen.
pub trait Action {
    /// Wendet die Action an und liefert den neuen Graphen.
    fn apply(&self, graph: &Graph) -> Graph;

    /// `Some(grund)`, wenn die Action im Graphen nicht ausführbar ist.
    fn disabled(&self, _graph: &Graph) -> Option<DisabledReason> {
        None
    }
}

impl<F> Action for F
where
    F: Fn(&Graph) -> Graph,
{
    fn apply(&self, graph: &Graph) -> Graph {
        self(graph)
    }
}
