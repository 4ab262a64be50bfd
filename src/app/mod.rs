//! Application-Layer: Actions, History, Validierung und Edit-Session.

pub mod actions;
pub mod history;
pub mod session;
/// Validatoren und Validierungs-Engine
///
/// Validatoren sind reine Funktionen; die Engine cached ihre Ergebnisse.
pub mod validation;

pub use actions::{Action, DisabledReason};
pub use history::{ChangeEvent, ChangeKind, History, HistoryState};
pub use session::{EditSession, LoadTicket};
pub use validation::{validator_fn, Fix, Issue, Severity, ValidationEngine, Validator};
