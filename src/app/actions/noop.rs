//! Action: nichts tun.

use super::Action;
use crate::core::Graph;

/// Liefert den Graphen unverändert.
///
/// Dient als erster Schritt transienter Interaktionen (z. B. Drag-Beginn),
/// die anschließend per `replace` fortgeschrieben werden.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

impl Action for Noop {
    fn apply(&self, graph: &Graph) -> Graph {
        graph.clone()
    }
}
