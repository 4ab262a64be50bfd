//! Action: mehrere Actions als eine.

use super::{Action, DisabledReason};
use crate::core::Graph;

/// Wendet die Schritte der Reihe nach an; jeder Schritt sieht das
/// Ergebnis seines Vorgängers.
#[derive(Default)]
pub struct Compose {
    steps: Vec<Box<dyn Action>>,
}

impl Compose {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hängt einen Schritt an (Builder-Stil).
    pub fn then(mut self, action: impl Action + 'static) -> Self {
        self.steps.push(Box::new(action));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl From<Vec<Box<dyn Action>>> for Compose {
    fn from(steps: Vec<Box<dyn Action>>) -> Self {
        Self { steps }
    }
}

impl Action for Compose {
    fn apply(&self, graph: &Graph) -> Graph {
        self.steps
            .iter()
            .fold(graph.clone(), |current, step| step.apply(&current))
    }

    /// Erster Grund eines Schritts, geprüft gegen den jeweiligen Zwischenstand.
    fn disabled(&self, graph: &Graph) -> Option<DisabledReason> {
        let mut current = graph.clone();
        for step in &self.steps {
            if let Some(reason) = step.disabled(&current) {
                return Some(reason);
            }
            current = step.apply(&current);
        }
        None
    }
}
