//! Undo/Redo-History über Graph-Snapshots.
//!
//! Jeder Zustand hält einen vollständigen [`Graph`]. Da Graphen ihre Basis
//! und lokale Schicht per `Arc` teilen, kostet ein Zustand O(1) Speicher
//! plus die tatsächlich geänderten Entities.

use crate::app::actions::Action;
use crate::core::{Difference, Entity, EntityId, Graph};

/// Ein Eintrag der History.
#[derive(Debug, Clone)]
pub struct HistoryState {
    pub graph: Graph,
    /// Beschreibung des Edits. Zustände ohne Annotation sind transient und
    /// werden von Undo/Redo übersprungen.
    pub annotation: Option<String>,
}

/// Auslöser einer Änderungsmeldung.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Perform,
    Replace,
    Pop,
    Overwrite,
    Undo,
    Redo,
    Reset,
    /// Sammelmeldung nach `resume_change_dispatch`
    Batch,
}

/// Änderungsmeldung der History.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Annotation des betroffenen Edits (bei Undo: des rückgängig gemachten)
    pub annotation: Option<String>,
    pub difference: Difference,
    /// Graph vor der Änderung
    pub previous: Graph,
    /// Graph nach der Änderung
    pub current: Graph,
}

impl ChangeEvent {
    /// IDs aller geänderten Entities.
    pub fn changed_ids(&self) -> Vec<EntityId> {
        self.difference.changed_ids()
    }
}

/// Lineare History mit Cursor.
#[derive(Debug, Clone)]
pub struct History {
    stack: Vec<HistoryState>,
    index: usize,
    pause_depth: usize,
    /// Graph zum Zeitpunkt der äußersten Pause
    paused_from: Option<Graph>,
    /// Maximale Anzahl Edits über dem Basiszustand (0 = unbegrenzt)
    max_depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(Graph::empty())
    }
}

impl History {
    /// History mit `base` als einzigem Zustand.
    pub fn new(base: Graph) -> Self {
        Self::with_max_depth(base, 0)
    }

    /// Wie [`History::new`], mit begrenzter Tiefe.
    pub fn with_max_depth(base: Graph, max_depth: usize) -> Self {
        Self {
            stack: vec![HistoryState {
                graph: base,
                annotation: None,
            }],
            index: 0,
            pause_depth: 0,
            paused_from: None,
            max_depth,
        }
    }

    // ── Zugriff ─────────────────────────────────────────────────────

    /// Aktueller Graph.
    pub fn graph(&self) -> &Graph {
        &self.stack[self.index].graph
    }

    /// Basis des aktuellen Graphen ohne lokale Änderungen.
    pub fn base_graph(&self) -> Graph {
        self.graph().base_graph()
    }

    pub fn annotation(&self) -> Option<&str> {
        self.stack[self.index].annotation.as_deref()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Anzahl gespeicherter Zustände inkl. Basis.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.len() <= 1
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
        self.trim();
    }

    pub fn is_paused(&self) -> bool {
        self.pause_depth > 0
    }

    /// Annotation des Edits, den `undo` rückgängig machen würde.
    pub fn undo_annotation(&self) -> Option<&str> {
        self.stack[..=self.index]
            .iter()
            .rev()
            .find_map(|s| s.annotation.as_deref())
    }

    /// Annotation des Edits, den `redo` wiederherstellen würde.
    pub fn redo_annotation(&self) -> Option<&str> {
        self.stack[self.index + 1..]
            .iter()
            .find_map(|s| s.annotation.as_deref())
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.redo_annotation().is_some()
    }

    /// Differenz zwischen Basis und aktuellem Graphen.
    pub fn difference(&self) -> Difference {
        Difference::new(&self.base_graph(), self.graph())
    }

    pub fn has_changes(&self) -> bool {
        !self.difference().is_empty()
    }

    // ── Edits ───────────────────────────────────────────────────────

    /// Wendet `action` an und legt einen neuen Zustand an. Verwirft den Redo-Teil.
    pub fn perform<A: Action + ?Sized>(
        &mut self,
        action: &A,
        annotation: Option<&str>,
    ) -> Option<ChangeEvent> {
        let previous = self.graph().clone();
        let graph = action.apply(&previous);

        self.stack.truncate(self.index + 1);
        self.stack.push(HistoryState {
            graph,
            annotation: annotation.map(str::to_owned),
        });
        self.index += 1;
        self.trim();

        log::debug!("History: perform {:?} (Index {})", annotation, self.index);
        self.dispatch(ChangeKind::Perform, annotation.map(str::to_owned), previous)
    }

    /// Ersetzt den aktuellen Zustand (z. B. fortlaufende Drag-Schritte).
    pub fn replace<A: Action + ?Sized>(
        &mut self,
        action: &A,
        annotation: Option<&str>,
    ) -> Option<ChangeEvent> {
        let previous = self.graph().clone();
        let graph = action.apply(&previous);

        self.stack.truncate(self.index + 1);
        self.stack[self.index] = HistoryState {
            graph,
            annotation: annotation.map(str::to_owned),
        };
        self.dispatch(ChangeKind::Replace, annotation.map(str::to_owned), previous)
    }

    /// Verwirft die obersten `n` Zustände (nie die Basis).
    pub fn pop(&mut self, n: usize) -> Option<ChangeEvent> {
        let previous = self.graph().clone();
        self.stack.truncate(self.index + 1);
        let n = n.min(self.index);
        self.index -= n;
        self.stack.truncate(self.index + 1);
        let annotation = self.stack[self.index].annotation.clone();
        self.dispatch(ChangeKind::Pop, annotation, previous)
    }

    /// Ersetzt den obersten Zustand durch `action`, angewendet auf den
    /// darunterliegenden Zustand.
    pub fn overwrite<A: Action + ?Sized>(
        &mut self,
        action: &A,
        annotation: Option<&str>,
    ) -> Option<ChangeEvent> {
        let previous = self.graph().clone();
        self.stack.truncate(self.index + 1);
        if self.index > 0 {
            self.stack.pop();
            self.index -= 1;
        }

        let graph = action.apply(self.graph());
        self.stack.push(HistoryState {
            graph,
            annotation: annotation.map(str::to_owned),
        });
        self.index += 1;
        self.trim();
        self.dispatch(ChangeKind::Overwrite, annotation.map(str::to_owned), previous)
    }

    /// Springt zum vorherigen annotierten Zustand (oder zur Basis).
    ///
    /// `None`, wenn bereits an der Basis.
    pub fn undo(&mut self) -> Option<ChangeEvent> {
        if self.index == 0 {
            return None;
        }
        let previous = self.graph().clone();
        let undone = self.stack[self.index].annotation.clone();

        while self.index > 0 {
            self.index -= 1;
            if self.stack[self.index].annotation.is_some() {
                break;
            }
        }

        log::debug!("History: undo {:?} (Index {})", undone, self.index);
        self.dispatch(ChangeKind::Undo, undone, previous)
    }

    /// Springt zum nächsten annotierten Zustand.
    ///
    /// `None`, wenn es keinen gibt.
    pub fn redo(&mut self) -> Option<ChangeEvent> {
        let target = (self.index + 1..self.stack.len())
            .find(|&i| self.stack[i].annotation.is_some())?;
        let previous = self.graph().clone();
        self.index = target;

        let annotation = self.stack[target].annotation.clone();
        log::debug!("History: redo {:?} (Index {})", annotation, self.index);
        self.dispatch(ChangeKind::Redo, annotation, previous)
    }

    /// Setzt auf einen einzigen Zustand mit der aktuellen Basis zurück.
    pub fn reset(&mut self) -> Option<ChangeEvent> {
        let previous = self.graph().clone();
        self.stack = vec![HistoryState {
            graph: previous.base_graph(),
            annotation: None,
        }];
        self.index = 0;
        self.pause_depth = 0;
        self.paused_from = None;
        log::info!("History zurückgesetzt");
        self.dispatch(ChangeKind::Reset, None, previous)
    }

    /// Stand für Beobachter: während einer Pause der Graph vor der Pause.
    pub fn observed_graph(&self) -> &Graph {
        match &self.paused_from {
            Some(paused) if self.is_paused() => paused,
            _ => self.graph(),
        }
    }

    /// Führt nachgeladene Entities in die Basis aller Zustände ein.
    ///
    /// Liefert die IDs der übergebenen Entities; der Aufrufer muss damit
    /// abgeleitete Indizes (Tree) nachziehen.
    pub fn merge(&mut self, entities: &[Entity], force: bool) -> Vec<EntityId> {
        let loaded: Vec<EntityId> = entities.iter().map(Entity::id).collect();
        let rebased = self.stack[0].graph.rebase(entities, force);

        for state in self.stack.iter_mut().skip(1) {
            state.graph = state.graph.adopt_base(&rebased, &loaded);
        }
        if let Some(paused) = self.paused_from.as_mut() {
            *paused = paused.adopt_base(&rebased, &loaded);
        }
        self.stack[0].graph = rebased;

        log::debug!(
            "History: {} Entities in {} Zustände übernommen",
            loaded.len(),
            self.stack.len()
        );
        loaded
    }

    // ── Meldungen ───────────────────────────────────────────────────

    /// Unterdrückt Meldungen bis zum passenden `resume_change_dispatch`.
    /// Aufrufe dürfen verschachtelt werden.
    pub fn pause_change_dispatch(&mut self) {
        if self.pause_depth == 0 {
            self.paused_from = Some(self.graph().clone());
        }
        self.pause_depth += 1;
    }

    /// Hebt eine Pause auf. Erst das äußerste Resume liefert genau eine
    /// Sammelmeldung über die Netto-Änderung seit der Pause.
    pub fn resume_change_dispatch(&mut self) -> Option<ChangeEvent> {
        if self.pause_depth == 0 {
            log::warn!("resume_change_dispatch ohne vorherige Pause");
            return None;
        }
        self.pause_depth -= 1;
        if self.pause_depth > 0 {
            return None;
        }

        let previous = self.paused_from.take()?;
        let annotation = self.stack[self.index].annotation.clone();
        self.dispatch(ChangeKind::Batch, annotation, previous)
    }

    /// Führt `f` mit pausierten Meldungen aus.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut History) -> R) -> (R, Option<ChangeEvent>) {
        self.pause_change_dispatch();
        let result = f(self);
        let event = self.resume_change_dispatch();
        (result, event)
    }

    fn dispatch(
        &self,
        kind: ChangeKind,
        annotation: Option<String>,
        previous: Graph,
    ) -> Option<ChangeEvent> {
        if self.is_paused() {
            return None;
        }
        let current = self.graph().clone();
        Some(ChangeEvent {
            kind,
            annotation,
            difference: Difference::new(&previous, &current),
            previous,
            current,
        })
    }

    /// Kürzt die ältesten Zustände auf `max_depth`.
    fn trim(&mut self) {
        if self.max_depth == 0 || self.stack.len() <= self.max_depth + 1 {
            return;
        }
        let excess = (self.stack.len() - self.max_depth - 1).min(self.index);
        if excess == 0 {
            return;
        }
        self.stack.drain(..excess);
        self.index -= excess;
        log::debug!("History auf {} Zustände gekürzt", self.stack.len());
    }
}
