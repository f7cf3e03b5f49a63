//! Virtual-clock timer table. Each deferred duty owns exactly one slot:
//! scheduling replaces the previous deadline for that duty, which is the
//! whole debounce mechanism.

use std::collections::BTreeMap;

/// Deferred duties the engine can owe itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {
    /// Debounced mutation-batch evaluation.
    ObserverEvaluate,
    /// Identity repair after the grid library's own async writes settle.
    DeferredRepair,
    /// Post-resize settle: leave drag state, persist, repair.
    ResizeSettle,
    /// Settle-delayed editable grid initialization after a transition.
    InitEditable,
    /// Settle-delayed static grid initialization after a transition.
    InitStatics,
    /// Debounced chart resize pass.
    ChartResize,
}

#[derive(Debug, Default)]
pub struct Timers {
    now_ms: u64,
    slots: BTreeMap<TaskKind, u64>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.now_ms
    }

    /// Schedule `kind` to fire `delay_ms` from now, cancelling any earlier
    /// deadline for the same kind.
    pub fn schedule(&mut self, kind: TaskKind, delay_ms: u64) {
        self.slots.insert(kind, self.now_ms.saturating_add(delay_ms));
    }

    pub fn cancel(&mut self, kind: TaskKind) {
        self.slots.remove(&kind);
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn is_scheduled(&self, kind: TaskKind) -> bool {
        self.slots.contains_key(&kind)
    }

    pub fn advance(&mut self, delta_ms: u64) {
        self.now_ms = self.now_ms.saturating_add(delta_ms);
    }

    /// Remove and return every duty whose deadline has passed, ordered by
    /// deadline then kind so teardown-before-init ordering is stable.
    pub fn take_due(&mut self) -> Vec<TaskKind> {
        let mut due: Vec<(u64, TaskKind)> = self
            .slots
            .iter()
            .filter(|(_, deadline)| **deadline <= self.now_ms)
            .map(|(kind, deadline)| (*deadline, *kind))
            .collect();
        due.sort();
        for (_, kind) in &due {
            self.slots.remove(kind);
        }
        due.into_iter().map(|(_, kind)| kind).collect()
    }
}
