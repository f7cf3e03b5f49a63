//! Mutable engine state shared by every component. One owned struct, no
//! globals: the engine threads `&mut SharedRegisters` to whoever needs it.

use std::collections::{HashMap, HashSet};

use crate::dom::NodeId;
use crate::grid::GridId;
use crate::model::{CellPos, DragState, LayoutSnapshot};

#[derive(Debug, Default)]
pub struct SharedRegisters {
    /// Handle of the live editable grid, if one is active.
    pub active_grid: Option<GridId>,
    /// Most recent captured layout, kept across destroy/init cycles so a
    /// re-initialized editable grid can restore itself.
    pub last_snapshot: Option<LayoutSnapshot>,
    /// Content hash of the last layout pushed to the layout store; gates
    /// re-publication of unchanged layouts.
    pub last_layout_hash: Option<blake3::Hash>,
    pub drag: DragState,
    /// Cell chosen via the insertion affordance, consumed by the next
    /// widget creation.
    pub pending_insert: Option<CellPos>,
    /// Cached store element addresses, re-validated before each use.
    pub widget_store_node: Option<NodeId>,
    pub focus_store_node: Option<NodeId>,
    /// One grid handle per initialized static root.
    pub static_grids: HashMap<NodeId, GridId>,
    /// Static roots whose initialization completed; stale entries are
    /// dropped when the root leaves the document.
    pub static_ready: HashSet<NodeId>,
}

impl SharedRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything, including the restore snapshot. Used by hosts that
    /// navigate to an entirely new document.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Clear the editable-grid registers after a teardown. The snapshot
    /// survives so the next initialization can restore from it.
    pub fn clear_editable(&mut self) {
        self.active_grid = None;
        self.drag = DragState::Idle;
        self.pending_insert = None;
    }
}

/// Synthesizes widget ids for nodes that lost every identity marker.
/// Time plus a monotonic sequence guarantees uniqueness within a session;
/// the hash suffix keeps ids distinct across sessions sharing a store.
#[derive(Debug, Default)]
pub struct IdGen {
    seq: u64,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn synthesize(&mut self, now_ms: u64) -> String {
        self.seq += 1;
        let mut seed = [0u8; 16];
        seed[..8].copy_from_slice(&now_ms.to_le_bytes());
        seed[8..].copy_from_slice(&self.seq.to_le_bytes());
        let digest = blake3::hash(&seed);
        format!("w-{}-{}-{}", now_ms, self.seq, &digest.to_hex().as_str()[..6])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesized_ids_are_unique_at_the_same_instant() {
        let mut ids = IdGen::new();
        let a = ids.synthesize(42);
        let b = ids.synthesize(42);
        assert_ne!(a, b);
        assert!(a.starts_with("w-42-"));
    }

    #[test]
    fn clear_editable_keeps_the_snapshot() {
        let mut regs = SharedRegisters::new();
        regs.active_grid = Some(crate::grid::GridId::new(7));
        regs.drag = DragState::Dragging;
        regs.last_snapshot = Some(LayoutSnapshot::default());
        regs.clear_editable();
        assert!(regs.active_grid.is_none());
        assert_eq!(regs.drag, DragState::Idle);
        assert!(regs.last_snapshot.is_some());
    }
}
