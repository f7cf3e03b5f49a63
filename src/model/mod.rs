//! Core data model: placements, snapshots, view classification, drag state.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Widget body kind, mirrored onto each widget node as a declared attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetType {
    Text,
    Chart,
    List,
    Filter,
    #[default]
    Unknown,
}

impl WidgetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetType::Text => "text",
            WidgetType::Chart => "chart",
            WidgetType::List => "list",
            WidgetType::Filter => "filter",
            WidgetType::Unknown => "unknown",
        }
    }

    /// Parse the declared attribute value; anything unrecognized maps to
    /// `Unknown` rather than failing the enclosing capture.
    pub fn from_attr(value: &str) -> Self {
        match value {
            "text" => WidgetType::Text,
            "chart" => WidgetType::Chart,
            "list" => WidgetType::List,
            "filter" => WidgetType::Filter,
            _ => WidgetType::Unknown,
        }
    }
}

/// A widget's `{id, x, y, w, h}` on the grid plus its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetPlacement {
    pub id: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    #[serde(rename = "type", default)]
    pub kind: WidgetType,
}

/// Ordered set of placements captured at a point in time. Ordering is grid
/// position bookkeeping, not render order, but round-trips unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutSnapshot {
    pub placements: Vec<WidgetPlacement>,
}

impl LayoutSnapshot {
    pub fn new(placements: Vec<WidgetPlacement>) -> Self {
        Self { placements }
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    /// Unordered structural identity of the snapshot, used to compare
    /// layouts across a destroy/restore cycle.
    pub fn key_set(&self) -> BTreeSet<(String, u32, u32, u32, u32)> {
        self.placements
            .iter()
            .map(|p| (p.id.clone(), p.x, p.y, p.w, p.h))
            .collect()
    }
}

fn default_w() -> u32 {
    4
}

fn default_h() -> u32 {
    3
}

/// One record of the declarative placement list embedded in a static page.
/// Missing coordinates default to the origin, missing size to 4x3.
#[derive(Debug, Clone, Deserialize)]
pub struct DeclaredPlacement {
    pub id: String,
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
    #[serde(default = "default_w")]
    pub w: u32,
    #[serde(default = "default_h")]
    pub h: u32,
    #[serde(rename = "type", default)]
    pub kind: WidgetType,
    #[serde(default)]
    pub title: Option<String>,
}

impl DeclaredPlacement {
    pub fn placement(&self) -> WidgetPlacement {
        WidgetPlacement {
            id: self.id.clone(),
            x: self.x,
            y: self.y,
            w: self.w,
            h: self.h,
            kind: self.kind,
        }
    }
}

/// Host-store record for one widget: title, type and an opaque payload the
/// rendering layer owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetMetadata {
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: WidgetType,
    #[serde(default)]
    pub payload: Value,
}

/// Cell coordinates on the editable grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPos {
    pub x: u32,
    pub y: u32,
}

impl CellPos {
    pub const ORIGIN: CellPos = CellPos { x: 0, y: 0 };

    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Drag/resize progress. `Grace` covers the short window after a stop event
/// in which a spurious click must still be suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging,
    Grace {
        until_ms: u64,
    },
}

impl DragState {
    pub fn is_dragging(&self) -> bool {
        matches!(self, DragState::Dragging)
    }

    pub fn suppresses_click(&self, now_ms: u64) -> bool {
        match self {
            DragState::Idle => false,
            DragState::Dragging => true,
            DragState::Grace { until_ms } => now_ms < *until_ms,
        }
    }
}

/// Live visibility classification derived each observation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewState {
    pub editable_visible: bool,
    pub static_visible: bool,
    pub observed_at_ms: u64,
}

/// Coarse label for a [`ViewState`]; the transition table works on the raw
/// flags, the label exists for logs. When both subtrees are visible (a
/// transient navigation overlap) the editable grid wins, matching the
/// steady-state branch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    DashboardActive,
    PageGridActive,
    Empty,
}

impl ViewState {
    pub fn mode(&self) -> ViewMode {
        match (self.editable_visible, self.static_visible) {
            (true, _) => ViewMode::DashboardActive,
            (false, true) => ViewMode::PageGridActive,
            (false, false) => ViewMode::Empty,
        }
    }
}
