//! Optional-capability interfaces for the third-party grid and chart
//! libraries. The engine never assumes either library is loaded: every
//! entry point checks `ready()` and treats a cold library as a typed
//! not-ready condition, distinct from an operation failure.

mod sim;

pub use sim::{SimChartLibrary, SimGridLibrary};

use thiserror::Error;

use crate::dom::{Document, NodeId};

/// Opaque handle to one live grid instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridId(u64);

impl GridId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Placement as the grid library reports it: no declared type, just the
/// structural identity and geometry it tracks itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPlacement {
    pub id: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Fixed initialization profile handed to the library.
#[derive(Debug, Clone, Copy)]
pub struct GridOptions {
    pub columns: u32,
    pub rows: u32,
    pub max_rows: u32,
    pub cell_height: u32,
    pub float: bool,
    pub one_column_collapse: bool,
    /// Fully static instance: no drag, no resize.
    pub static_grid: bool,
    /// Drag/resize handles, only honored when `static_grid` is false.
    pub handles_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridEventKind {
    DragStart,
    DragStop,
    ResizeStart,
    ResizeStop,
    /// Generic layout-changed notification.
    Change,
}

#[derive(Debug, Clone, Copy)]
pub struct GridEvent {
    pub grid: GridId,
    pub kind: GridEventKind,
}

#[derive(Debug, Error)]
pub enum GridError {
    #[error("grid library not loaded")]
    NotLoaded,
    #[error("init failed: {0}")]
    Init(String),
    #[error("unknown grid handle")]
    UnknownGrid,
    #[error("node is not a widget of this grid")]
    UnknownWidget,
    #[error("destroy failed: {0}")]
    Destroy(String),
}

/// The drag/resize/placement mechanics owned by the third-party library.
///
/// Implementations mutate the document the way the real library does —
/// asynchronously from the engine's point of view and tagged host-origin,
/// so the observer sees them like any other host mutation.
pub trait GridLibrary {
    fn ready(&self) -> bool;

    fn init(
        &mut self,
        doc: &mut Document,
        root: NodeId,
        options: GridOptions,
    ) -> Result<GridId, GridError>;

    /// Tear down the instance. Widget nodes stay in the document; only the
    /// grid behavior is removed.
    fn destroy(&mut self, doc: &mut Document, grid: GridId) -> Result<(), GridError>;

    fn add_widget(
        &mut self,
        doc: &mut Document,
        grid: GridId,
        node: NodeId,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> Result<(), GridError>;

    /// Remove one widget, detaching its node from the document.
    fn remove_widget(&mut self, doc: &mut Document, grid: GridId, node: NodeId)
        -> Result<(), GridError>;

    /// Remove every widget, detaching the nodes from the document.
    fn remove_all(&mut self, doc: &mut Document, grid: GridId) -> Result<(), GridError>;

    /// Current placement list, in the library's own order.
    fn placements(&self, doc: &Document, grid: GridId) -> Result<Vec<RawPlacement>, GridError>;

    /// Emptiness query for a cell region. `None` means the query is not
    /// available on this handle and the caller must fall back to scanning
    /// placements.
    fn is_area_empty(&self, doc: &Document, grid: GridId, x: u32, y: u32, w: u32, h: u32)
        -> Option<bool>;

    /// Drain drag/resize/change events emitted since the last call.
    fn take_events(&mut self) -> Vec<GridEvent>;
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("chart library not loaded")]
    NotLoaded,
    #[error("resize failed: {0}")]
    Resize(String),
}

/// Native resize entry point of the charting library, when present.
pub trait ChartLibrary {
    fn ready(&self) -> bool;

    fn resize(&mut self, doc: &mut Document, node: NodeId) -> Result<(), ChartError>;
}
