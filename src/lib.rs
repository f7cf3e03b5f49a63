//! gridsync — lifecycle synchronization for grid dashboards.
//!
//! Keeps three parties consistent: a drag/resize grid library that rewrites
//! element attributes on its own schedule, a host document observed through
//! a mutation log, and an external key-value store. The engine watches view
//! transitions (editable dashboard versus static per-page grids), tears down
//! and rebuilds grid instances across them, repairs the identity markers the
//! library drops, debounces chart resizes, and persists layout snapshots.
//!
//! Hosts own the event loop: feed input through the [`engine::GridEngine`]
//! operations, then call `pump` after synchronous work and `advance` to move
//! time and run deferred duties.

pub mod dom;
pub mod engine;
pub mod error;
pub mod grid;
pub mod layout;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod store;
pub mod widget;

pub use engine::{
    CreateWidgetParams, EngineConfig, GridEngine, GridStateObserver, Host, MainGridController,
    SharedRegisters, StaticGridController, TaskKind,
};
pub use error::{EngineError, Result};
pub use grid::{
    ChartError, ChartLibrary, GridError, GridEvent, GridEventKind, GridId, GridLibrary,
    GridOptions, RawPlacement, SimChartLibrary, SimGridLibrary,
};
pub use model::{
    CellPos, DeclaredPlacement, DragState, LayoutSnapshot, ViewMode, ViewState, WidgetMetadata,
    WidgetPlacement, WidgetType,
};
pub use store::{DirectStoreSetter, PushOutcome, StoreBridge};
