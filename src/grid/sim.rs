//! Deterministic in-memory grid and chart libraries.
//!
//! These back the test suite and any headless embedding. The grid
//! simulator reproduces the quirks the engine is built to survive: widget
//! attributes are rewritten during insertion (dropping the mirrored data
//! marker, the identity drift the repair routine exists for) and every
//! document write is tagged host-origin, because from the engine's point
//! of view the library is an outside actor.

use std::cell::RefCell;
use std::rc::Rc;

use crate::dom::{Document, MutationOrigin, NodeId};

use super::{
    ChartError, ChartLibrary, GridError, GridEvent, GridEventKind, GridId, GridLibrary,
    GridOptions, RawPlacement,
};

struct SimGrid {
    root: NodeId,
    options: GridOptions,
    widgets: Vec<(NodeId, RawPlacement)>,
}

struct SimGridInner {
    ready: bool,
    next_handle: u64,
    grids: Vec<(GridId, SimGrid)>,
    events: Vec<GridEvent>,
    drop_data_marker: bool,
    supports_empty_query: bool,
    fail_init: bool,
    fail_destroy: bool,
}

impl Default for SimGridInner {
    fn default() -> Self {
        Self {
            ready: true,
            next_handle: 1,
            grids: Vec::new(),
            events: Vec::new(),
            drop_data_marker: true,
            supports_empty_query: true,
            fail_init: false,
            fail_destroy: false,
        }
    }
}

/// Cloneable handle; all clones share one library state, which lets tests
/// keep a handle while the engine owns the boxed trait object.
#[derive(Clone, Default)]
pub struct SimGridLibrary {
    inner: Rc<RefCell<SimGridInner>>,
}

impl SimGridLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the library not having loaded yet.
    pub fn set_ready(&self, ready: bool) {
        self.inner.borrow_mut().ready = ready;
    }

    /// Toggle the marker-dropping normalization quirk.
    pub fn set_drop_data_marker(&self, drop: bool) {
        self.inner.borrow_mut().drop_data_marker = drop;
    }

    /// Simulate a library version without the emptiness query.
    pub fn set_supports_empty_query(&self, supported: bool) {
        self.inner.borrow_mut().supports_empty_query = supported;
    }

    /// Make subsequent inits fail, distinct from not being loaded.
    pub fn set_fail_init(&self, fail: bool) {
        self.inner.borrow_mut().fail_init = fail;
    }

    /// Make subsequent destroys fail, for teardown robustness tests.
    pub fn set_fail_destroy(&self, fail: bool) {
        self.inner.borrow_mut().fail_destroy = fail;
    }

    /// Inject an event as the real library would emit it.
    pub fn emit(&self, grid: GridId, kind: GridEventKind) {
        self.inner.borrow_mut().events.push(GridEvent { grid, kind });
    }

    pub fn grid_count(&self) -> usize {
        self.inner.borrow().grids.len()
    }

    pub fn has_grid(&self, grid: GridId) -> bool {
        self.inner.borrow().grids.iter().any(|(id, _)| *id == grid)
    }

    pub fn widget_count(&self, grid: GridId) -> usize {
        self.inner
            .borrow()
            .grids
            .iter()
            .find(|(id, _)| *id == grid)
            .map(|(_, g)| g.widgets.len())
            .unwrap_or(0)
    }

    /// Move a widget the way a drag would, rewriting its presentation
    /// attributes and emitting a change event.
    pub fn move_widget(&self, doc: &mut Document, grid: GridId, node: NodeId, x: u32, y: u32) {
        let mut inner = self.inner.borrow_mut();
        if let Some((_, g)) = inner.grids.iter_mut().find(|(id, _)| *id == grid) {
            if let Some((_, placement)) = g.widgets.iter_mut().find(|(n, _)| *n == node) {
                placement.x = x;
                placement.y = y;
            }
        }
        drop(inner);
        as_host(doc, |doc| {
            doc.set_attr(node, "gs-x", x.to_string());
            doc.set_attr(node, "gs-y", y.to_string());
        });
        self.emit(grid, GridEventKind::Change);
    }
}

/// Run document writes tagged with the library's (host) origin, restoring
/// whatever origin the caller had set.
fn as_host<R>(doc: &mut Document, f: impl FnOnce(&mut Document) -> R) -> R {
    let prior = doc.origin();
    doc.set_origin(MutationOrigin::Host);
    let out = f(doc);
    doc.set_origin(prior);
    out
}

fn parse_attr(doc: &Document, node: NodeId, name: &str, fallback: u32) -> u32 {
    doc.attr(node, name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

fn overlaps(a: &RawPlacement, x: u32, y: u32, w: u32, h: u32) -> bool {
    a.x < x + w && x < a.x + a.w && a.y < y + h && y < a.y + a.h
}

impl GridLibrary for SimGridLibrary {
    fn ready(&self) -> bool {
        self.inner.borrow().ready
    }

    fn init(
        &mut self,
        doc: &mut Document,
        root: NodeId,
        options: GridOptions,
    ) -> Result<GridId, GridError> {
        let mut inner = self.inner.borrow_mut();
        if !inner.ready {
            return Err(GridError::NotLoaded);
        }
        if inner.fail_init {
            return Err(GridError::Init("simulated init failure".into()));
        }
        let id = GridId::new(inner.next_handle);
        inner.next_handle += 1;
        inner.grids.push((
            id,
            SimGrid {
                root,
                options,
                widgets: Vec::new(),
            },
        ));
        drop(inner);
        as_host(doc, |doc| {
            doc.add_class(root, "grid-stack-instance");
        });
        Ok(id)
    }

    fn destroy(&mut self, doc: &mut Document, grid: GridId) -> Result<(), GridError> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_destroy {
            return Err(GridError::Destroy("simulated destroy failure".into()));
        }
        let idx = inner
            .grids
            .iter()
            .position(|(id, _)| *id == grid)
            .ok_or(GridError::UnknownGrid)?;
        let (_, removed) = inner.grids.remove(idx);
        drop(inner);
        // Widget nodes stay in the document; only the instance marker goes.
        as_host(doc, |doc| {
            doc.remove_class(removed.root, "grid-stack-instance");
        });
        Ok(())
    }

    fn add_widget(
        &mut self,
        doc: &mut Document,
        grid: GridId,
        node: NodeId,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> Result<(), GridError> {
        let mut inner = self.inner.borrow_mut();
        let drop_marker = inner.drop_data_marker;
        let (_, g) = inner
            .grids
            .iter_mut()
            .find(|(id, _)| *id == grid)
            .ok_or(GridError::UnknownGrid)?;
        let root = g.root;
        let widget_id = doc
            .attr(node, "gs-id")
            .or_else(|| doc.attr(node, "id"))
            .unwrap_or_default()
            .to_string();
        g.widgets.push((
            node,
            RawPlacement {
                id: widget_id,
                x,
                y,
                w,
                h,
            },
        ));
        drop(inner);
        as_host(doc, |doc| {
            doc.append_child(root, node);
            doc.set_attr(node, "gs-x", x.to_string());
            doc.set_attr(node, "gs-y", y.to_string());
            doc.set_attr(node, "gs-w", w.to_string());
            doc.set_attr(node, "gs-h", h.to_string());
            if drop_marker {
                // The normalization pass the real library runs on insert,
                // observed to strip the mirrored data marker.
                doc.remove_attr(node, "data-widget-id");
            }
        });
        Ok(())
    }

    fn remove_widget(
        &mut self,
        doc: &mut Document,
        grid: GridId,
        node: NodeId,
    ) -> Result<(), GridError> {
        let mut inner = self.inner.borrow_mut();
        let (_, g) = inner
            .grids
            .iter_mut()
            .find(|(id, _)| *id == grid)
            .ok_or(GridError::UnknownGrid)?;
        let before = g.widgets.len();
        g.widgets.retain(|(n, _)| *n != node);
        if g.widgets.len() == before {
            return Err(GridError::UnknownWidget);
        }
        drop(inner);
        as_host(doc, |doc| doc.detach(node));
        Ok(())
    }

    fn remove_all(&mut self, doc: &mut Document, grid: GridId) -> Result<(), GridError> {
        let mut inner = self.inner.borrow_mut();
        let (_, g) = inner
            .grids
            .iter_mut()
            .find(|(id, _)| *id == grid)
            .ok_or(GridError::UnknownGrid)?;
        let nodes: Vec<NodeId> = g.widgets.drain(..).map(|(n, _)| n).collect();
        drop(inner);
        as_host(doc, |doc| {
            for node in nodes {
                doc.detach(node);
            }
        });
        Ok(())
    }

    fn placements(&self, doc: &Document, grid: GridId) -> Result<Vec<RawPlacement>, GridError> {
        let inner = self.inner.borrow();
        let (_, g) = inner
            .grids
            .iter()
            .find(|(id, _)| *id == grid)
            .ok_or(GridError::UnknownGrid)?;
        Ok(g.widgets
            .iter()
            .map(|(node, stored)| RawPlacement {
                id: doc
                    .attr(*node, "id")
                    .or_else(|| doc.attr(*node, "gs-id"))
                    .unwrap_or(&stored.id)
                    .to_string(),
                x: parse_attr(doc, *node, "gs-x", stored.x),
                y: parse_attr(doc, *node, "gs-y", stored.y),
                w: parse_attr(doc, *node, "gs-w", stored.w),
                h: parse_attr(doc, *node, "gs-h", stored.h),
            })
            .collect())
    }

    fn is_area_empty(
        &self,
        doc: &Document,
        grid: GridId,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> Option<bool> {
        let inner = self.inner.borrow();
        if !inner.supports_empty_query {
            return None;
        }
        let (_, g) = inner.grids.iter().find(|(id, _)| *id == grid)?;
        let columns = g.options.columns;
        let max_rows = g.options.max_rows;
        if x + w > columns || y + h > max_rows {
            return Some(false);
        }
        let occupied = g.widgets.iter().any(|(node, stored)| {
            let current = RawPlacement {
                id: String::new(),
                x: parse_attr(doc, *node, "gs-x", stored.x),
                y: parse_attr(doc, *node, "gs-y", stored.y),
                w: parse_attr(doc, *node, "gs-w", stored.w),
                h: parse_attr(doc, *node, "gs-h", stored.h),
            };
            overlaps(&current, x, y, w, h)
        });
        Some(!occupied)
    }

    fn take_events(&mut self) -> Vec<GridEvent> {
        std::mem::take(&mut self.inner.borrow_mut().events)
    }
}

#[derive(Default)]
struct SimChartInner {
    ready: bool,
    resized: Vec<NodeId>,
}

/// Counting chart library; `resize_count` is what the debounce tests
/// observe.
#[derive(Clone)]
pub struct SimChartLibrary {
    inner: Rc<RefCell<SimChartInner>>,
}

impl Default for SimChartLibrary {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SimChartInner {
                ready: true,
                resized: Vec::new(),
            })),
        }
    }
}

impl SimChartLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self, ready: bool) {
        self.inner.borrow_mut().ready = ready;
    }

    pub fn resize_count(&self) -> usize {
        self.inner.borrow().resized.len()
    }
}

impl ChartLibrary for SimChartLibrary {
    fn ready(&self) -> bool {
        self.inner.borrow().ready
    }

    fn resize(&mut self, _doc: &mut Document, node: NodeId) -> Result<(), ChartError> {
        let mut inner = self.inner.borrow_mut();
        if !inner.ready {
            return Err(ChartError::NotLoaded);
        }
        inner.resized.push(node);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(doc: &mut Document, id: &str) -> NodeId {
        let node = doc.create_element("div");
        doc.set_attr(node, "id", id);
        let root = doc.root();
        doc.append_child(root, node);
        node
    }

    #[test]
    fn init_requires_loaded_library() {
        let mut doc = Document::new();
        let root = doc.root();
        let mut lib = SimGridLibrary::new();
        lib.set_ready(false);
        let err = lib
            .init(
                &mut doc,
                root,
                GridOptions {
                    columns: 12,
                    rows: 8,
                    max_rows: 12,
                    cell_height: 80,
                    float: true,
                    one_column_collapse: false,
                    static_grid: false,
                    handles_enabled: true,
                },
            )
            .unwrap_err();
        assert!(matches!(err, GridError::NotLoaded));
    }

    #[test]
    fn add_widget_normalizes_and_drops_data_marker() {
        let mut doc = Document::new();
        let root = doc.root();
        let mut lib = SimGridLibrary::new();
        let grid = lib
            .init(
                &mut doc,
                root,
                GridOptions {
                    columns: 12,
                    rows: 8,
                    max_rows: 12,
                    cell_height: 80,
                    float: true,
                    one_column_collapse: false,
                    static_grid: false,
                    handles_enabled: true,
                },
            )
            .unwrap();
        let node = widget(&mut doc, "w-1");
        doc.set_attr(node, "data-widget-id", "w-1");
        lib.add_widget(&mut doc, grid, node, 2, 1, 4, 3).unwrap();
        assert_eq!(doc.attr(node, "gs-x"), Some("2"));
        assert_eq!(doc.attr(node, "data-widget-id"), None);
        let placements = lib.placements(&doc, grid).unwrap();
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].id, "w-1");
        assert_eq!(placements[0].w, 4);
    }

    #[test]
    fn emptiness_query_detects_overlap_and_bounds() {
        let mut doc = Document::new();
        let root = doc.root();
        let mut lib = SimGridLibrary::new();
        let grid = lib
            .init(
                &mut doc,
                root,
                GridOptions {
                    columns: 12,
                    rows: 8,
                    max_rows: 12,
                    cell_height: 80,
                    float: true,
                    one_column_collapse: false,
                    static_grid: false,
                    handles_enabled: true,
                },
            )
            .unwrap();
        let node = widget(&mut doc, "w-1");
        lib.add_widget(&mut doc, grid, node, 0, 0, 4, 3).unwrap();
        assert_eq!(lib.is_area_empty(&doc, grid, 2, 1, 1, 1), Some(false));
        assert_eq!(lib.is_area_empty(&doc, grid, 5, 0, 1, 1), Some(true));
        assert_eq!(lib.is_area_empty(&doc, grid, 11, 11, 2, 2), Some(false));
        lib.set_supports_empty_query(false);
        assert_eq!(lib.is_area_empty(&doc, grid, 5, 0, 1, 1), None);
    }
}
