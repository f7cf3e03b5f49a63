//! The editable dashboard grid: initialization with snapshot restore,
//! drag/resize lifecycle, the insertion affordance, widget creation and
//! the click delegation shared with static grids.

use serde_json::{json, Value};

use crate::dom::{Document, NodeId};
use crate::engine::timers::TaskKind;
use crate::engine::EngineCore;
use crate::error::{EngineError, Result};
use crate::grid::{GridEvent, GridEventKind, GridLibrary};
use crate::layout;
use crate::logging::{json_kv, LogLevel};
use crate::model::{CellPos, DragState, WidgetMetadata, WidgetPlacement, WidgetType};
use crate::widget;

const TARGET: &str = "gridsync::main_grid";

/// Inputs for creating a widget on the editable grid. The position comes
/// from the pending insertion register, not from here.
#[derive(Debug, Clone)]
pub struct CreateWidgetParams {
    pub title: String,
    pub w: u32,
    pub h: u32,
    pub kind: WidgetType,
    pub payload: Value,
}

#[derive(Debug, Default)]
pub struct MainGridController {
    /// Cell the insertion affordance currently hovers over, if any.
    hover: Option<CellPos>,
}

impl MainGridController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the editable grid if the root exists and the library is
    /// loaded. Idempotent: an already-active grid returns `Ok` untouched.
    /// Not-ready conditions come back as typed errors so callers can retry
    /// on the next observation cycle without logging noise.
    pub fn try_init(
        &mut self,
        core: &mut EngineCore,
        doc: &mut Document,
        grids: &mut dyn GridLibrary,
    ) -> Result<()> {
        if core.registers.active_grid.is_some() {
            return Ok(());
        }
        let root = doc
            .element_by_id(&core.config.editable_root_id)
            .ok_or(EngineError::NotReady)?;
        if !grids.ready() {
            return Err(EngineError::NotReady);
        }

        let editable = doc.attr(root, &core.config.editable_marker_attr) == Some("true");
        let grid = grids.init(doc, root, core.config.editable_options(editable))?;
        core.registers.active_grid = Some(grid);
        core.registers.drag = DragState::Idle;

        self.restore_from_snapshot(core, doc, grids);
        self.install_affordance(core, doc, root);

        core.log_with(
            LogLevel::Info,
            TARGET,
            "editable_grid_initialized",
            [
                json_kv("grid", core.registers.active_grid.map(|g| g.raw())),
                json_kv("editable", editable),
            ],
        );
        Ok(())
    }

    /// Rebuild widgets from the stored snapshot. Individual add failures
    /// are logged and skipped; a deferred repair pass catches the identity
    /// drift the library introduces while inserting.
    fn restore_from_snapshot(
        &mut self,
        core: &mut EngineCore,
        doc: &mut Document,
        grids: &mut dyn GridLibrary,
    ) {
        let snapshot = match core.registers.last_snapshot.clone() {
            Some(snapshot) if !snapshot.is_empty() => snapshot,
            _ => return,
        };
        let grid = match core.registers.active_grid {
            Some(grid) => grid,
            None => return,
        };
        if let Err(err) = grids.remove_all(doc, grid) {
            core.log_with(
                LogLevel::Warn,
                TARGET,
                "restore_clear_failed",
                [json_kv("error", err.to_string())],
            );
        }
        for placement in &snapshot.placements {
            let title = core
                .store
                .widget_metadata(&placement.id)
                .map(|meta| meta.title)
                .unwrap_or_else(|| placement.id.clone());
            let node = widget::build_widget(doc, &core.config, placement, &title);
            if let Err(err) = grids.add_widget(
                doc,
                grid,
                node,
                placement.x,
                placement.y,
                placement.w,
                placement.h,
            ) {
                core.log_with(
                    LogLevel::Warn,
                    TARGET,
                    "restore_add_failed",
                    [
                        json_kv("widget", placement.id.clone()),
                        json_kv("error", err.to_string()),
                    ],
                );
            }
        }
        core.timers
            .schedule(TaskKind::DeferredRepair, core.config.repair_delay_ms);
        core.log_with(
            LogLevel::Info,
            TARGET,
            "layout_restored",
            [json_kv("widgets", snapshot.len() as u64)],
        );
    }

    fn install_affordance(&mut self, core: &EngineCore, doc: &mut Document, root: NodeId) {
        if doc.element_by_id(&core.config.affordance_id).is_some() {
            return;
        }
        let node = doc.create_element("div");
        doc.set_attr(node, "id", core.config.affordance_id.clone());
        doc.set_hidden(node, true);
        doc.append_child(root, node);
    }

    /// React to one drag/resize/change event from the library. Events for
    /// grids other than the active one are stale and dropped.
    pub fn handle_grid_event(
        &mut self,
        core: &mut EngineCore,
        doc: &mut Document,
        grids: &mut dyn GridLibrary,
        event: GridEvent,
    ) {
        if core.registers.active_grid != Some(event.grid) {
            return;
        }
        match event.kind {
            GridEventKind::DragStart | GridEventKind::ResizeStart => {
                core.registers.drag = DragState::Dragging;
            }
            GridEventKind::DragStop => {
                core.registers.drag = DragState::Grace {
                    until_ms: core.timers.now() + core.config.click_grace_ms,
                };
                layout::save_layout(core, doc, grids);
                core.timers
                    .schedule(TaskKind::DeferredRepair, core.config.repair_delay_ms);
            }
            GridEventKind::ResizeStop => {
                // Persistence and repair wait for the settle pass; the
                // library is still writing geometry right now.
                core.timers
                    .schedule(TaskKind::ResizeSettle, core.config.resize_settle_ms);
            }
            GridEventKind::Change => {
                // Float compaction moves widgets without a drag; embedded
                // charts need the same deferred nudge as a resize stop.
                core.timers
                    .schedule(TaskKind::DeferredRepair, core.config.repair_delay_ms);
                core.timers
                    .schedule(TaskKind::ChartResize, core.config.chart_debounce_ms);
                layout::save_layout(core, doc, grids);
            }
        }
    }

    /// Deferred duty after a resize stop: leave the drag state, persist,
    /// and kick the chart resize debounce.
    pub fn resize_settled(
        &mut self,
        core: &mut EngineCore,
        doc: &mut Document,
        grids: &mut dyn GridLibrary,
    ) {
        core.registers.drag = DragState::Grace {
            until_ms: core.timers.now() + core.config.click_grace_ms,
        };
        layout::save_layout(core, doc, grids);
        layout::repair_identity(core, doc);
        core.timers
            .schedule(TaskKind::ChartResize, core.config.chart_debounce_ms);
    }

    /// Track the pointer over the editable grid (coordinates relative to
    /// the grid root) and move the insertion affordance to the hovered
    /// cell, hiding it over occupied cells or outside the grid.
    pub fn pointer_moved(
        &mut self,
        core: &mut EngineCore,
        doc: &mut Document,
        grids: &dyn GridLibrary,
        x_px: u32,
        y_px: u32,
    ) {
        let grid = match core.registers.active_grid {
            Some(grid) => grid,
            None => return,
        };
        let root = match doc.element_by_id(&core.config.editable_root_id) {
            Some(root) => root,
            None => return,
        };
        let affordance = match doc.element_by_id(&core.config.affordance_id) {
            Some(node) => node,
            None => return,
        };

        let (width, _) = doc.rendered_size(root);
        let cell_w = (width / core.config.columns).max(1);
        let cell = CellPos::new(x_px / cell_w, y_px / core.config.cell_height_px.max(1));
        let in_bounds =
            x_px < width && cell.x < core.config.columns && cell.y < core.config.max_rows;

        let empty = in_bounds
            && match grids.is_area_empty(doc, grid, cell.x, cell.y, 1, 1) {
                Some(empty) => empty,
                // Query unavailable on this handle: fall back to scanning
                // the placement list.
                None => grids
                    .placements(doc, grid)
                    .map(|placements| {
                        !placements.iter().any(|p| {
                            p.x <= cell.x
                                && cell.x < p.x + p.w
                                && p.y <= cell.y
                                && cell.y < p.y + p.h
                        })
                    })
                    .unwrap_or(false),
            };

        if empty {
            doc.set_attr(affordance, "data-cell-x", cell.x.to_string());
            doc.set_attr(affordance, "data-cell-y", cell.y.to_string());
            doc.set_hidden(affordance, false);
            self.hover = Some(cell);
        } else {
            doc.set_hidden(affordance, true);
            self.hover = None;
        }
    }

    /// Click on the insertion affordance: remember the cell and signal the
    /// host through the add-request store.
    pub fn affordance_clicked(&mut self, core: &mut EngineCore, doc: &mut Document) {
        let cell = match self.hover {
            Some(cell) => cell,
            None => return,
        };
        core.registers.pending_insert = Some(cell);
        let store_id = core.config.add_request_store_id.clone();
        core.store.push(
            doc,
            &mut core.registers,
            &mut core.metrics,
            &store_id,
            json!({ "requested": true, "x": cell.x, "y": cell.y }),
        );
    }

    /// Create a widget at the pending insertion cell (origin when none is
    /// pending). Returns false when no grid is active or the library
    /// rejected the insert.
    pub fn create_widget(
        &mut self,
        core: &mut EngineCore,
        doc: &mut Document,
        grids: &mut dyn GridLibrary,
        params: &CreateWidgetParams,
    ) -> bool {
        let grid = match core.registers.active_grid {
            Some(grid) => grid,
            None => {
                core.log(LogLevel::Warn, TARGET, "create_widget_without_grid");
                return false;
            }
        };
        let pos = core.registers.pending_insert.take().unwrap_or(CellPos::ORIGIN);
        let id = core.ids.synthesize(core.timers.now());

        let metadata = WidgetMetadata {
            title: params.title.clone(),
            kind: params.kind,
            payload: params.payload.clone(),
        };
        let updated = core.store.register_metadata(&id, &metadata);
        let store_id = core.config.widget_store_id.clone();
        core.store.push(
            doc,
            &mut core.registers,
            &mut core.metrics,
            &store_id,
            updated,
        );

        let placement = WidgetPlacement {
            id: id.clone(),
            x: pos.x,
            y: pos.y,
            w: params.w,
            h: params.h,
            kind: params.kind,
        };
        let node = widget::build_widget(doc, &core.config, &placement, &params.title);
        if let Err(err) = grids.add_widget(doc, grid, node, pos.x, pos.y, params.w, params.h) {
            core.log_with(
                LogLevel::Warn,
                TARGET,
                "create_widget_add_failed",
                [json_kv("widget", id), json_kv("error", err.to_string())],
            );
            return false;
        }
        core.timers
            .schedule(TaskKind::DeferredRepair, core.config.repair_delay_ms);
        layout::save_layout(core, doc, grids);
        true
    }

    /// Resolve a widget node's identity, running one repair pass if every
    /// marker is missing before giving up.
    pub fn resolve_widget_id(
        &mut self,
        core: &mut EngineCore,
        doc: &mut Document,
        node: NodeId,
    ) -> Option<String> {
        if let Some(id) = marker_id(doc, node) {
            return Some(id);
        }
        layout::repair_identity(core, doc);
        marker_id(doc, node)
    }

    /// Delete affordance click: remove the widget from the grid, drop its
    /// metadata and persist the new layout.
    pub fn delete_widget(
        &mut self,
        core: &mut EngineCore,
        doc: &mut Document,
        grids: &mut dyn GridLibrary,
        node: NodeId,
    ) {
        let grid = match core.registers.active_grid {
            Some(grid) => grid,
            None => return,
        };
        let id = self.resolve_widget_id(core, doc, node);
        if let Err(err) = grids.remove_widget(doc, grid, node) {
            core.log_with(
                LogLevel::Warn,
                TARGET,
                "widget_remove_failed",
                [json_kv("error", err.to_string())],
            );
            return;
        }
        if let Some(id) = &id {
            if let Some(updated) = core.store.unregister_metadata(id) {
                let store_id = core.config.widget_store_id.clone();
                core.store.push(
                    doc,
                    &mut core.registers,
                    &mut core.metrics,
                    &store_id,
                    updated,
                );
            }
        }
        layout::save_layout(core, doc, grids);
        core.log_with(
            LogLevel::Info,
            TARGET,
            "widget_deleted",
            [json_kv("widget", id.unwrap_or_default())],
        );
    }

    /// Widget body click: publish the focus record unless we are inside a
    /// drag or its grace window.
    pub fn select_widget(&mut self, core: &mut EngineCore, doc: &mut Document, node: NodeId) {
        if core.registers.drag.suppresses_click(core.timers.now()) {
            return;
        }
        let id = match self.resolve_widget_id(core, doc, node) {
            Some(id) => id,
            None => return,
        };
        let record = match core.store.widget_metadata(&id) {
            Some(meta) => json!({
                "id": id,
                "title": meta.title,
                "type": meta.kind,
                "payload": meta.payload,
            }),
            None => json!({ "id": id }),
        };
        let store_id = core.config.focus_store_id.clone();
        core.store.push(
            doc,
            &mut core.registers,
            &mut core.metrics,
            &store_id,
            record,
        );
    }
}

fn marker_id(doc: &Document, node: NodeId) -> Option<String> {
    doc.attr(node, "id")
        .or_else(|| doc.attr(node, "data-widget-id"))
        .or_else(|| doc.attr(node, "gs-id"))
        .map(str::to_string)
}
