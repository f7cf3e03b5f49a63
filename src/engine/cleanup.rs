//! Teardown passes. Destroys are best-effort: a library failure is logged
//! and the registers are cleared anyway, so a wedged instance can never
//! block the next initialization.

use crate::dom::Document;
use crate::engine::timers::TaskKind;
use crate::engine::EngineCore;
use crate::grid::GridLibrary;
use crate::layout;
use crate::logging::{json_kv, LogLevel};

const TARGET: &str = "gridsync::cleanup";

/// Destroy every registered static grid instance. Nodes stay in the
/// document; only the grid behavior goes.
pub fn destroy_all_static_grids(
    core: &mut EngineCore,
    doc: &mut Document,
    grids: &mut dyn GridLibrary,
) {
    let entries: Vec<_> = core.registers.static_grids.drain().collect();
    for (root, grid) in entries {
        if let Err(err) = grids.destroy(doc, grid) {
            core.log_with(
                LogLevel::Warn,
                TARGET,
                "static_grid_destroy_failed",
                [json_kv("error", err.to_string())],
            );
        }
        core.registers.static_ready.remove(&root);
    }
}

/// Destroy the editable grid, capturing a restore snapshot first. The
/// registers are cleared unconditionally and pending editable duties are
/// cancelled, even when the capture or the destroy itself fails.
pub fn destroy_editable_grid(
    core: &mut EngineCore,
    doc: &mut Document,
    grids: &mut dyn GridLibrary,
) {
    if let Some(grid) = core.registers.active_grid {
        layout::repair_identity(core, doc);
        if let Some(snapshot) = layout::capture_snapshot(core, doc, grids) {
            core.registers.last_snapshot = Some(snapshot);
        }
        if let Err(err) = grids.destroy(doc, grid) {
            core.log_with(
                LogLevel::Warn,
                TARGET,
                "editable_grid_destroy_failed",
                [json_kv("error", err.to_string())],
            );
        }
        core.log(LogLevel::Info, TARGET, "editable_grid_destroyed");
    }
    core.registers.clear_editable();
    core.timers.cancel(TaskKind::DeferredRepair);
    core.timers.cancel(TaskKind::ResizeSettle);
    if let Some(affordance) = doc.element_by_id(&core.config.affordance_id) {
        doc.detach(affordance);
    }
}

/// Full-page reset: destroy every instance and strip leftover widget nodes
/// out of the static grid roots. Insertion placeholders and anything
/// containing a chart subtree survive, because the host re-adopts those
/// nodes rather than re-rendering them. The editable grid's nodes stay in
/// place for the library to re-adopt on the next init.
pub fn aggressive_cleanup(core: &mut EngineCore, doc: &mut Document, grids: &mut dyn GridLibrary) {
    let placeholder_class = core.config.placeholder_class.clone();
    let markers = core.config.chart_markers.clone();
    let static_class = core.config.static_root_class.clone();

    destroy_all_static_grids(core, doc, grids);
    destroy_editable_grid(core, doc, grids);

    let roots = doc.nodes_with_class(&static_class);
    let mut stripped = 0u64;
    for root in roots {
        let children: Vec<_> = doc.children(root).to_vec();
        for child in children {
            if doc.has_class(child, &placeholder_class)
                || doc.subtree_contains_marker(child, &markers)
            {
                continue;
            }
            doc.detach(child);
            stripped += 1;
        }
    }
    core.log_with(
        LogLevel::Info,
        TARGET,
        "aggressive_cleanup_done",
        [json_kv("stripped", stripped)],
    );
}
