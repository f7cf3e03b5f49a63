//! Layout capture, identity repair, and persistence.
//!
//! The grid library's placement report is the authority on geometry; the
//! document is the authority on identity and declared type. Capture merges
//! the two, repair keeps the three identity markers on every widget node in
//! agreement, and persistence publishes the merged snapshot to the layout
//! store only when its content hash actually changed.

use serde_json::Value;

use crate::dom::Document;
use crate::engine::EngineCore;
use crate::grid::GridLibrary;
use crate::logging::{json_kv, LogLevel};
use crate::model::{LayoutSnapshot, WidgetPlacement, WidgetType};

const TARGET: &str = "gridsync::layout";

/// Walk every widget under the editable root and rewrite its identity
/// markers from the authoritative id. Resolution order: `id`, then
/// `data-widget-id`, then `gs-id`; a node with none of the three gets a
/// synthesized id. Returns the number of nodes whose markers changed;
/// a clean tree reports zero, so the pass is idempotent.
pub fn repair_identity(core: &mut EngineCore, doc: &mut Document) -> usize {
    let root = match doc.element_by_id(&core.config.editable_root_id) {
        Some(root) => root,
        None => return 0,
    };
    let widget_class = core.config.widget_class.clone();
    let widgets: Vec<_> = doc
        .descendants(root)
        .into_iter()
        .filter(|n| doc.has_class(*n, &widget_class))
        .collect();

    let mut repaired = 0;
    for node in widgets {
        let authoritative = doc
            .attr(node, "id")
            .or_else(|| doc.attr(node, "data-widget-id"))
            .or_else(|| doc.attr(node, "gs-id"))
            .map(str::to_string)
            .unwrap_or_else(|| core.ids.synthesize(core.timers.now()));

        let mut changed = false;
        for marker in ["id", "data-widget-id", "gs-id"] {
            if doc.attr(node, marker) != Some(authoritative.as_str()) {
                doc.set_attr(node, marker, authoritative.clone());
                changed = true;
            }
        }
        if changed {
            repaired += 1;
            core.metrics.record_repair();
        }
    }
    if repaired > 0 {
        core.log_with(
            LogLevel::Debug,
            TARGET,
            "identity_repaired",
            [json_kv("nodes", repaired as u64)],
        );
    }
    repaired
}

/// Capture the live layout of the active editable grid. Geometry comes from
/// the library, declared type from each widget node; nodes the library
/// reports but the document no longer holds fall back to `Unknown`.
pub fn capture_snapshot(
    core: &mut EngineCore,
    doc: &mut Document,
    grids: &dyn GridLibrary,
) -> Option<LayoutSnapshot> {
    let grid = core.registers.active_grid?;
    let raw = match grids.placements(doc, grid) {
        Ok(raw) => raw,
        Err(err) => {
            core.log_with(
                LogLevel::Warn,
                TARGET,
                "layout_capture_failed",
                [json_kv("error", err.to_string())],
            );
            return None;
        }
    };

    let mut placements = Vec::with_capacity(raw.len());
    for item in raw {
        let kind = match doc.element_by_id(&item.id) {
            Some(node) => {
                // Capture doubles as a marker touch-up for the data marker
                // the library tends to drop.
                if doc.attr(node, "data-widget-id") != Some(item.id.as_str()) {
                    doc.set_attr(node, "data-widget-id", item.id.clone());
                }
                doc.attr(node, "data-widget-type")
                    .map(WidgetType::from_attr)
                    .unwrap_or_default()
            }
            None => WidgetType::Unknown,
        };
        placements.push(WidgetPlacement {
            id: item.id,
            x: item.x,
            y: item.y,
            w: item.w,
            h: item.h,
            kind,
        });
    }
    core.metrics.record_snapshot();
    Some(LayoutSnapshot::new(placements))
}

/// Repair, capture, stash the snapshot in the registers and return it as
/// JSON. `None` when no grid is active or the capture failed.
pub fn serialize_snapshot(
    core: &mut EngineCore,
    doc: &mut Document,
    grids: &dyn GridLibrary,
) -> Option<String> {
    repair_identity(core, doc);
    let snapshot = capture_snapshot(core, doc, grids)?;
    let json = match serde_json::to_string(&snapshot) {
        Ok(json) => json,
        Err(err) => {
            core.log_with(
                LogLevel::Warn,
                TARGET,
                "layout_serialize_failed",
                [json_kv("error", err.to_string())],
            );
            return None;
        }
    };
    core.registers.last_snapshot = Some(snapshot);
    Some(json)
}

/// Persist the current layout: serialize, then publish to the layout store
/// unless the content hash matches the last published layout.
pub fn save_layout(
    core: &mut EngineCore,
    doc: &mut Document,
    grids: &mut dyn GridLibrary,
) -> Option<String> {
    let json = serialize_snapshot(core, doc, grids)?;
    let hash = blake3::hash(json.as_bytes());
    if core.registers.last_layout_hash == Some(hash) {
        return Some(json);
    }
    core.registers.last_layout_hash = Some(hash);

    let store_id = core.config.layout_store_id.clone();
    let payload: Value = serde_json::from_str(&json).unwrap_or(Value::Null);
    core.store.push(
        doc,
        &mut core.registers,
        &mut core.metrics,
        &store_id,
        payload,
    );
    core.log_with(
        LogLevel::Info,
        TARGET,
        "layout_published",
        [json_kv("bytes", json.len() as u64)],
    );
    Some(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::EngineConfig;
    use crate::grid::SimGridLibrary;
    use crate::model::WidgetPlacement;

    fn core() -> EngineCore {
        EngineCore::new(EngineConfig::default(), None)
    }

    fn editable_doc(core: &EngineCore) -> (Document, crate::dom::NodeId) {
        let mut doc = Document::new();
        let root = doc.create_element("div");
        let body = doc.root();
        doc.append_child(body, root);
        doc.set_attr(root, "id", core.config.editable_root_id.clone());
        doc.set_rendered_size(root, 1200, 640);
        (doc, root)
    }

    fn add_widget(
        core: &mut EngineCore,
        doc: &mut Document,
        grids: &mut SimGridLibrary,
        id: &str,
        x: u32,
    ) -> crate::dom::NodeId {
        let grid = core.registers.active_grid.unwrap();
        let placement = WidgetPlacement {
            id: id.to_string(),
            x,
            y: 0,
            w: 4,
            h: 3,
            kind: WidgetType::Text,
        };
        let node = crate::widget::build_widget(doc, &core.config, &placement, id);
        grids.add_widget(doc, grid, node, x, 0, 4, 3).unwrap();
        node
    }

    fn init_grid(core: &mut EngineCore, doc: &mut Document, grids: &mut SimGridLibrary) {
        let root = doc.element_by_id(&core.config.editable_root_id).unwrap();
        let grid = grids
            .init(doc, root, core.config.editable_options(true))
            .unwrap();
        core.registers.active_grid = Some(grid);
    }

    #[test]
    fn repair_restores_dropped_markers() {
        let mut core = core();
        let (mut doc, _root) = editable_doc(&core);
        let mut grids = SimGridLibrary::new();
        init_grid(&mut core, &mut doc, &mut grids);
        let node = add_widget(&mut core, &mut doc, &mut grids, "w-1", 0);

        // The library quirk drops the data marker on add.
        assert_eq!(doc.attr(node, "data-widget-id"), None);
        assert_eq!(repair_identity(&mut core, &mut doc), 1);
        assert_eq!(doc.attr(node, "data-widget-id"), Some("w-1"));
        // Second pass is a no-op.
        assert_eq!(repair_identity(&mut core, &mut doc), 0);
    }

    #[test]
    fn repair_synthesizes_when_every_marker_is_gone() {
        let mut core = core();
        let (mut doc, _root) = editable_doc(&core);
        let mut grids = SimGridLibrary::new();
        init_grid(&mut core, &mut doc, &mut grids);
        let node = add_widget(&mut core, &mut doc, &mut grids, "w-1", 0);
        doc.remove_attr(node, "id");
        doc.remove_attr(node, "gs-id");

        assert_eq!(repair_identity(&mut core, &mut doc), 1);
        let id = doc.attr(node, "id").unwrap().to_string();
        assert!(id.starts_with("w-"));
        assert_eq!(doc.attr(node, "gs-id"), Some(id.as_str()));
        assert_eq!(doc.attr(node, "data-widget-id"), Some(id.as_str()));
    }

    #[test]
    fn capture_merges_geometry_and_declared_type() {
        let mut core = core();
        let (mut doc, _root) = editable_doc(&core);
        let mut grids = SimGridLibrary::new();
        init_grid(&mut core, &mut doc, &mut grids);
        add_widget(&mut core, &mut doc, &mut grids, "w-1", 0);
        add_widget(&mut core, &mut doc, &mut grids, "w-2", 4);

        let snapshot = capture_snapshot(&mut core, &mut doc, &grids).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot
            .placements
            .iter()
            .all(|p| p.kind == WidgetType::Text));
    }

    #[test]
    fn save_layout_publishes_once_per_distinct_layout() {
        let mut core = core();
        let (mut doc, _root) = editable_doc(&core);
        let mut grids = SimGridLibrary::new();
        init_grid(&mut core, &mut doc, &mut grids);
        let node = add_widget(&mut core, &mut doc, &mut grids, "w-1", 0);
        let grid = core.registers.active_grid.unwrap();

        save_layout(&mut core, &mut doc, &mut grids).unwrap();
        let first_hash = core.registers.last_layout_hash;
        assert!(first_hash.is_some());

        // Unchanged layout: hash gate holds.
        save_layout(&mut core, &mut doc, &mut grids).unwrap();
        assert_eq!(core.registers.last_layout_hash, first_hash);

        grids.move_widget(&mut doc, grid, node, 4, 2);
        save_layout(&mut core, &mut doc, &mut grids).unwrap();
        assert_ne!(core.registers.last_layout_hash, first_hash);
    }
}
