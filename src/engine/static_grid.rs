//! Static per-page grids: declarative placement lists embedded in the page,
//! non-interactive instances, loading placeholders for widgets the host has
//! not rendered yet.

use crate::dom::{Document, NodeId};
use crate::engine::EngineCore;
use crate::grid::GridLibrary;
use crate::logging::{json_kv, LogLevel};
use crate::model::DeclaredPlacement;
use crate::widget;

const TARGET: &str = "gridsync::static_grid";

#[derive(Debug, Default)]
pub struct StaticGridController;

impl StaticGridController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize every static grid root on the page. Idempotent: roots
    /// already initialized and still attached are skipped, roots that left
    /// the document get their stale instance destroyed and are re-run if
    /// they come back.
    pub fn init_all(&mut self, core: &mut EngineCore, doc: &mut Document, grids: &mut dyn GridLibrary) {
        self.drop_stale_roots(core, doc, grids);
        if !grids.ready() {
            return;
        }
        let roots = doc.nodes_with_class(&core.config.static_root_class);
        for root in roots {
            if core.registers.static_ready.contains(&root) {
                continue;
            }
            self.init_root(core, doc, grids, root);
        }
    }

    fn drop_stale_roots(
        &mut self,
        core: &mut EngineCore,
        doc: &mut Document,
        grids: &mut dyn GridLibrary,
    ) {
        let stale: Vec<NodeId> = core
            .registers
            .static_ready
            .iter()
            .copied()
            .filter(|root| !doc.attached(*root))
            .collect();
        for root in stale {
            core.registers.static_ready.remove(&root);
            if let Some(grid) = core.registers.static_grids.remove(&root) {
                // The root already left the document; a destroy failure
                // here is only worth a log line.
                if let Err(err) = grids.destroy(doc, grid) {
                    core.log_with(
                        LogLevel::Warn,
                        TARGET,
                        "stale_static_destroy_failed",
                        [json_kv("error", err.to_string())],
                    );
                }
            }
        }
    }

    fn init_root(
        &mut self,
        core: &mut EngineCore,
        doc: &mut Document,
        grids: &mut dyn GridLibrary,
        root: NodeId,
    ) {
        let declared = match self.parse_placements(core, doc, root) {
            Some(declared) => declared,
            None => return,
        };

        let grid = match grids.init(doc, root, core.config.static_options()) {
            Ok(grid) => grid,
            Err(err) => {
                core.log_with(
                    LogLevel::Warn,
                    TARGET,
                    "static_grid_init_failed",
                    [json_kv("error", err.to_string())],
                );
                return;
            }
        };

        let markers = core.config.chart_markers.clone();
        let widget_class = core.config.widget_class.clone();
        for item in &declared {
            let node = match doc.element_by_id(&item.id) {
                Some(node) => node,
                None => widget::build_placeholder(doc, &core.config, item),
            };
            if let Err(err) = grids.add_widget(doc, grid, node, item.x, item.y, item.w, item.h) {
                core.log_with(
                    LogLevel::Warn,
                    TARGET,
                    "static_add_failed",
                    [
                        json_kv("widget", item.id.clone()),
                        json_kv("error", err.to_string()),
                    ],
                );
                continue;
            }
            // Normalize after insertion so the library's own attribute
            // rewrite cannot undo the markers. Chart-bearing nodes go in
            // untouched; rewriting their attributes can wedge the chart.
            if !doc.subtree_contains_marker(node, &markers) {
                doc.add_class(node, &widget_class);
                doc.set_attr(node, "id", item.id.clone());
                doc.set_attr(node, "data-widget-id", item.id.clone());
                doc.set_attr(node, "gs-id", item.id.clone());
                doc.set_attr(node, "data-widget-type", item.kind.as_str());
            }
        }

        core.registers.static_grids.insert(root, grid);
        core.registers.static_ready.insert(root);
        core.log_with(
            LogLevel::Info,
            TARGET,
            "static_grid_initialized",
            [json_kv("widgets", declared.len() as u64)],
        );
    }

    /// Find and parse the embedded placement list. A malformed list skips
    /// this root without failing the others.
    fn parse_placements(
        &self,
        core: &mut EngineCore,
        doc: &Document,
        root: NodeId,
    ) -> Option<Vec<DeclaredPlacement>> {
        let script = doc
            .descendants(root)
            .into_iter()
            .find(|n| doc.has_class(*n, &core.config.layout_json_class))?;
        let text = doc.text(script).unwrap_or("");
        match serde_json::from_str(text) {
            Ok(declared) => Some(declared),
            Err(err) => {
                core.log_with(
                    LogLevel::Warn,
                    TARGET,
                    "placement_list_malformed",
                    [json_kv("error", err.to_string())],
                );
                None
            }
        }
    }
}
