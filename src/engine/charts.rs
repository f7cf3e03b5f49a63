//! Chart resize coordination. Embedded charts do not follow their widget's
//! size on their own; after any geometry change the engine runs a
//! best-effort sequence of independent nudges, debounced into one pass.

use std::collections::BTreeSet;

use crate::dom::{Document, NodeId};
use crate::engine::timers::TaskKind;
use crate::engine::EngineCore;
use crate::grid::ChartLibrary;
use crate::logging::{json_kv, LogLevel};

const TARGET: &str = "gridsync::charts";

/// Arm (or re-arm) the single debounce slot for the resize pass.
pub fn debounce(core: &mut EngineCore) {
    core.timers
        .schedule(TaskKind::ChartResize, core.config.chart_debounce_ms);
}

/// Run the resize pass over every attached chart node. Each of the four
/// steps is independent; a failing one is logged and the rest still run.
pub fn force_resize(
    core: &mut EngineCore,
    doc: &mut Document,
    charts: &mut Option<Box<dyn ChartLibrary>>,
) {
    core.metrics.record_chart_resize();
    let nodes = chart_nodes(core, doc);
    if nodes.is_empty() {
        return;
    }

    let root = doc.root();
    for node in nodes {
        // 1. The library's own resize entry point, when it is loaded.
        if let Some(lib) = charts.as_mut() {
            if lib.ready() {
                if let Err(err) = lib.resize(doc, node) {
                    core.log_with(
                        LogLevel::Debug,
                        TARGET,
                        "native_resize_failed",
                        [json_kv("error", err.to_string())],
                    );
                }
            }
        }
        // 2. Synthetic resize notifications, viewport-wide and targeted.
        doc.dispatch_resize(root);
        doc.dispatch_resize(node);
        // 3. Force a re-layout of the parent container.
        if let Some(parent) = doc.parent(node) {
            doc.force_reflow(parent);
        }
        // 4. Normalize the host's graph container sizing.
        if let Some(container) = doc.closest_with_class(node, &core.config.graph_container_class)
        {
            doc.set_attr(container, "style", "width:100%;height:100%");
        }
    }
}

fn chart_nodes(core: &EngineCore, doc: &Document) -> Vec<NodeId> {
    let mut seen = BTreeSet::new();
    for marker in &core.config.chart_markers {
        for node in doc.nodes_with_class(marker) {
            seen.insert(node);
        }
    }
    seen.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::EngineConfig;
    use crate::grid::SimChartLibrary;

    fn doc_with_chart() -> (Document, NodeId) {
        let mut doc = Document::new();
        let body = doc.root();
        let container = doc.create_element("div");
        doc.add_class(container, "graph-container");
        doc.append_child(body, container);
        let chart = doc.create_element("div");
        doc.add_class(chart, "js-plotly-plot");
        doc.append_child(container, chart);
        (doc, chart)
    }

    #[test]
    fn pass_hits_all_four_steps() {
        let mut core = EngineCore::new(EngineConfig::default(), None);
        let (mut doc, chart) = doc_with_chart();
        let lib = SimChartLibrary::new();
        let mut charts: Option<Box<dyn ChartLibrary>> = Some(Box::new(lib.clone()));

        let reflows_before = doc.reflow_count();
        force_resize(&mut core, &mut doc, &mut charts);
        assert_eq!(lib.resize_count(), 1);
        assert!(doc.reflow_count() > reflows_before);
        let container = doc.parent(chart).unwrap();
        assert_eq!(doc.attr(container, "style"), Some("width:100%;height:100%"));
    }

    #[test]
    fn missing_library_still_runs_the_other_steps() {
        let mut core = EngineCore::new(EngineConfig::default(), None);
        let (mut doc, _chart) = doc_with_chart();
        let mut charts: Option<Box<dyn ChartLibrary>> = None;
        let reflows_before = doc.reflow_count();
        force_resize(&mut core, &mut doc, &mut charts);
        assert!(doc.reflow_count() > reflows_before);
    }

    #[test]
    fn cold_library_is_skipped_quietly() {
        let mut core = EngineCore::new(EngineConfig::default(), None);
        let (mut doc, _chart) = doc_with_chart();
        let lib = SimChartLibrary::new();
        lib.set_ready(false);
        let mut charts: Option<Box<dyn ChartLibrary>> = Some(Box::new(lib.clone()));
        force_resize(&mut core, &mut doc, &mut charts);
        assert_eq!(lib.resize_count(), 0);
    }

    #[test]
    fn debounce_rearms_one_slot() {
        let mut core = EngineCore::new(EngineConfig::default(), None);
        debounce(&mut core);
        core.timers.advance(100);
        debounce(&mut core);
        core.timers.advance(150);
        assert!(core.timers.take_due().is_empty());
        core.timers.advance(50);
        assert_eq!(core.timers.take_due(), vec![TaskKind::ChartResize]);
    }
}
