//! End-to-end lifecycle scenarios driven through the public engine API:
//! the host mutates the document, the engine reacts through pump/advance.

use serde_json::Value;

use gridsync::dom::NodeId;
use gridsync::{
    CreateWidgetParams, EngineConfig, GridEngine, Host, LayoutSnapshot, SimChartLibrary,
    SimGridLibrary, TaskKind, WidgetType,
};

struct Page {
    engine: GridEngine,
    host: Host,
    charts: SimChartLibrary,
    editable_root: NodeId,
    static_root: NodeId,
}

fn page() -> Page {
    let charts = SimChartLibrary::new();
    let mut host =
        Host::new(Box::new(SimGridLibrary::new())).with_charts(Box::new(charts.clone()));
    let config = EngineConfig::default();
    let body = host.doc.root();

    let editable_root = host.doc.create_element("div");
    host.doc.append_child(body, editable_root);
    host.doc
        .set_attr(editable_root, "id", config.editable_root_id.clone());
    host.doc.set_attr(editable_root, "data-editable", "true");
    host.doc.set_rendered_size(editable_root, 1200, 640);
    host.doc.set_hidden(editable_root, true);

    let static_root = host.doc.create_element("div");
    host.doc.append_child(body, static_root);
    host.doc.add_class(static_root, &config.static_root_class);
    host.doc.set_rendered_size(static_root, 1200, 640);
    host.doc.set_hidden(static_root, true);
    let script = host.doc.create_element("script");
    host.doc.add_class(script, &config.layout_json_class);
    host.doc.set_text(
        script,
        r#"[{"id": "sales", "x": 0, "y": 0, "w": 6, "h": 4, "title": "Sales"}]"#,
    );
    host.doc.append_child(static_root, script);

    Page {
        engine: GridEngine::new(config),
        host,
        charts,
        editable_root,
        static_root,
    }
}

impl Page {
    /// Run enough pump/advance rounds for every debounce and settle delay
    /// to have fired.
    fn settle(&mut self) {
        for _ in 0..5 {
            self.engine.advance(&mut self.host, 250);
        }
    }

    /// Create a widget through the insertion affordance at a pixel position
    /// over the editable grid.
    fn create_at(&mut self, title: &str, x_px: u32, y_px: u32) {
        self.engine.pointer_moved(&mut self.host, x_px, y_px);
        self.engine.affordance_clicked(&mut self.host);
        assert!(self.engine.create_widget(
            &mut self.host,
            &CreateWidgetParams {
                title: title.to_string(),
                w: 4,
                h: 3,
                kind: WidgetType::Text,
                payload: Value::Null,
            },
        ));
    }

    fn transitions(&self) -> u64 {
        self.engine
            .metrics()
            .snapshot(std::time::Duration::ZERO)
            .transitions
    }
}

#[test]
fn layout_survives_a_navigation_round_trip() {
    let mut p = page();
    p.host.doc.set_hidden(p.editable_root, false);
    p.settle();
    assert!(p.engine.registers().active_grid.is_some());

    p.create_at("Revenue", 10, 10);
    p.create_at("Costs", 650, 10);
    let before = p.engine.serialize_layout(&mut p.host).unwrap();
    let before: LayoutSnapshot = serde_json::from_str(&before).unwrap();
    assert_eq!(before.len(), 2);

    // Dashboard leaves, the static page arrives.
    p.host.doc.set_hidden(p.editable_root, true);
    p.host.doc.set_hidden(p.static_root, false);
    p.settle();
    assert!(p.engine.registers().active_grid.is_none());
    assert_eq!(p.engine.registers().static_grids.len(), 1);

    // And back: the editable grid restores itself from the snapshot the
    // teardown captured.
    p.host.doc.set_hidden(p.static_root, true);
    p.host.doc.set_hidden(p.editable_root, false);
    p.settle();
    assert!(p.engine.registers().active_grid.is_some());
    let after = p.engine.serialize_layout(&mut p.host).unwrap();
    let after: LayoutSnapshot = serde_json::from_str(&after).unwrap();
    assert_eq!(after.key_set(), before.key_set());
}

#[test]
fn page_to_dashboard_fires_once_and_tears_statics_down_first() {
    let mut p = page();
    p.host.doc.set_hidden(p.static_root, false);
    p.settle();
    assert_eq!(p.engine.registers().static_grids.len(), 1);
    assert_eq!(p.transitions(), 0);

    p.host.doc.set_hidden(p.static_root, true);
    p.host.doc.set_hidden(p.editable_root, false);
    let debounce_ms = p.engine.core().config.observer_debounce_ms;
    let settle_ms = p.engine.core().config.settle_delay_ms;
    p.engine.pump(&mut p.host);
    p.engine.advance(&mut p.host, debounce_ms);

    // Statics are already gone while the editable init is still
    // settle-delayed.
    assert!(p.engine.registers().static_grids.is_empty());
    assert!(p.engine.registers().active_grid.is_none());
    assert!(p.engine.core().timers.is_scheduled(TaskKind::InitEditable));
    assert_eq!(p.transitions(), 1);

    p.engine.advance(&mut p.host, settle_ms);
    assert!(p.engine.registers().active_grid.is_some());

    // Further cycles reconcile in steady state; the transition stays fired
    // exactly once.
    p.settle();
    assert_eq!(p.transitions(), 1);
}

#[test]
fn repeated_debounce_requests_yield_one_resize_pass() {
    let mut p = page();
    let body = p.host.doc.root();
    let chart = p.host.doc.create_element("div");
    p.host.doc.add_class(chart, "js-plotly-plot");
    p.host.doc.append_child(body, chart);

    for _ in 0..6 {
        p.engine.debounced_chart_resize();
        p.engine.advance(&mut p.host, 50);
    }
    assert_eq!(p.charts.resize_count(), 0);
    p.engine.advance(&mut p.host, 200);
    assert_eq!(p.charts.resize_count(), 1);
}

#[test]
fn deferred_store_write_lands_when_the_element_appears() {
    let mut p = page();
    p.host.doc.set_hidden(p.editable_root, false);
    p.settle();
    p.create_at("Revenue", 10, 10);
    // No store element exists yet: the metadata write is queued.
    assert!(p.engine.core().store.pending_len() > 0);

    let body = p.host.doc.root();
    let store = p.host.doc.create_element("store");
    p.host.doc.append_child(body, store);
    p.host.doc.set_attr(store, "id", "widget-store");
    p.engine.pump(&mut p.host);

    let data = p.host.doc.data(store).unwrap();
    let map = data.as_object().unwrap();
    assert_eq!(map.len(), 1);
    let record = map.values().next().unwrap();
    assert_eq!(record["title"], "Revenue");
}

#[test]
fn reset_preserves_chart_widgets_in_static_grids() {
    let mut p = page();
    p.host.doc.set_hidden(p.static_root, false);
    p.settle();
    let placeholder = p.host.doc.element_by_id("sales").unwrap();

    let plain = p.host.doc.create_element("div");
    p.host.doc.append_child(p.static_root, plain);
    let chart_widget = p.host.doc.create_element("div");
    p.host.doc.append_child(p.static_root, chart_widget);
    let chart = p.host.doc.create_element("div");
    p.host.doc.add_class(chart, "js-plotly-plot");
    p.host.doc.append_child(chart_widget, chart);

    p.engine.reset(&mut p.host);
    assert!(!p.host.doc.attached(plain));
    assert!(p.host.doc.attached(chart_widget));
    assert!(p.host.doc.attached(placeholder));
    assert!(p.engine.registers().active_grid.is_none());
    assert!(p.engine.registers().static_grids.is_empty());
}
