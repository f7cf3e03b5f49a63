//! Mutation-driven view lifecycle.
//!
//! The observer ingests mutation batches, filters the noise (engine-origin
//! writes, batches entirely inside chart subtrees), debounces evaluation,
//! and drives the view transition table: destroy what left the screen,
//! initialize what arrived, reconcile steady state.

use crate::dom::{Document, MutationKind, MutationOrigin, MutationRecord};
use crate::engine::cleanup;
use crate::engine::main_grid::MainGridController;
use crate::engine::static_grid::StaticGridController;
use crate::engine::timers::TaskKind;
use crate::engine::EngineCore;
use crate::grid::GridLibrary;
use crate::logging::{json_kv, LogLevel};
use crate::model::ViewState;

const TARGET: &str = "gridsync::observer";

#[derive(Debug, Default)]
pub struct GridStateObserver {
    prev: Option<ViewState>,
}

impl GridStateObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_state(&self) -> Option<ViewState> {
        self.prev
    }

    /// Ingest one mutation batch. Schedules (or re-arms) the debounced
    /// evaluation, and the chart resize debounce when the batch suggests
    /// chart geometry changed.
    pub fn intake(&mut self, core: &mut EngineCore, doc: &Document, records: &[MutationRecord]) {
        let host_records: Vec<&MutationRecord> = records
            .iter()
            .filter(|r| r.origin == MutationOrigin::Host)
            .collect();
        if host_records.is_empty() {
            return;
        }
        core.metrics.record_mutation_batch();

        // Chart libraries mutate their own subtree constantly while
        // animating; a batch living entirely inside chart subtrees would
        // otherwise re-arm the debounce forever.
        let all_chart = host_records
            .iter()
            .all(|r| doc.within_marked_subtree(r.target, &core.config.chart_markers));
        if all_chart {
            core.metrics.record_chart_batch_ignored();
            return;
        }

        if host_records.iter().any(|r| self.suggests_chart_resize(core, doc, r)) {
            core.timers
                .schedule(TaskKind::ChartResize, core.config.chart_debounce_ms);
        }

        core.timers
            .schedule(TaskKind::ObserverEvaluate, core.config.observer_debounce_ms);
    }

    /// Widget geometry writes, new chart subtrees and resize notifications
    /// all mean embedded charts may be stale.
    fn suggests_chart_resize(
        &self,
        core: &EngineCore,
        doc: &Document,
        record: &MutationRecord,
    ) -> bool {
        match &record.kind {
            MutationKind::Resize => true,
            MutationKind::Attribute(name) if name == "gs-w" || name == "gs-h" => {
                doc.has_class(record.target, &core.config.widget_class)
                    && doc.subtree_contains_marker(record.target, &core.config.chart_markers)
            }
            MutationKind::ChildList => {
                doc.subtree_contains_marker(record.target, &core.config.chart_markers)
            }
            _ => false,
        }
    }

    /// The debounced evaluation: classify the current view, run the
    /// transition table against the previous one, reconcile steady state.
    pub fn evaluate(
        &mut self,
        core: &mut EngineCore,
        doc: &mut Document,
        grids: &mut dyn GridLibrary,
        main: &mut MainGridController,
        statics: &mut StaticGridController,
    ) {
        core.metrics.record_evaluation();
        let current = ViewState {
            editable_visible: doc
                .element_by_id(&core.config.editable_root_id)
                .map(|n| doc.is_visible(n))
                .unwrap_or(false),
            static_visible: doc
                .nodes_with_class(&core.config.static_root_class)
                .into_iter()
                .any(|n| doc.is_visible(n)),
            observed_at_ms: core.timers.now(),
        };

        match self.prev {
            // Static page left, dashboard arrived: full teardown of the
            // static instances before the editable init is scheduled.
            Some(prev)
                if prev.static_visible && !current.static_visible && current.editable_visible =>
            {
                core.metrics.record_transition();
                self.log_transition(core, "page_to_dashboard", &current);
                cleanup::destroy_all_static_grids(core, doc, grids);
                cleanup::destroy_editable_grid(core, doc, grids);
                core.timers
                    .schedule(TaskKind::InitEditable, core.config.settle_delay_ms);
            }
            // Dashboard left, static page arrived: capture-and-destroy the
            // editable grid, then initialize statics after the settle.
            Some(prev)
                if prev.editable_visible && !current.editable_visible && current.static_visible =>
            {
                core.metrics.record_transition();
                self.log_transition(core, "dashboard_to_page", &current);
                cleanup::destroy_editable_grid(core, doc, grids);
                core.timers
                    .schedule(TaskKind::InitStatics, core.config.settle_delay_ms);
            }
            _ => self.reconcile_steady(core, doc, grids, main, statics, current),
        }
        self.prev = Some(current);
    }

    fn reconcile_steady(
        &mut self,
        core: &mut EngineCore,
        doc: &mut Document,
        grids: &mut dyn GridLibrary,
        main: &mut MainGridController,
        statics: &mut StaticGridController,
        current: ViewState,
    ) {
        if current.editable_visible {
            if core.registers.active_grid.is_none() {
                // Not-ready here is normal: the library may still be
                // loading and the next cycle retries.
                if let Err(err) = main.try_init(core, doc, grids) {
                    if !err.is_not_ready() {
                        core.log_with(
                            LogLevel::Warn,
                            TARGET,
                            "editable_init_failed",
                            [json_kv("error", err.to_string())],
                        );
                    }
                }
            }
        } else if current.static_visible {
            if core.registers.active_grid.is_some() {
                cleanup::destroy_editable_grid(core, doc, grids);
            }
            statics.init_all(core, doc, grids);
        } else if core.registers.active_grid.is_some()
            || !core.registers.static_grids.is_empty()
        {
            cleanup::destroy_editable_grid(core, doc, grids);
            cleanup::destroy_all_static_grids(core, doc, grids);
        }
    }

    fn log_transition(&self, core: &EngineCore, name: &str, current: &ViewState) {
        core.log_with(
            LogLevel::Info,
            TARGET,
            "view_transition",
            [
                json_kv("transition", name),
                json_kv("editable_visible", current.editable_visible),
                json_kv("static_visible", current.static_visible),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::EngineConfig;
    use crate::grid::SimGridLibrary;

    struct Fixture {
        core: EngineCore,
        doc: Document,
        grids: SimGridLibrary,
        main: MainGridController,
        statics: StaticGridController,
        observer: GridStateObserver,
        editable_root: crate::dom::NodeId,
        static_root: crate::dom::NodeId,
    }

    fn fixture() -> Fixture {
        let core = EngineCore::new(EngineConfig::default(), None);
        let mut doc = Document::new();
        let body = doc.root();

        let editable_root = doc.create_element("div");
        doc.append_child(body, editable_root);
        doc.set_attr(editable_root, "id", core.config.editable_root_id.clone());
        doc.set_attr(editable_root, "data-editable", "true");
        doc.set_rendered_size(editable_root, 1200, 640);
        doc.set_hidden(editable_root, true);

        let static_root = doc.create_element("div");
        doc.append_child(body, static_root);
        doc.add_class(static_root, &core.config.static_root_class);
        doc.set_rendered_size(static_root, 1200, 640);
        doc.set_hidden(static_root, true);
        let script = doc.create_element("script");
        doc.add_class(script, &core.config.layout_json_class);
        doc.set_text(script, r#"[{"id": "sales", "x": 0, "y": 0}]"#);
        doc.append_child(static_root, script);

        // Fixture construction happens under host origin; drain that noise
        // so tests observe only the mutations they make themselves.
        let _ = doc.take_mutations();

        Fixture {
            core,
            doc,
            grids: SimGridLibrary::new(),
            main: MainGridController::new(),
            statics: StaticGridController::new(),
            observer: GridStateObserver::new(),
            editable_root,
            static_root,
        }
    }

    impl Fixture {
        fn evaluate(&mut self) {
            self.observer.evaluate(
                &mut self.core,
                &mut self.doc,
                &mut self.grids,
                &mut self.main,
                &mut self.statics,
            );
        }

        fn run_due(&mut self) {
            for kind in self.core.timers.take_due() {
                match kind {
                    TaskKind::InitEditable => {
                        let _ = self.main.try_init(&mut self.core, &mut self.doc, &mut self.grids);
                    }
                    TaskKind::InitStatics => {
                        self.statics
                            .init_all(&mut self.core, &mut self.doc, &mut self.grids);
                    }
                    TaskKind::ObserverEvaluate => self.evaluate(),
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn steady_state_initializes_the_visible_side() {
        let mut f = fixture();
        f.doc.set_hidden(f.editable_root, false);
        f.evaluate();
        assert!(f.core.registers.active_grid.is_some());
        assert!(f.core.registers.static_grids.is_empty());
    }

    #[test]
    fn page_to_dashboard_transition_destroys_statics_first() {
        let mut f = fixture();
        // Start on the static page.
        f.doc.set_hidden(f.static_root, false);
        f.evaluate();
        assert_eq!(f.core.registers.static_grids.len(), 1);

        // Navigate: statics leave, dashboard arrives.
        f.doc.set_hidden(f.static_root, true);
        f.doc.set_hidden(f.editable_root, false);
        f.evaluate();
        assert!(f.core.registers.static_grids.is_empty());
        // Editable init is settle-delayed, not immediate.
        assert!(f.core.registers.active_grid.is_none());
        assert!(f.core.timers.is_scheduled(TaskKind::InitEditable));

        f.core.timers.advance(f.core.config.settle_delay_ms);
        f.run_due();
        assert!(f.core.registers.active_grid.is_some());
    }

    #[test]
    fn dashboard_to_page_transition_captures_before_destroy() {
        let mut f = fixture();
        f.doc.set_hidden(f.editable_root, false);
        f.evaluate();
        let grid = f.core.registers.active_grid.unwrap();
        let node = {
            let placement = crate::model::WidgetPlacement {
                id: "w-1".into(),
                x: 0,
                y: 0,
                w: 4,
                h: 3,
                kind: crate::model::WidgetType::Text,
            };
            let node =
                crate::widget::build_widget(&mut f.doc, &f.core.config, &placement, "w-1");
            f.grids.add_widget(&mut f.doc, grid, node, 0, 0, 4, 3).unwrap();
            node
        };

        f.doc.set_hidden(f.editable_root, true);
        f.doc.set_hidden(f.static_root, false);
        f.evaluate();
        assert!(f.core.registers.active_grid.is_none());
        let snapshot = f.core.registers.last_snapshot.clone().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.placements[0].id, "w-1");
        assert!(f.core.timers.is_scheduled(TaskKind::InitStatics));
        // The widget node was not detached by the destroy.
        assert!(f.doc.attached(node));

        f.core.timers.advance(f.core.config.settle_delay_ms);
        f.run_due();
        assert_eq!(f.core.registers.static_grids.len(), 1);
    }

    #[test]
    fn engine_origin_batches_are_ignored() {
        let mut f = fixture();
        f.doc.set_origin(crate::dom::MutationOrigin::Engine);
        f.doc.set_attr(f.editable_root, "data-widget-id", "x");
        f.doc.set_origin(crate::dom::MutationOrigin::Host);
        let records = f.doc.take_mutations();
        f.observer.intake(&mut f.core, &f.doc, &records);
        assert!(!f.core.timers.is_scheduled(TaskKind::ObserverEvaluate));
    }

    #[test]
    fn all_chart_batches_are_dropped_without_rearming() {
        let mut f = fixture();
        let chart = f.doc.create_element("div");
        f.doc.append_child(f.static_root, chart);
        f.doc.add_class(chart, "js-plotly-plot");
        let inner = f.doc.create_element("path");
        f.doc.append_child(chart, inner);
        let _ = f.doc.take_mutations();

        f.doc.set_attr(inner, "d", "M0,0");
        f.doc.set_attr(chart, "data-frame", "7");
        let records = f.doc.take_mutations();
        f.observer.intake(&mut f.core, &f.doc, &records);
        assert!(!f.core.timers.is_scheduled(TaskKind::ObserverEvaluate));

        // A mixed batch does schedule evaluation.
        f.doc.set_attr(f.static_root, "data-page", "sales");
        let records = f.doc.take_mutations();
        f.observer.intake(&mut f.core, &f.doc, &records);
        assert!(f.core.timers.is_scheduled(TaskKind::ObserverEvaluate));
    }

    #[test]
    fn repeated_batches_coalesce_into_one_evaluation() {
        let mut f = fixture();
        f.doc.set_hidden(f.editable_root, false);
        for _ in 0..5 {
            f.doc.set_attr(f.editable_root, "data-tick", "x");
            let records = f.doc.take_mutations();
            f.observer.intake(&mut f.core, &f.doc, &records);
            f.core.timers.advance(f.core.config.observer_debounce_ms / 2);
            f.run_due();
        }
        assert_eq!(f.core.metrics.snapshot(std::time::Duration::ZERO).evaluations, 0);
        f.core.timers.advance(f.core.config.observer_debounce_ms);
        f.run_due();
        assert_eq!(f.core.metrics.snapshot(std::time::Duration::ZERO).evaluations, 1);
    }

    #[test]
    fn steady_state_logs_real_init_failures_but_not_ready_is_quiet() {
        use crate::logging::{Logger, MemorySink};

        let sink = MemorySink::new();
        let mut core = EngineCore::new(
            EngineConfig::default(),
            Some(Logger::new(sink.clone())),
        );
        let mut doc = Document::new();
        let body = doc.root();
        let root = doc.create_element("div");
        doc.append_child(body, root);
        doc.set_attr(root, "id", core.config.editable_root_id.clone());
        doc.set_rendered_size(root, 1200, 640);
        let mut grids = SimGridLibrary::new();
        let mut main = MainGridController::new();
        let mut statics = StaticGridController::new();
        let mut observer = GridStateObserver::new();

        // Library not loaded: retry-later, no log noise.
        grids.set_ready(false);
        observer.evaluate(&mut core, &mut doc, &mut grids, &mut main, &mut statics);
        assert!(sink
            .events()
            .iter()
            .all(|e| e.message != "editable_init_failed"));

        // Library loaded but init throws: worth a warning.
        grids.set_ready(true);
        grids.set_fail_init(true);
        observer.evaluate(&mut core, &mut doc, &mut grids, &mut main, &mut statics);
        assert!(sink
            .events()
            .iter()
            .any(|e| e.message == "editable_init_failed"));
    }

    #[test]
    fn empty_view_tears_everything_down() {
        let mut f = fixture();
        f.doc.set_hidden(f.editable_root, false);
        f.evaluate();
        assert!(f.core.registers.active_grid.is_some());
        f.doc.set_hidden(f.editable_root, true);
        // Neither subtree visible: not a transition, a teardown.
        f.evaluate();
        assert!(f.core.registers.active_grid.is_none());
    }
}
