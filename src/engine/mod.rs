//! Engine composition: shared core state, the host bundle, and the
//! `GridEngine` facade that hosts drive with `pump` and `advance`.

pub mod charts;
pub mod cleanup;
pub mod config;
pub mod main_grid;
pub mod observer;
pub mod registers;
pub mod static_grid;
pub mod timers;

use serde_json::Value;

use crate::dom::{Document, MutationOrigin, NodeId};
use crate::error::Result;
use crate::grid::{ChartLibrary, GridLibrary};
use crate::layout;
use crate::logging::{event_with_fields, json_kv, LogLevel, Logger};
use crate::metrics::EngineMetrics;
use crate::store::StoreBridge;

pub use config::EngineConfig;
pub use main_grid::{CreateWidgetParams, MainGridController};
pub use observer::GridStateObserver;
pub use registers::{IdGen, SharedRegisters};
pub use static_grid::StaticGridController;
pub use timers::{TaskKind, Timers};

const TARGET: &str = "gridsync::engine";

/// Everything the engine owns that is not a component: configuration,
/// registers, the virtual clock, the store bridge, id synthesis, metrics
/// and the logger. Components borrow it mutably for the duration of one
/// operation.
pub struct EngineCore {
    pub config: EngineConfig,
    pub registers: SharedRegisters,
    pub timers: Timers,
    pub store: StoreBridge,
    pub ids: IdGen,
    pub metrics: EngineMetrics,
    pub logger: Option<Logger>,
}

impl EngineCore {
    pub fn new(config: EngineConfig, logger: Option<Logger>) -> Self {
        let store = StoreBridge::new(
            config.widget_store_id.clone(),
            config.focus_store_id.clone(),
            logger.clone(),
        );
        Self {
            config,
            registers: SharedRegisters::new(),
            timers: Timers::new(),
            store,
            ids: IdGen::new(),
            metrics: EngineMetrics::new(),
            logger,
        }
    }

    pub fn log(&self, level: LogLevel, target: &str, message: &str) {
        if let Some(logger) = &self.logger {
            let _ = logger.log(level, target, message);
        }
    }

    pub fn log_with(
        &self,
        level: LogLevel,
        target: &str,
        message: &str,
        fields: impl IntoIterator<Item = (String, Value)>,
    ) {
        if let Some(logger) = &self.logger {
            let _ = logger.log_event(event_with_fields(level, target, message, fields));
        }
    }
}

/// The host side of the boundary: the observed document plus the two
/// third-party libraries. The chart library is genuinely optional.
pub struct Host {
    pub doc: Document,
    pub grids: Box<dyn GridLibrary>,
    pub charts: Option<Box<dyn ChartLibrary>>,
}

impl Host {
    pub fn new(grids: Box<dyn GridLibrary>) -> Self {
        Self {
            doc: Document::new(),
            grids,
            charts: None,
        }
    }

    pub fn with_charts(mut self, charts: Box<dyn ChartLibrary>) -> Self {
        self.charts = Some(charts);
        self
    }
}

/// The synchronization engine. Hosts feed it time (`advance`), let it drain
/// the host's queues (`pump`), and call the named operations for direct UI
/// input. All engine-side document writes inside these entry points are
/// tagged engine-origin so the observer never reacts to its own work.
pub struct GridEngine {
    core: EngineCore,
    main: MainGridController,
    statics: StaticGridController,
    observer: GridStateObserver,
}

impl GridEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            core: EngineCore::new(config, None),
            main: MainGridController::new(),
            statics: StaticGridController::new(),
            observer: GridStateObserver::new(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.core = EngineCore::new(self.core.config.clone(), Some(logger));
        self
    }

    pub fn core(&self) -> &EngineCore {
        &self.core
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.core.metrics
    }

    pub fn registers(&self) -> &SharedRegisters {
        &self.core.registers
    }

    /// Drain the host's queues: grid events, deferred store writes, and
    /// the mutation log. Does not move time; hosts call this after their
    /// own synchronous work.
    pub fn pump(&mut self, host: &mut Host) {
        let events = host.grids.take_events();
        host.doc.set_origin(MutationOrigin::Engine);
        for event in events {
            self.main
                .handle_grid_event(&mut self.core, &mut host.doc, host.grids.as_mut(), event);
        }
        self.core
            .store
            .flush_pending(&mut host.doc, &mut self.core.registers);
        host.doc.set_origin(MutationOrigin::Host);

        let records = host.doc.take_mutations();
        self.observer.intake(&mut self.core, &host.doc, &records);
    }

    /// Move the clock forward, run every duty that comes due, then pump.
    pub fn advance(&mut self, host: &mut Host, delta_ms: u64) {
        self.core.timers.advance(delta_ms);
        loop {
            let due = self.core.timers.take_due();
            if due.is_empty() {
                break;
            }
            for kind in due {
                self.run_task(host, kind);
            }
        }
        self.pump(host);
    }

    fn run_task(&mut self, host: &mut Host, kind: TaskKind) {
        host.doc.set_origin(MutationOrigin::Engine);
        match kind {
            TaskKind::ObserverEvaluate => self.observer.evaluate(
                &mut self.core,
                &mut host.doc,
                host.grids.as_mut(),
                &mut self.main,
                &mut self.statics,
            ),
            TaskKind::DeferredRepair => {
                layout::repair_identity(&mut self.core, &mut host.doc);
            }
            TaskKind::ResizeSettle => {
                self.main
                    .resize_settled(&mut self.core, &mut host.doc, host.grids.as_mut());
            }
            TaskKind::InitEditable => {
                if let Err(err) =
                    self.main
                        .try_init(&mut self.core, &mut host.doc, host.grids.as_mut())
                {
                    if !err.is_not_ready() {
                        self.core.log_with(
                            LogLevel::Warn,
                            TARGET,
                            "editable_init_failed",
                            [json_kv("error", err.to_string())],
                        );
                    }
                }
            }
            TaskKind::InitStatics => {
                self.statics
                    .init_all(&mut self.core, &mut host.doc, host.grids.as_mut());
            }
            TaskKind::ChartResize => {
                charts::force_resize(&mut self.core, &mut host.doc, &mut host.charts);
            }
        }
        host.doc.set_origin(MutationOrigin::Host);
    }

    // ---- host-callable operations ------------------------------------

    /// Explicit editable-grid initialization, for hosts that know the root
    /// just rendered and do not want to wait for the observer.
    pub fn init_editable_grid(&mut self, host: &mut Host) -> Result<()> {
        self.with_engine_origin(host, |engine, host| {
            engine
                .main
                .try_init(&mut engine.core, &mut host.doc, host.grids.as_mut())
        })
    }

    /// Create a widget from host-supplied metadata at the pending insertion
    /// cell. Returns false when no grid is active.
    pub fn create_widget(&mut self, host: &mut Host, params: &CreateWidgetParams) -> bool {
        self.with_engine_origin(host, |engine, host| {
            engine.main.create_widget(
                &mut engine.core,
                &mut host.doc,
                host.grids.as_mut(),
                params,
            )
        })
    }

    /// Repair, capture and persist the current layout; returns the JSON
    /// the host may hand to its own persistence.
    pub fn serialize_layout(&mut self, host: &mut Host) -> Option<String> {
        self.with_engine_origin(host, |engine, host| {
            layout::save_layout(&mut engine.core, &mut host.doc, host.grids.as_mut())
        })
    }

    /// Run one identity repair pass; returns the number of repaired nodes.
    pub fn repair_identity(&mut self, host: &mut Host) -> usize {
        self.with_engine_origin(host, |engine, host| {
            layout::repair_identity(&mut engine.core, &mut host.doc)
        })
    }

    /// Immediate chart resize pass, bypassing the debounce.
    pub fn force_chart_resize(&mut self, host: &mut Host) {
        self.with_engine_origin(host, |engine, host| {
            charts::force_resize(&mut engine.core, &mut host.doc, &mut host.charts);
        })
    }

    /// Arm the chart resize debounce.
    pub fn debounced_chart_resize(&mut self) {
        charts::debounce(&mut self.core);
    }

    /// Pointer position relative to the editable grid root; drives the
    /// insertion affordance.
    pub fn pointer_moved(&mut self, host: &mut Host, x_px: u32, y_px: u32) {
        self.with_engine_origin(host, |engine, host| {
            engine.main.pointer_moved(
                &mut engine.core,
                &mut host.doc,
                host.grids.as_ref(),
                x_px,
                y_px,
            );
        })
    }

    /// Click on the insertion affordance.
    pub fn affordance_clicked(&mut self, host: &mut Host) {
        self.with_engine_origin(host, |engine, host| {
            engine.main.affordance_clicked(&mut engine.core, &mut host.doc);
        })
    }

    /// Delegated click anywhere in the document. Routes to widget deletion,
    /// widget selection, or nothing, applying the static-page filters-region
    /// rule.
    pub fn element_clicked(&mut self, host: &mut Host, target: NodeId) {
        let remove_class = self.core.config.remove_class.clone();
        let widget_class = self.core.config.widget_class.clone();
        let editable_root_id = self.core.config.editable_root_id.clone();
        let filters_region = self.core.config.filters_region_class.clone();
        let filters_opt_in = self.core.config.filters_opt_in_class.clone();

        let doc = &host.doc;
        let widget = match doc.closest_with_class(target, &widget_class) {
            Some(widget) => widget,
            None => return,
        };
        let is_remove = doc.closest_with_class(target, &remove_class).is_some();
        let in_editable = doc
            .element_by_id(&editable_root_id)
            .map(|root| doc.is_descendant_of(widget, root))
            .unwrap_or(false);

        if !is_remove && !in_editable {
            // Static widgets with a filters region only select through the
            // opt-in control; any other click inside the region is for the
            // filter inputs themselves.
            let in_filters = doc
                .closest_with_class(target, &filters_region)
                .map(|region| doc.is_descendant_of(region, widget))
                .unwrap_or(false);
            if in_filters && !doc.has_class(target, &filters_opt_in) {
                return;
            }
        }

        self.with_engine_origin(host, |engine, host| {
            if is_remove && in_editable {
                engine.main.delete_widget(
                    &mut engine.core,
                    &mut host.doc,
                    host.grids.as_mut(),
                    widget,
                );
            } else if !is_remove {
                engine
                    .main
                    .select_widget(&mut engine.core, &mut host.doc, widget);
            }
        })
    }

    /// Full-page reset: aggressive cleanup plus register and timer reset.
    pub fn reset(&mut self, host: &mut Host) {
        self.with_engine_origin(host, |engine, host| {
            cleanup::aggressive_cleanup(&mut engine.core, &mut host.doc, host.grids.as_mut());
        });
        self.core.registers.reset();
        self.core.timers.clear();
    }

    fn with_engine_origin<R>(
        &mut self,
        host: &mut Host,
        f: impl FnOnce(&mut Self, &mut Host) -> R,
    ) -> R {
        host.doc.set_origin(MutationOrigin::Engine);
        let out = f(self, host);
        host.doc.set_origin(MutationOrigin::Host);
        out
    }
}
