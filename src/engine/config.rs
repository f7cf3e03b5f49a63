use crate::grid::GridOptions;

/// Every selector, marker class, store id, grid dimension and debounce
/// window the engine uses, in one place. Defaults follow the host markup
/// contract; embedders with different markup override fields.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Element id of the editable dashboard grid root.
    pub editable_root_id: String,
    /// Attribute marking the editable root as actually editable; drag and
    /// resize handles are enabled only when it reads `"true"`.
    pub editable_marker_attr: String,
    /// Class carried by every per-page static grid root.
    pub static_root_class: String,
    pub widget_class: String,
    pub content_class: String,
    pub header_class: String,
    pub body_class: String,
    /// Delete affordance inside a widget header.
    pub remove_class: String,
    /// Insertion placeholders survive aggressive cleanup.
    pub placeholder_class: String,
    /// Reserved id of the floating insertion affordance node.
    pub affordance_id: String,
    /// Class of the embedded declarative placement list on static pages.
    pub layout_json_class: String,
    /// Marker classes identifying an embedded chart/graph subtree.
    pub chart_markers: Vec<String>,
    /// Host-managed graph container whose sizing gets normalized.
    pub graph_container_class: String,
    /// Reserved filters region inside static widgets; clicks there do not
    /// select the widget unless they hit the opt-in control.
    pub filters_region_class: String,
    pub filters_opt_in_class: String,

    pub widget_store_id: String,
    pub focus_store_id: String,
    pub layout_store_id: String,
    pub add_request_store_id: String,

    pub columns: u32,
    pub rows: u32,
    pub max_rows: u32,
    pub cell_height_px: u32,

    pub observer_debounce_ms: u64,
    /// Delay between a transition's teardown and the follow-up init, so
    /// removed-node mutations settle first.
    pub settle_delay_ms: u64,
    /// Delay before identity repair after the library's own async writes.
    pub repair_delay_ms: u64,
    pub resize_settle_ms: u64,
    pub chart_debounce_ms: u64,
    /// Post-drag window in which a click is still treated as part of the
    /// drag.
    pub click_grace_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            editable_root_id: "grid-root".to_string(),
            editable_marker_attr: "data-editable".to_string(),
            static_root_class: "page-grid-stack".to_string(),
            widget_class: "grid-stack-item".to_string(),
            content_class: "grid-stack-item-content".to_string(),
            header_class: "widget-header".to_string(),
            body_class: "widget-body".to_string(),
            remove_class: "widget-remove".to_string(),
            placeholder_class: "grid-placeholder".to_string(),
            affordance_id: "grid-add-affordance".to_string(),
            layout_json_class: "layout-json".to_string(),
            chart_markers: vec![
                "js-plotly-plot".to_string(),
                "plotly-graph-div".to_string(),
                "chart-embed".to_string(),
            ],
            graph_container_class: "graph-container".to_string(),
            filters_region_class: "widget-filters".to_string(),
            filters_opt_in_class: "filters-apply".to_string(),
            widget_store_id: "widget-store".to_string(),
            focus_store_id: "focus-store".to_string(),
            layout_store_id: "layout-store".to_string(),
            add_request_store_id: "add-widget-request".to_string(),
            columns: 12,
            rows: 8,
            max_rows: 12,
            cell_height_px: 80,
            observer_debounce_ms: 120,
            settle_delay_ms: 150,
            repair_delay_ms: 150,
            resize_settle_ms: 120,
            chart_debounce_ms: 200,
            click_grace_ms: 250,
        }
    }
}

impl EngineConfig {
    pub fn editable_options(&self, handles_enabled: bool) -> GridOptions {
        GridOptions {
            columns: self.columns,
            rows: self.rows,
            max_rows: self.max_rows,
            cell_height: self.cell_height_px,
            float: true,
            one_column_collapse: false,
            static_grid: false,
            handles_enabled,
        }
    }

    pub fn static_options(&self) -> GridOptions {
        GridOptions {
            columns: self.columns,
            rows: self.rows,
            max_rows: self.max_rows,
            cell_height: self.cell_height_px,
            float: true,
            one_column_collapse: false,
            static_grid: true,
            handles_enabled: false,
        }
    }
}
