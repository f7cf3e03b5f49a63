//! Bridge to the host's key-value stores.
//!
//! Writes degrade through a fixed ladder: a host-provided direct setter, a
//! `data` property assignment on a dedicated store element, a serialized
//! attribute write, and finally a pending queue for stores whose element has
//! not appeared yet. Pending writes are flushed by the engine's pump, so a
//! deferred write lands as soon as the element shows up without any polling.

use serde_json::{json, Value};

use crate::dom::{Document, NodeId};
use crate::engine::registers::SharedRegisters;
use crate::logging::{event_with_fields, json_kv, LogLevel, Logger};
use crate::metrics::EngineMetrics;

const TARGET: &str = "gridsync::store";

/// Attribute used by the serialized-attribute fallback strategy.
pub const DATA_STORE_ATTR: &str = "data-store";

/// Host hook that writes straight into the store backend, bypassing the
/// document. Returning `false` means this setter does not handle the store
/// and the bridge falls through to the element strategies.
pub trait DirectStoreSetter {
    fn set(&mut self, store_id: &str, payload: &Value) -> bool;
}

/// Which rung of the degradation ladder a write landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Direct,
    Element,
    Attribute,
    Deferred,
}

pub struct StoreBridge {
    widget_store_id: String,
    focus_store_id: String,
    direct: Option<Box<dyn DirectStoreSetter>>,
    /// Last value pushed per store id; serves reads even while the write
    /// itself is still deferred.
    cache: std::collections::HashMap<String, Value>,
    pending: Vec<(String, Value)>,
    logger: Option<Logger>,
}

impl StoreBridge {
    pub fn new(
        widget_store_id: impl Into<String>,
        focus_store_id: impl Into<String>,
        logger: Option<Logger>,
    ) -> Self {
        Self {
            widget_store_id: widget_store_id.into(),
            focus_store_id: focus_store_id.into(),
            direct: None,
            cache: std::collections::HashMap::new(),
            pending: Vec::new(),
            logger,
        }
    }

    pub fn set_direct_setter(&mut self, setter: Box<dyn DirectStoreSetter>) {
        self.direct = Some(setter);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Write `payload` to the store named `store_id`, taking the best
    /// strategy currently available.
    pub fn push(
        &mut self,
        doc: &mut Document,
        registers: &mut SharedRegisters,
        metrics: &mut EngineMetrics,
        store_id: &str,
        payload: Value,
    ) -> PushOutcome {
        metrics.record_store_push();
        self.cache.insert(store_id.to_string(), payload.clone());

        if let Some(direct) = self.direct.as_mut() {
            if direct.set(store_id, &payload) {
                return PushOutcome::Direct;
            }
        }

        match self.resolve_store_node(doc, registers, store_id) {
            Some(node) => self.write_to_node(doc, node, store_id, payload),
            None => {
                self.log(
                    LogLevel::Debug,
                    "store_write_deferred",
                    &[json_kv("store", store_id)],
                );
                // One queued write per store; a newer payload supersedes.
                self.pending.retain(|(id, _)| id != store_id);
                self.pending.push((store_id.to_string(), payload));
                PushOutcome::Deferred
            }
        }
    }

    /// Apply every queued write whose store element has since appeared.
    /// Returns the number of writes applied.
    pub fn flush_pending(
        &mut self,
        doc: &mut Document,
        registers: &mut SharedRegisters,
    ) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let queued = std::mem::take(&mut self.pending);
        let mut applied = 0;
        for (store_id, payload) in queued {
            match self.resolve_store_node(doc, registers, &store_id) {
                Some(node) => {
                    self.write_to_node(doc, node, &store_id, payload);
                    applied += 1;
                }
                None => self.pending.push((store_id, payload)),
            }
        }
        applied
    }

    /// Read the last known value. Well-known stores fall back to an empty
    /// record rather than `None`; unknown ids are a caller bug worth a log
    /// line.
    pub fn read(&self, store_id: &str) -> Option<Value> {
        if let Some(value) = self.cache.get(store_id) {
            return Some(value.clone());
        }
        if store_id == self.widget_store_id || store_id == self.focus_store_id {
            return Some(json!({}));
        }
        self.log(
            LogLevel::Warn,
            "store_read_unknown_id",
            &[json_kv("store", store_id)],
        );
        None
    }

    /// Metadata record for one widget out of the widget store, if present.
    pub fn widget_metadata(&self, widget_id: &str) -> Option<crate::model::WidgetMetadata> {
        let map = self.cache.get(&self.widget_store_id)?;
        let record = map.as_object()?.get(widget_id)?;
        serde_json::from_value(record.clone()).ok()
    }

    /// Insert or replace one widget's metadata in the cached widget store
    /// map and return the updated map, ready to push.
    pub fn register_metadata(
        &mut self,
        widget_id: &str,
        metadata: &crate::model::WidgetMetadata,
    ) -> Value {
        let mut map = self
            .cache
            .get(&self.widget_store_id)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        if let Ok(record) = serde_json::to_value(metadata) {
            map.insert(widget_id.to_string(), record);
        }
        Value::Object(map)
    }

    /// Remove one widget's metadata from the cached widget store map.
    /// Returns the updated map when the id was present, ready to push.
    pub fn unregister_metadata(&mut self, widget_id: &str) -> Option<Value> {
        let mut map = self
            .cache
            .get(&self.widget_store_id)
            .and_then(Value::as_object)
            .cloned()?;
        map.remove(widget_id)?;
        Some(Value::Object(map))
    }

    fn write_to_node(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        store_id: &str,
        payload: Value,
    ) -> PushOutcome {
        if doc.tag(node) == "store" {
            doc.set_data(node, payload);
            doc.dispatch_change(node);
            PushOutcome::Element
        } else {
            let serialized = payload.to_string();
            doc.set_attr(node, DATA_STORE_ATTR, serialized);
            doc.dispatch_change(node);
            self.log(
                LogLevel::Warn,
                "store_write_degraded_to_attribute",
                &[json_kv("store", store_id)],
            );
            PushOutcome::Attribute
        }
    }

    /// Resolve the store element, going through the register cache for the
    /// two hot stores. Cached addresses are re-validated: a detached or
    /// re-identified node falls back to a fresh lookup.
    fn resolve_store_node(
        &self,
        doc: &Document,
        registers: &mut SharedRegisters,
        store_id: &str,
    ) -> Option<NodeId> {
        let slot = if store_id == self.widget_store_id {
            Some(&mut registers.widget_store_node)
        } else if store_id == self.focus_store_id {
            Some(&mut registers.focus_store_node)
        } else {
            None
        };

        match slot {
            Some(slot) => {
                if let Some(node) = *slot {
                    if doc.attached(node) && doc.attr(node, "id") == Some(store_id) {
                        return Some(node);
                    }
                    *slot = None;
                }
                let found = doc.element_by_id(store_id);
                *slot = found;
                found
            }
            None => doc.element_by_id(store_id),
        }
    }

    fn log(&self, level: LogLevel, message: &str, fields: &[(String, Value)]) {
        if let Some(logger) = &self.logger {
            let _ = logger.log_event(event_with_fields(
                level,
                TARGET,
                message,
                fields.iter().cloned(),
            ));
        }
    }
}
