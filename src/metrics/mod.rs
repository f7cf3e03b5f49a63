use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

/// Saturating counters for everything the engine does per session.
#[derive(Debug, Default, Clone)]
pub struct EngineMetrics {
    mutation_batches: u64,
    chart_batches_ignored: u64,
    evaluations: u64,
    transitions: u64,
    snapshots_captured: u64,
    identity_repairs: u64,
    store_pushes: u64,
    chart_resizes: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_mutation_batch(&mut self) {
        self.mutation_batches = self.mutation_batches.saturating_add(1);
    }

    pub fn record_chart_batch_ignored(&mut self) {
        self.chart_batches_ignored = self.chart_batches_ignored.saturating_add(1);
    }

    pub fn record_evaluation(&mut self) {
        self.evaluations = self.evaluations.saturating_add(1);
    }

    pub fn record_transition(&mut self) {
        self.transitions = self.transitions.saturating_add(1);
    }

    pub fn record_snapshot(&mut self) {
        self.snapshots_captured = self.snapshots_captured.saturating_add(1);
    }

    pub fn record_repair(&mut self) {
        self.identity_repairs = self.identity_repairs.saturating_add(1);
    }

    pub fn record_store_push(&mut self) {
        self.store_pushes = self.store_pushes.saturating_add(1);
    }

    pub fn record_chart_resize(&mut self) {
        self.chart_resizes = self.chart_resizes.saturating_add(1);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            mutation_batches: self.mutation_batches,
            chart_batches_ignored: self.chart_batches_ignored,
            evaluations: self.evaluations,
            transitions: self.transitions,
            snapshots_captured: self.snapshots_captured,
            identity_repairs: self.identity_repairs,
            store_pushes: self.store_pushes,
            chart_resizes: self.chart_resizes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub mutation_batches: u64,
    pub chart_batches_ignored: u64,
    pub evaluations: u64,
    pub transitions: u64,
    pub snapshots_captured: u64,
    pub identity_repairs: u64,
    pub store_pushes: u64,
    pub chart_resizes: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        let mut fields = LogFields::new();
        fields.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        fields.insert("mutation_batches".to_string(), json!(self.mutation_batches));
        fields.insert(
            "chart_batches_ignored".to_string(),
            json!(self.chart_batches_ignored),
        );
        fields.insert("evaluations".to_string(), json!(self.evaluations));
        fields.insert("transitions".to_string(), json!(self.transitions));
        fields.insert(
            "snapshots_captured".to_string(),
            json!(self.snapshots_captured),
        );
        fields.insert("identity_repairs".to_string(), json!(self.identity_repairs));
        fields.insert("store_pushes".to_string(), json!(self.store_pushes));
        fields.insert("chart_resizes".to_string(), json!(self.chart_resizes));
        LogEvent::with_fields(LogLevel::Info, target.to_string(), "engine_metrics", fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let mut metrics = EngineMetrics::new();
        metrics.record_mutation_batch();
        metrics.record_mutation_batch();
        metrics.record_transition();
        let snapshot = metrics.snapshot(Duration::from_millis(500));
        assert_eq!(snapshot.mutation_batches, 2);
        assert_eq!(snapshot.transitions, 1);
        assert_eq!(snapshot.uptime_ms, 500);
    }

    #[test]
    fn snapshot_serializes_to_log_event() {
        let metrics = EngineMetrics::new();
        let event = metrics
            .snapshot(Duration::from_secs(1))
            .to_log_event("gridsync::metrics");
        assert_eq!(event.message, "engine_metrics");
        assert_eq!(event.fields.get("uptime_ms"), Some(&json!(1000)));
    }
}
