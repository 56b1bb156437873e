use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

/// Counters recorded across layout resolutions.
#[derive(Debug, Default, Clone)]
pub struct ResolveMetrics {
    layouts: u64,
    placements: u64,
    conflicts: u64,
    connections: u64,
}

impl ResolveMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_layout(&mut self) {
        self.layouts = self.layouts.saturating_add(1);
    }

    /// Sobjects placed into assemblies, seeded and appended alike.
    pub fn record_placements(&mut self, count: usize) {
        if count > 0 {
            self.placements = self.placements.saturating_add(count as u64);
        }
    }

    pub fn record_conflict(&mut self) {
        self.conflicts = self.conflicts.saturating_add(1);
    }

    pub fn record_connections(&mut self, count: usize) {
        if count > 0 {
            self.connections = self.connections.saturating_add(count as u64);
        }
    }

    pub fn snapshot(&self, elapsed: Duration) -> MetricSnapshot {
        MetricSnapshot {
            elapsed_ms: elapsed.as_millis() as u64,
            layouts: self.layouts,
            placements: self.placements,
            conflicts: self.conflicts,
            connections: self.connections,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricSnapshot {
    pub elapsed_ms: u64,
    pub layouts: u64,
    pub placements: u64,
    pub conflicts: u64,
    pub connections: u64,
}

impl MetricSnapshot {
    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("elapsed_ms".to_string(), json!(self.elapsed_ms));
        map.insert("layouts".to_string(), json!(self.layouts));
        map.insert("placements".to_string(), json!(self.placements));
        map.insert("conflicts".to_string(), json!(self.conflicts));
        map.insert("connections".to_string(), json!(self.connections));
        map
    }

    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(
            LogLevel::Info,
            target.to_string(),
            "resolve_metrics".to_string(),
            self.as_fields(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_and_snapshot() {
        let mut metrics = ResolveMetrics::new();
        metrics.record_layout();
        metrics.record_placements(8);
        metrics.record_conflict();
        metrics.record_connections(7);
        metrics.record_placements(0);

        let snapshot = metrics.snapshot(Duration::from_millis(12));
        assert_eq!(snapshot.layouts, 1);
        assert_eq!(snapshot.placements, 8);
        assert_eq!(snapshot.conflicts, 1);
        assert_eq!(snapshot.connections, 7);
        assert_eq!(snapshot.elapsed_ms, 12);

        let event = snapshot.to_log_event("kitbash::resolve.metrics");
        assert_eq!(event.message, "resolve_metrics");
        assert_eq!(event.fields.get("placements"), Some(&json!(8)));
    }
}
