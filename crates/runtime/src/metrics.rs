use std::collections::BTreeMap;

/// Radius queries issued against the spatial index by the viewport tracker.
pub const VIEWPORT_RADIUS_QUERIES: &str = "viewport.radius_queries";
/// Camera-settle events that moved less than the coordinate precision.
pub const VIEWPORT_UNCHANGED: &str = "viewport.unchanged";
/// Points activated / deactivated per settled delta.
pub const VIEWPORT_ACTIVATED: &str = "viewport.activated";
pub const VIEWPORT_DEACTIVATED: &str = "viewport.deactivated";
/// Current working-set size.
pub const STORE_MATERIALIZED: &str = "store.materialized";
/// Points the renderer refused to add.
pub const STORE_RENDER_FAILURES: &str = "store.render_failures";
pub const INSPECTION_PROMOTED: &str = "inspection.promoted";
pub const INSPECTION_REVERTED: &str = "inspection.reverted";
/// Lookup results and timer fires dropped because their entity moved on.
pub const INSPECTION_STALE_DISCARDED: &str = "inspection.stale_discarded";

/// Deterministic metrics aggregation.
///
/// Metrics must not depend on wall-clock time or unordered iteration.
/// Names are static so the set of series is known at compile time; sorted maps
/// keep snapshots stable.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    counters: BTreeMap<&'static str, u64>,
    gauges: BTreeMap<&'static str, i64>,
    histograms: BTreeMap<&'static str, Histogram>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Histogram {
    pub count: u64,
    pub sum: i64,
    pub min: i64,
    pub max: i64,
}

impl Histogram {
    pub fn record(&mut self, value: i64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn inc(&mut self, name: &'static str) {
        self.add(name, 1);
    }

    pub fn add(&mut self, name: &'static str, by: u64) {
        *self.counters.entry(name).or_insert(0) += by;
    }

    pub fn gauge(&self, name: &str) -> Option<i64> {
        self.gauges.get(name).copied()
    }

    pub fn set_gauge(&mut self, name: &'static str, value: i64) {
        self.gauges.insert(name, value);
    }

    pub fn record(&mut self, name: &'static str, value: i64) {
        self.histograms.entry(name).or_default().record(value);
    }

    pub fn histogram(&self, name: &str) -> Option<Histogram> {
        self.histograms.get(name).copied()
    }

    /// Sorted `name=value` lines, for logs and the CLI.
    pub fn report(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        out.extend(self.counters.iter().map(|(k, v)| format!("{k}={v}")));
        out.extend(self.gauges.iter().map(|(k, v)| format!("{k}={v}")));
        out.extend(self.histograms.iter().map(|(k, h)| {
            format!("{k}: count={} sum={} min={} max={}", h.count, h.sum, h.min, h.max)
        }));
        out
    }
}
