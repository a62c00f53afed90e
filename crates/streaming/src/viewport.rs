use std::collections::BTreeSet;
use std::sync::Arc;

use catalog::{PointCatalog, PointId};
use foundation::math::{GeoPoint, same_position};
use runtime::metrics::{
    Metrics, VIEWPORT_ACTIVATED, VIEWPORT_DEACTIVATED, VIEWPORT_RADIUS_QUERIES, VIEWPORT_UNCHANGED,
};
use tracing::debug;

/// Camera position the working set was last computed for.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewportState {
    pub center: GeoPoint,
    pub radius_km: f64,
}

/// Points entering and leaving the working set after a camera move.
///
/// Both sets are ordered so batches are applied in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewportDelta {
    pub to_activate: BTreeSet<PointId>,
    pub to_deactivate: BTreeSet<PointId>,
}

impl ViewportDelta {
    pub fn is_empty(&self) -> bool {
        self.to_activate.is_empty() && self.to_deactivate.is_empty()
    }
}

/// Tracks the viewport center and turns camera moves into working-set deltas.
#[derive(Debug)]
pub struct ViewportTracker {
    catalog: Arc<PointCatalog>,
    state: ViewportState,
}

impl ViewportTracker {
    pub fn new(catalog: Arc<PointCatalog>, initial_center: GeoPoint, radius_km: f64) -> Self {
        Self {
            catalog,
            state: ViewportState {
                center: initial_center,
                radius_km,
            },
        }
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    /// Working set for the current center.
    pub fn initial_working_set(&self, metrics: &mut Metrics) -> BTreeSet<PointId> {
        self.query(self.state.center, self.state.radius_km, metrics)
    }

    /// Set differences between the proximity sets of `old` and `new`.
    ///
    /// Both sets come from full radius queries. Centers that agree at the
    /// coordinate precision produce an empty delta without touching the index.
    pub fn delta(
        &self,
        old: GeoPoint,
        new: GeoPoint,
        radius_km: f64,
        metrics: &mut Metrics,
    ) -> ViewportDelta {
        if same_position(old, new) {
            metrics.inc(VIEWPORT_UNCHANGED);
            return ViewportDelta::default();
        }

        let old_set = self.query(old, radius_km, metrics);
        let new_set = self.query(new, radius_km, metrics);

        let delta = ViewportDelta {
            to_activate: new_set.difference(&old_set).cloned().collect(),
            to_deactivate: old_set.difference(&new_set).cloned().collect(),
        };
        metrics.record(VIEWPORT_ACTIVATED, delta.to_activate.len() as i64);
        metrics.record(VIEWPORT_DEACTIVATED, delta.to_deactivate.len() as i64);
        debug!(
            activate = delta.to_activate.len(),
            deactivate = delta.to_deactivate.len(),
            "viewport delta"
        );
        delta
    }

    /// Move to `new_center` and return the delta from the previous center.
    pub fn settle(&mut self, new_center: GeoPoint, metrics: &mut Metrics) -> ViewportDelta {
        let delta = self.delta(self.state.center, new_center, self.state.radius_km, metrics);
        if !same_position(self.state.center, new_center) {
            self.state.center = new_center;
        }
        delta
    }

    fn query(&self, center: GeoPoint, radius_km: f64, metrics: &mut Metrics) -> BTreeSet<PointId> {
        metrics.inc(VIEWPORT_RADIUS_QUERIES);
        self.catalog.query_radius(center, radius_km)
    }
}

#[cfg(test)]
mod tests {
    use super::{ViewportDelta, ViewportTracker};
    use catalog::{Point, PointCatalog, PointId};
    use foundation::math::GeoPoint;
    use pretty_assertions::assert_eq;
    use runtime::metrics::{Metrics, VIEWPORT_RADIUS_QUERIES};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn three_points() -> Arc<PointCatalog> {
        let (catalog, _) = PointCatalog::build(vec![
            Point::new("C:1", "Peak one", 43.0, -4.0).unwrap(),
            Point::new("P:1", "Village one", 43.01, -4.0).unwrap(),
            Point::new("A:1", "Lake one", 50.0, 3.0).unwrap(),
        ]);
        Arc::new(catalog)
    }

    fn ids(list: &[&str]) -> BTreeSet<PointId> {
        list.iter().map(|s| PointId::from(*s)).collect()
    }

    #[test]
    fn initial_working_set_is_radius_query() {
        let tracker = ViewportTracker::new(three_points(), GeoPoint::new(43.0, -4.0), 5.0);
        let mut m = Metrics::new();
        assert_eq!(tracker.initial_working_set(&mut m), ids(&["C:1", "P:1"]));
        assert_eq!(m.counter(VIEWPORT_RADIUS_QUERIES), 1);
    }

    #[test]
    fn moving_far_swaps_the_working_set() {
        let mut tracker = ViewportTracker::new(three_points(), GeoPoint::new(43.0, -4.0), 5.0);
        let mut m = Metrics::new();

        let delta = tracker.settle(GeoPoint::new(50.0, 3.0), &mut m);
        assert_eq!(
            delta,
            ViewportDelta {
                to_activate: ids(&["A:1"]),
                to_deactivate: ids(&["C:1", "P:1"]),
            }
        );
        assert_eq!(tracker.state().center, GeoPoint::new(50.0, 3.0));
        assert_eq!(m.counter(VIEWPORT_RADIUS_QUERIES), 2);
    }

    #[test]
    fn same_center_issues_no_queries() {
        let mut tracker = ViewportTracker::new(three_points(), GeoPoint::new(43.0, -4.0), 5.0);
        let mut m = Metrics::new();

        let delta = tracker.settle(GeoPoint::new(43.000_000_1, -4.000_000_2), &mut m);
        assert!(delta.is_empty());
        assert_eq!(m.counter(VIEWPORT_RADIUS_QUERIES), 0);
        assert_eq!(tracker.state().center, GeoPoint::new(43.0, -4.0));
    }

    #[test]
    fn delta_is_the_set_difference_of_both_queries() {
        let mut points = Vec::new();
        for i in 0..30 {
            for j in 0..30 {
                let id = format!("{}{}", ["C:", "P:", "A:"][(i + j) % 3], i * 30 + j);
                points.push(
                    Point::new(id, "p", 42.8 + i as f64 * 0.02, -4.3 + j as f64 * 0.02).unwrap(),
                );
            }
        }
        let (catalog, _) = PointCatalog::build(points);
        let catalog = Arc::new(catalog);
        let tracker = ViewportTracker::new(catalog.clone(), GeoPoint::new(43.0, -4.0), 10.0);
        let mut m = Metrics::new();

        let centers = [
            GeoPoint::new(43.0, -4.0),
            GeoPoint::new(43.05, -4.1),
            GeoPoint::new(43.2, -3.8),
            GeoPoint::new(44.0, -4.0),
        ];
        for a in centers {
            for b in centers {
                let delta = tracker.delta(a, b, 10.0, &mut m);
                let old = catalog.query_radius(a, 10.0);
                let new = catalog.query_radius(b, 10.0);
                let activate: BTreeSet<PointId> = new.difference(&old).cloned().collect();
                let deactivate: BTreeSet<PointId> = old.difference(&new).cloned().collect();
                assert_eq!(delta.to_activate, activate);
                assert_eq!(delta.to_deactivate, deactivate);
            }
        }
    }
}
