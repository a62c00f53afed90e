use std::collections::{BTreeMap, BTreeSet, HashMap};

use foundation::math::GeoPoint;
use tracing::{info, warn};

use crate::error::RecordError;
use crate::point::{Category, Point, PointId};
use crate::spatial::SpatialIndex;

/// Canonical point records plus the spatial index built over them.
///
/// Immutable once built; share it as `Arc<PointCatalog>`.
#[derive(Debug)]
pub struct PointCatalog {
    points: Vec<Point>,
    by_id: HashMap<PointId, usize>,
    index: SpatialIndex,
}

impl PointCatalog {
    /// Build the catalog. Duplicate ids keep their first occurrence and are
    /// reported back as rejected.
    pub fn build(points: Vec<Point>) -> (Self, Vec<RecordError>) {
        let mut kept: Vec<Point> = Vec::with_capacity(points.len());
        let mut by_id: HashMap<PointId, usize> = HashMap::with_capacity(points.len());
        let mut rejected = Vec::new();

        for point in points {
            if by_id.contains_key(point.id()) {
                warn!(id = %point.id(), "duplicate point id, keeping first occurrence");
                rejected.push(RecordError::DuplicateId(point.id().to_string()));
                continue;
            }
            by_id.insert(point.id().clone(), kept.len());
            kept.push(point);
        }

        let positions: Vec<GeoPoint> = kept.iter().map(Point::position).collect();
        let index = SpatialIndex::build(&positions);
        info!(points = kept.len(), "point catalog built");

        (
            Self {
                points: kept,
                by_id,
                index,
            },
            rejected,
        )
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Point> {
        self.by_id.get(id).map(|&i| &self.points[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Ids of every point within `radius_km` of `center`.
    pub fn query_radius(&self, center: GeoPoint, radius_km: f64) -> BTreeSet<PointId> {
        self.index
            .within(center, radius_km)
            .into_iter()
            .map(|(i, _)| self.points[i].id().clone())
            .collect()
    }

    /// Closest point within `max_radius_km`; ties go to catalog order.
    pub fn query_nearest(&self, center: GeoPoint, max_radius_km: f64) -> Option<PointId> {
        self.index
            .nearest(center, max_radius_km)
            .map(|(i, _)| self.points[i].id().clone())
    }

    /// Up to `k` closest points within `max_radius_km`, nearest first.
    pub fn k_nearest(&self, center: GeoPoint, k: usize, max_radius_km: f64) -> Vec<(PointId, f64)> {
        self.index
            .k_nearest(center, k, max_radius_km)
            .into_iter()
            .map(|(i, d)| (self.points[i].id().clone(), d))
            .collect()
    }

    pub fn count_by_category(&self) -> BTreeMap<Category, usize> {
        let mut out: BTreeMap<Category, usize> = Category::ALL.into_iter().map(|c| (c, 0)).collect();
        for p in &self.points {
            *out.entry(p.category()).or_insert(0) += 1;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::PointCatalog;
    use crate::error::RecordError;
    use crate::point::{Category, Point, PointId};
    use foundation::math::GeoPoint;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn three_points() -> PointCatalog {
        let (catalog, rejected) = PointCatalog::build(vec![
            Point::new("C:1", "Peak one", 43.0, -4.0).unwrap(),
            Point::new("P:1", "Village one", 43.01, -4.0).unwrap(),
            Point::new("A:1", "Lake one", 50.0, 3.0).unwrap(),
        ]);
        assert!(rejected.is_empty());
        catalog
    }

    fn ids(list: &[&str]) -> BTreeSet<PointId> {
        list.iter().map(|s| PointId::from(*s)).collect()
    }

    #[test]
    fn radius_query_returns_nearby_ids() {
        let catalog = three_points();
        assert_eq!(
            catalog.query_radius(GeoPoint::new(43.0, -4.0), 5.0),
            ids(&["C:1", "P:1"])
        );
        assert_eq!(catalog.query_radius(GeoPoint::new(50.0, 3.0), 5.0), ids(&["A:1"]));
    }

    #[test]
    fn nearest_picks_smaller_great_circle_distance() {
        let catalog = three_points();
        // P:1 is 0.55597540116692 km away, C:1 is 0.55597540116763 km away.
        assert_eq!(
            catalog.query_nearest(GeoPoint::new(43.005, -4.0), 1.0),
            Some(PointId::from("P:1"))
        );
        assert_eq!(catalog.query_nearest(GeoPoint::new(45.0, 0.0), 1.0), None);
    }

    #[test]
    fn lookups_by_id() {
        let catalog = three_points();
        assert_eq!(catalog.get("P:1").map(|p| p.category()), Some(Category::Settlement));
        assert!(catalog.get("P:2").is_none());
        assert!(catalog.contains("A:1"));
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let (catalog, rejected) = PointCatalog::build(vec![
            Point::new("C:1", "first", 43.0, -4.0).unwrap(),
            Point::new("C:1", "second", 44.0, -4.0).unwrap(),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("C:1").map(|p| p.name()), Some("first"));
        assert_eq!(rejected, vec![RecordError::DuplicateId("C:1".to_string())]);
    }

    #[test]
    fn counts_every_category() {
        let catalog = three_points();
        let counts = catalog.count_by_category();
        assert_eq!(counts.values().copied().collect::<Vec<_>>(), vec![1, 1, 1]);
    }
}
