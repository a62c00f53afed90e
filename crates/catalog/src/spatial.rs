use foundation::bounds::GeoBox;
use foundation::math::precision::stable_total_cmp_f64;
use foundation::math::{GeoPoint, haversine_km, radius_boxes};

/// A static, balanced k-d tree over `(lon, lat)` pairs.
///
/// Items are stored in an implicit layout: the median of every range sits at
/// its middle slot, the lower half to its left and the upper half to its right.
/// Splitting alternates between longitude (even depth) and latitude (odd depth).
///
/// Ordering contract:
/// - `within` returns slot indices of the source slice in ascending order.
/// - `nearest` breaks distance ties by the lower source index.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    items: Vec<Item>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct Item {
    index: usize,
    coord: [f64; 2],
}

const LEAF_MAX: usize = 8;

impl SpatialIndex {
    pub fn build(positions: &[GeoPoint]) -> Self {
        let mut items: Vec<Item> = positions
            .iter()
            .enumerate()
            .map(|(index, p)| Item {
                index,
                coord: [p.lon_deg, p.lat_deg],
            })
            .collect();
        sort_kd(&mut items, 0);
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Source indices of every item within `radius_km` (great-circle) of
    /// `center`, paired with their distance. Ascending by index.
    pub fn within(&self, center: GeoPoint, radius_km: f64) -> Vec<(usize, f64)> {
        if self.items.is_empty() || !radius_km.is_finite() || radius_km < 0.0 {
            return Vec::new();
        }

        let mut candidates: Vec<usize> = Vec::new();
        for query in radius_boxes(center, radius_km) {
            self.range(&query, &mut candidates);
        }
        candidates.sort_unstable();
        candidates.dedup();

        let mut hits: Vec<(usize, f64)> = candidates
            .into_iter()
            .filter_map(|slot| {
                let item = self.items[slot];
                let d = haversine_km(center, GeoPoint::new(item.coord[1], item.coord[0]));
                (d <= radius_km).then_some((item.index, d))
            })
            .collect();
        // Slots follow tree layout; report in source order instead.
        hits.sort_unstable_by_key(|(index, _)| *index);
        hits
    }

    /// Up to `k` closest items within `max_radius_km`, ascending by distance.
    pub fn k_nearest(&self, center: GeoPoint, k: usize, max_radius_km: f64) -> Vec<(usize, f64)> {
        let mut hits = self.within(center, max_radius_km);
        hits.sort_by(|(ia, da), (ib, db)| stable_total_cmp_f64(*da, *db).then_with(|| ia.cmp(ib)));
        hits.truncate(k);
        hits
    }

    /// The single closest item within `max_radius_km`, if any.
    pub fn nearest(&self, center: GeoPoint, max_radius_km: f64) -> Option<(usize, f64)> {
        self.k_nearest(center, 1, max_radius_km).into_iter().next()
    }

    /// Collect tree slots whose coordinates fall inside `query`.
    fn range(&self, query: &GeoBox, hits: &mut Vec<usize>) {
        let mut stack: Vec<(usize, usize, usize)> = vec![(0, self.items.len(), 0)];

        while let Some((lo, hi, axis)) = stack.pop() {
            if hi - lo <= LEAF_MAX {
                for slot in lo..hi {
                    let c = self.items[slot].coord;
                    if query.contains(c[0], c[1]) {
                        hits.push(slot);
                    }
                }
                continue;
            }

            let mid = lo + (hi - lo) / 2;
            let c = self.items[mid].coord;
            if query.contains(c[0], c[1]) {
                hits.push(mid);
            }

            let next_axis = 1 - axis;
            if query.min[axis] <= c[axis] {
                stack.push((lo, mid, next_axis));
            }
            if query.max[axis] >= c[axis] {
                stack.push((mid + 1, hi, next_axis));
            }
        }
    }
}

fn sort_kd(items: &mut [Item], axis: usize) {
    if items.len() <= LEAF_MAX {
        return;
    }

    let mid = items.len() / 2;
    items.select_nth_unstable_by(mid, |a, b| {
        stable_total_cmp_f64(a.coord[axis], b.coord[axis]).then_with(|| a.index.cmp(&b.index))
    });

    let (left, rest) = items.split_at_mut(mid);
    sort_kd(left, 1 - axis);
    sort_kd(&mut rest[1..], 1 - axis);
}
