use std::collections::BTreeMap;

use catalog::Category;

/// Camera-distance window (meters) inside which category labels are drawn.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DistanceRange {
    pub min_m: f64,
    pub max_m: f64,
}

impl DistanceRange {
    /// Labels never fade in closer than this.
    pub const MIN_FLOOR_M: f64 = 10.0;

    /// Build a range from two slider values in kilometers, in either order.
    pub fn from_km_sliders(a_km: f64, b_km: f64) -> Self {
        let (lo, hi) = if a_km <= b_km { (a_km, b_km) } else { (b_km, a_km) };
        Self {
            min_m: (lo * 1000.0).max(Self::MIN_FLOOR_M),
            max_m: hi * 1000.0,
        }
    }
}

impl Default for DistanceRange {
    fn default() -> Self {
        Self {
            min_m: Self::MIN_FLOOR_M,
            max_m: 20_000.0,
        }
    }
}

/// User-controlled presentation policy: which categories are shown and the
/// distance window for their labels.
///
/// Defaults to every category hidden.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityPolicy {
    shown: BTreeMap<Category, bool>,
    distance_range: DistanceRange,
}

impl VisibilityPolicy {
    pub fn new(distance_range: DistanceRange) -> Self {
        Self {
            shown: Category::ALL.into_iter().map(|c| (c, false)).collect(),
            distance_range,
        }
    }

    pub fn shows(&self, category: Category) -> bool {
        self.shown.get(&category).copied().unwrap_or(false)
    }

    pub fn set_shown(&mut self, category: Category, shown: bool) {
        self.shown.insert(category, shown);
    }

    pub fn with_shown(mut self, category: Category, shown: bool) -> Self {
        self.set_shown(category, shown);
        self
    }

    pub fn distance_range(&self) -> DistanceRange {
        self.distance_range
    }

    pub fn set_distance_range(&mut self, range: DistanceRange) {
        self.distance_range = range;
    }
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self::new(DistanceRange::default())
    }
}
