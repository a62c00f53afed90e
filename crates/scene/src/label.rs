use catalog::{Category, Point};

use crate::policy::DistanceRange;

/// 8-bit RGBA.
pub type Rgba = [u8; 4];

/// Label background per category.
pub const fn category_color(category: Category) -> Rgba {
    match category {
        Category::Peak => [218, 218, 255, 190],
        Category::Settlement => [253, 246, 228, 190],
        Category::WaterBody => [69, 127, 176, 190],
    }
}

/// Linear interpolation of a value between two camera distances.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NearFarScalar {
    pub near_m: f64,
    pub near_value: f64,
    pub far_m: f64,
    pub far_value: f64,
}

/// Scale applied to category labels.
pub const CATEGORY_LABEL_SCALE: NearFarScalar = NearFarScalar {
    near_m: 100.0,
    near_value: 1.5,
    far_m: 20_000.0,
    far_value: 0.4,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LabelMode {
    /// Name only, scaled and limited by the display-distance range.
    Category,
    /// Temporary enriched label without distance scaling.
    Inspected,
}

/// Everything the renderer needs to draw one point label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSpec {
    pub text: String,
    pub background: Rgba,
    pub scale_by_distance: Option<NearFarScalar>,
    pub distance_condition: Option<DistanceRange>,
}

impl LabelSpec {
    pub fn category(point: &Point, range: DistanceRange) -> Self {
        Self {
            text: point.name().to_string(),
            background: category_color(point.category()),
            scale_by_distance: Some(CATEGORY_LABEL_SCALE),
            distance_condition: Some(range),
        }
    }

    pub fn inspected(point: &Point, elevation_m: Option<f64>) -> Self {
        Self {
            text: inspected_text(point.name(), elevation_m),
            background: category_color(point.category()),
            scale_by_distance: None,
            distance_condition: None,
        }
    }
}

/// `"{name}\n{elevation} m"`, or just the name when elevation is unknown.
pub fn inspected_text(name: &str, elevation_m: Option<f64>) -> String {
    match elevation_m.filter(|e| e.is_finite()) {
        Some(e) => format!("{name}\n{e:.0} m"),
        None => name.to_string(),
    }
}
