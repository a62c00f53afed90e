/// Axis-aligned lon/lat box in degrees (`[lon, lat]` corners, inclusive).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeoBox {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl GeoBox {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        GeoBox { min, max }
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min[0] && lon <= self.max[0] && lat >= self.min[1] && lat <= self.max[1]
    }
}
