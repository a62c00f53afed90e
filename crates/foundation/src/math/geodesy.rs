use crate::bounds::GeoBox;

/// Mean Earth radius (IUGG, kilometers).
pub const MEAN_EARTH_RADIUS_KM: f64 = 6_371.008_8;

/// Geographic coordinates in degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeoPoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

impl GeoPoint {
    pub fn new(lat_deg: f64, lon_deg: f64) -> Self {
        Self { lat_deg, lon_deg }
    }

    /// Finite and inside `[-90, 90] x [-180, 180]`.
    pub fn is_valid(&self) -> bool {
        self.lat_deg.is_finite()
            && self.lon_deg.is_finite()
            && (-90.0..=90.0).contains(&self.lat_deg)
            && (-180.0..=180.0).contains(&self.lon_deg)
    }
}

/// Great-circle distance on a spherical Earth (haversine).
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat_deg.to_radians();
    let lat2 = b.lat_deg.to_radians();
    let dlat = lat2 - lat1;
    let dlon = b.lon_deg.to_radians() - a.lon_deg.to_radians();

    let s_lat = (dlat * 0.5).sin();
    let s_lon = (dlon * 0.5).sin();
    let h = s_lat * s_lat + lat1.cos() * lat2.cos() * s_lon * s_lon;

    2.0 * MEAN_EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Lon/lat boxes covering every point within `radius_km` of `center`.
///
/// The boxes are conservative: callers must still filter with
/// [`haversine_km`]. A circle crossing the antimeridian yields two boxes; a
/// circle reaching a pole spans the full longitude range.
pub fn radius_boxes(center: GeoPoint, radius_km: f64) -> Vec<GeoBox> {
    let radius_km = radius_km.max(0.0);
    let angular = radius_km / MEAN_EARTH_RADIUS_KM;
    let dlat = angular.to_degrees();

    let min_lat = center.lat_deg - dlat;
    let max_lat = center.lat_deg + dlat;

    if min_lat <= -90.0 || max_lat >= 90.0 || angular >= std::f64::consts::FRAC_PI_2 {
        return vec![GeoBox::new(
            [-180.0, min_lat.max(-90.0)],
            [180.0, max_lat.min(90.0)],
        )];
    }

    let ratio = angular.sin() / center.lat_deg.to_radians().cos();
    if ratio >= 1.0 {
        return vec![GeoBox::new([-180.0, min_lat], [180.0, max_lat])];
    }
    let dlon = ratio.asin().to_degrees();

    let min_lon = center.lon_deg - dlon;
    let max_lon = center.lon_deg + dlon;

    if min_lon < -180.0 {
        vec![
            GeoBox::new([min_lon + 360.0, min_lat], [180.0, max_lat]),
            GeoBox::new([-180.0, min_lat], [max_lon, max_lat]),
        ]
    } else if max_lon > 180.0 {
        vec![
            GeoBox::new([min_lon, min_lat], [180.0, max_lat]),
            GeoBox::new([-180.0, min_lat], [max_lon - 360.0, max_lat]),
        ]
    } else {
        vec![GeoBox::new([min_lon, min_lat], [max_lon, max_lat])]
    }
}
