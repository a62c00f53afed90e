//! Precision policies.
//!
//! - Deterministic float ordering for sorting and keys.
//! - Fixed-decimal coordinate quantization used to decide whether two
//!   positions are "the same place".

use core::cmp::Ordering;

use super::GeoPoint;

/// Decimal places used when comparing coordinates (~0.1 m at the equator).
pub const COORDINATE_DECIMALS: i32 = 6;

/// Canonicalize a floating-point value for deterministic ordering.
///
/// Rules:
/// - `-0.0` becomes `0.0`
/// - all NaNs become a single canonical NaN
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        // Handles +0.0 and -0.0.
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Deterministic total ordering for floats.
///
/// Prefer this any time you sort floats or use them in ordered keys.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}

/// Round a degree value to [`COORDINATE_DECIMALS`] places as an integer key.
pub fn quantize_deg(v: f64) -> i64 {
    let scale = 10f64.powi(COORDINATE_DECIMALS);
    (canonical_f64(v) * scale).round() as i64
}

/// Two positions compare equal when both axes agree at [`COORDINATE_DECIMALS`].
pub fn same_position(a: GeoPoint, b: GeoPoint) -> bool {
    quantize_deg(a.lat_deg) == quantize_deg(b.lat_deg)
        && quantize_deg(a.lon_deg) == quantize_deg(b.lon_deg)
}
