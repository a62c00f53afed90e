use async_trait::async_trait;
use foundation::math::GeoPoint;

/// Position on the rendered canvas, in CSS pixels from the top-left corner.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScreenPos {
    pub x: f64,
    pub y: f64,
}

impl ScreenPos {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, by: [f64; 2]) -> Self {
        Self {
            x: self.x + by[0],
            y: self.y + by[1],
        }
    }
}

/// Terrain height lookup. `None` when the terrain has no sample for the point.
#[async_trait]
pub trait ElevationProvider: Send + Sync {
    async fn elevation(&self, at: GeoPoint) -> Option<f64>;
}

/// Screen-to-map picking. `None` when the position does not hit the globe.
#[async_trait]
pub trait CoordinateResolver: Send + Sync {
    async fn screen_to_geo(&self, pos: ScreenPos) -> Option<GeoPoint>;
}

#[async_trait]
impl<F> ElevationProvider for F
where
    F: Fn(GeoPoint) -> Option<f64> + Send + Sync,
{
    async fn elevation(&self, at: GeoPoint) -> Option<f64> {
        self(at)
    }
}

#[async_trait]
impl<F> CoordinateResolver for F
where
    F: Fn(ScreenPos) -> Option<GeoPoint> + Send + Sync,
{
    async fn screen_to_geo(&self, pos: ScreenPos) -> Option<GeoPoint> {
        self(pos)
    }
}
