use std::time::Duration;

use catalog::PointId;
use foundation::math::GeoPoint;
use runtime::timer::{TimerHandle, send_after};
use scene::{EntityStateStore, PromoteOutcome, Renderer, VisibilityPolicy};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::config::ViewerConfig;
use crate::providers::{CoordinateResolver, ScreenPos};
use crate::service::ViewerEvent;

/// Identifies the entity an in-flight lookup was started for.
///
/// A result is applied only while the entity still carries `epoch`.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectTicket {
    pub point_id: PointId,
    pub epoch: u64,
    pub position: GeoPoint,
}

/// Probe handling: find the point under the cursor, show it with an enriched
/// label, and hide it again after a delay.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct InspectionController {
    probe_radius_km: f64,
    attempts: u32,
    step_px: [f64; 2],
    revert_delay: Duration,
}

impl InspectionController {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            probe_radius_km: config.probe_radius_km,
            attempts: config.probe_attempts.max(1),
            step_px: config.probe_offset_px,
            revert_delay: config.revert_delay(),
        }
    }

    pub fn revert_delay(&self) -> Duration {
        self.revert_delay
    }

    /// Resolve `pos` to a map coordinate, stepping the position by the
    /// configured offset after each miss.
    pub async fn locate(&self, resolver: &dyn CoordinateResolver, pos: ScreenPos) -> Option<GeoPoint> {
        let mut at = pos;
        for attempt in 0..self.attempts {
            if let Some(geo) = resolver.screen_to_geo(at).await {
                debug!(attempt, lat = geo.lat_deg, lon = geo.lon_deg, "probe resolved");
                return Some(geo);
            }
            at = at.offset(self.step_px);
        }
        debug!(attempts = self.attempts, x = pos.x, y = pos.y, "probe missed the globe");
        None
    }

    /// The materialized, hidden point nearest to `at`, if any lies within the
    /// probe radius.
    pub fn candidate<R: Renderer>(
        &self,
        store: &EntityStateStore<R>,
        at: GeoPoint,
    ) -> Option<InspectTicket> {
        let id = store.catalog().query_nearest(at, self.probe_radius_km)?;
        let state = store.get(id.as_str())?;
        if state.visible() {
            debug!(%id, "probe hit a visible point");
            return None;
        }
        let position = store.catalog().get(id.as_str())?.position();
        Some(InspectTicket {
            point_id: id,
            epoch: state.epoch(),
            position,
        })
    }

    /// Promote the ticket's entity and arm its revert timer on `events`.
    ///
    /// Must run inside a tokio runtime.
    pub fn promote<R: Renderer>(
        &self,
        store: &mut EntityStateStore<R>,
        ticket: &InspectTicket,
        elevation_m: Option<f64>,
        events: &UnboundedSender<ViewerEvent>,
    ) -> PromoteOutcome {
        let delay = self.revert_delay;
        let point_id = ticket.point_id.clone();
        let events = events.clone();
        store.promote(&ticket.point_id, ticket.epoch, elevation_m, move |generation| {
            let fire = ViewerEvent::RevertDue {
                point_id,
                generation,
            };
            Box::new(send_after(delay, events, fire)) as Box<dyn TimerHandle>
        })
    }

    pub fn revert<R: Renderer>(
        &self,
        store: &mut EntityStateStore<R>,
        point_id: &PointId,
        generation: u64,
        policy: &VisibilityPolicy,
    ) -> bool {
        store.revert(point_id, generation, policy)
    }
}
