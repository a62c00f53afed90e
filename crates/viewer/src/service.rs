use std::sync::Arc;

use catalog::{Category, PointCatalog, PointId};
use foundation::math::GeoPoint;
use runtime::metrics::{
    INSPECTION_PROMOTED, INSPECTION_REVERTED, INSPECTION_STALE_DISCARDED, Metrics,
    STORE_MATERIALIZED, STORE_RENDER_FAILURES,
};
use scene::{
    BatchReport, DistanceRange, EntityStateStore, PromoteOutcome, Renderer, VisibilityPolicy,
};
use streaming::ViewportTracker;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use crate::config::ViewerConfig;
use crate::inspection::{InspectTicket, InspectionController};
use crate::providers::{CoordinateResolver, ElevationProvider, ScreenPos};

/// Everything the viewer reacts to. User input and the completions of its
/// own background lookups arrive on the same channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    CameraSettled(GeoPoint),
    Probe(ScreenPos),
    SetCategoryVisibility { category: Category, visible: bool },
    SetDisplayDistanceRange(DistanceRange),
    ProbeLocated(GeoPoint),
    ElevationReady {
        ticket: InspectTicket,
        elevation_m: Option<f64>,
    },
    RevertDue { point_id: PointId, generation: u64 },
    Shutdown,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// The viewer's application context.
///
/// Events are handled one at a time, so handlers never race each other.
/// Anything asynchronous is spawned and reports back as another event.
pub struct Viewer<R> {
    tracker: ViewportTracker,
    store: EntityStateStore<R>,
    policy: VisibilityPolicy,
    inspection: InspectionController,
    metrics: Metrics,
    resolver: Arc<dyn CoordinateResolver>,
    elevation: Arc<dyn ElevationProvider>,
    events_tx: UnboundedSender<ViewerEvent>,
    events_rx: UnboundedReceiver<ViewerEvent>,
}

impl<R: Renderer> Viewer<R> {
    pub fn new(
        catalog: Arc<PointCatalog>,
        renderer: R,
        config: &ViewerConfig,
        resolver: Arc<dyn CoordinateResolver>,
        elevation: Arc<dyn ElevationProvider>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            tracker: ViewportTracker::new(
                catalog.clone(),
                config.initial_center(),
                config.load_radius_km,
            ),
            store: EntityStateStore::new(catalog, renderer),
            policy: config.visibility_policy(),
            inspection: InspectionController::new(config),
            metrics: Metrics::new(),
            resolver,
            elevation,
            events_tx,
            events_rx,
        }
    }

    /// Sender for feeding user events into the viewer.
    pub fn sender(&self) -> UnboundedSender<ViewerEvent> {
        self.events_tx.clone()
    }

    pub fn store(&self) -> &EntityStateStore<R> {
        &self.store
    }

    pub fn policy(&self) -> &VisibilityPolicy {
        &self.policy
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn tracker(&self) -> &ViewportTracker {
        &self.tracker
    }

    /// Materialize the working set around the initial center.
    pub fn start(&mut self) -> BatchReport {
        let working_set = self.tracker.initial_working_set(&mut self.metrics);
        let report = self
            .store
            .apply_delta(&Default::default(), &working_set, &self.policy);
        self.record_batch(report);
        info!(
            points = report.materialized,
            failed = report.failed,
            center = ?self.tracker.state().center,
            "initial working set materialized"
        );
        report
    }

    /// Process events until `Shutdown`.
    pub async fn run(&mut self) {
        while self.step().await == Flow::Continue {}
    }

    /// Wait for and handle the next event.
    pub async fn step(&mut self) -> Flow {
        match self.events_rx.recv().await {
            Some(event) => self.handle(event),
            None => Flow::Stop,
        }
    }

    /// Handle an event if one is already queued.
    pub fn try_step(&mut self) -> Option<Flow> {
        let event = self.events_rx.try_recv().ok()?;
        Some(self.handle(event))
    }

    /// Apply one event. Must run inside a tokio runtime.
    pub fn handle(&mut self, event: ViewerEvent) -> Flow {
        match event {
            ViewerEvent::CameraSettled(center) => self.on_camera_settled(center),
            ViewerEvent::Probe(pos) => self.on_probe(pos),
            ViewerEvent::SetCategoryVisibility { category, visible } => {
                self.policy.set_shown(category, visible);
                let touched = self.store.set_category_visibility(category, visible);
                debug!(%category, visible, touched, "category visibility changed");
            }
            ViewerEvent::SetDisplayDistanceRange(range) => {
                self.policy.set_distance_range(range);
                let touched = self.store.set_display_distance_range(range);
                debug!(min_m = range.min_m, max_m = range.max_m, touched, "distance range changed");
            }
            ViewerEvent::ProbeLocated(at) => self.on_probe_located(at),
            ViewerEvent::ElevationReady {
                ticket,
                elevation_m,
            } => self.on_elevation_ready(&ticket, elevation_m),
            ViewerEvent::RevertDue {
                point_id,
                generation,
            } => self.on_revert_due(&point_id, generation),
            ViewerEvent::Shutdown => return Flow::Stop,
        }
        Flow::Continue
    }

    fn on_camera_settled(&mut self, center: GeoPoint) {
        let delta = self.tracker.settle(center, &mut self.metrics);
        if delta.is_empty() {
            return;
        }
        let report = self
            .store
            .apply_delta(&delta.to_deactivate, &delta.to_activate, &self.policy);
        self.record_batch(report);
    }

    fn on_probe(&mut self, pos: ScreenPos) {
        let resolver = self.resolver.clone();
        let inspection = self.inspection;
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            if let Some(at) = inspection.locate(resolver.as_ref(), pos).await {
                let _ = events.send(ViewerEvent::ProbeLocated(at));
            }
        });
    }

    fn on_probe_located(&mut self, at: GeoPoint) {
        let Some(ticket) = self.inspection.candidate(&self.store, at) else {
            return;
        };
        let elevation = self.elevation.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let elevation_m = elevation.elevation(ticket.position).await;
            let _ = events.send(ViewerEvent::ElevationReady {
                ticket,
                elevation_m,
            });
        });
    }

    fn on_elevation_ready(&mut self, ticket: &InspectTicket, elevation_m: Option<f64>) {
        match self
            .inspection
            .promote(&mut self.store, ticket, elevation_m, &self.events_tx)
        {
            PromoteOutcome::Promoted { generation } => {
                self.metrics.inc(INSPECTION_PROMOTED);
                debug!(id = %ticket.point_id, generation, ?elevation_m, "point inspected");
            }
            PromoteOutcome::AlreadyVisible => {
                debug!(id = %ticket.point_id, "inspection skipped, point already visible");
            }
            PromoteOutcome::Stale => {
                self.metrics.inc(INSPECTION_STALE_DISCARDED);
                debug!(id = %ticket.point_id, epoch = ticket.epoch, "stale elevation result discarded");
            }
        }
    }

    fn on_revert_due(&mut self, point_id: &PointId, generation: u64) {
        if self
            .inspection
            .revert(&mut self.store, point_id, generation, &self.policy)
        {
            self.metrics.inc(INSPECTION_REVERTED);
        } else {
            self.metrics.inc(INSPECTION_STALE_DISCARDED);
            debug!(id = %point_id, generation, "stale revert discarded");
        }
    }

    fn record_batch(&mut self, report: BatchReport) {
        self.metrics.add(STORE_RENDER_FAILURES, report.failed as u64);
        self.metrics
            .set_gauge(STORE_MATERIALIZED, self.store.len() as i64);
    }
}
