use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use catalog::{Category, PointCatalog, PointId};
use runtime::timer::TimerHandle;
use tracing::{debug, warn};

use crate::label::{LabelMode, LabelSpec};
use crate::policy::{DistanceRange, VisibilityPolicy};
use crate::renderer::{RenderError, RenderHandle, Renderer};

/// Revert timer owned by an inspected entity.
#[derive(Debug)]
pub struct PendingRevert {
    generation: u64,
    timer: Box<dyn TimerHandle>,
}

/// Runtime state of one materialized point.
#[derive(Debug)]
pub struct EntityRuntimeState {
    category: Category,
    visible: bool,
    label_mode: LabelMode,
    label: LabelSpec,
    render_handle: RenderHandle,
    epoch: u64,
    pending_revert: Option<PendingRevert>,
}

impl EntityRuntimeState {
    pub fn category(&self) -> Category {
        self.category
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn label_mode(&self) -> LabelMode {
        self.label_mode
    }

    /// The label as last sent to the renderer.
    pub fn label(&self) -> &LabelSpec {
        &self.label
    }

    pub fn render_handle(&self) -> RenderHandle {
        self.render_handle
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn pending_revert_generation(&self) -> Option<u64> {
        self.pending_revert.as_ref().map(|p| p.generation)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("point {0} is not in the catalog")]
    UnknownPoint(PointId),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Counts for one applied viewport batch.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub materialized: usize,
    pub dematerialized: usize,
    pub failed: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PromoteOutcome {
    Promoted { generation: u64 },
    /// The entity is already shown with its category label.
    AlreadyVisible,
    /// The entity is gone or was re-materialized since the probe started.
    Stale,
}

/// Owns the runtime state of every materialized point and keeps the renderer
/// in step with it.
///
/// One store-wide counter stamps both materialization epochs and revert
/// generations, so a value never repeats for the lifetime of the store.
///
/// Iteration over entities is in id order.
#[derive(Debug)]
pub struct EntityStateStore<R> {
    catalog: Arc<PointCatalog>,
    renderer: R,
    entities: BTreeMap<PointId, EntityRuntimeState>,
    generation: u64,
}

impl<R: Renderer> EntityStateStore<R> {
    pub fn new(catalog: Arc<PointCatalog>, renderer: R) -> Self {
        Self {
            catalog,
            renderer,
            entities: BTreeMap::new(),
            generation: 0,
        }
    }

    pub fn catalog(&self) -> &Arc<PointCatalog> {
        &self.catalog
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&EntityRuntimeState> {
        self.entities.get(id)
    }

    pub fn materialized_ids(&self) -> impl Iterator<Item = &PointId> + '_ {
        self.entities.keys()
    }

    pub fn is_materialized(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// False for points that are not materialized.
    pub fn is_visible(&self, id: &str) -> bool {
        self.entities.get(id).is_some_and(|s| s.visible)
    }

    pub fn label_mode(&self, id: &str) -> Option<LabelMode> {
        self.entities.get(id).map(|s| s.label_mode)
    }

    pub fn epoch(&self, id: &str) -> Option<u64> {
        self.entities.get(id).map(|s| s.epoch)
    }

    pub fn pending_revert_generation(&self, id: &str) -> Option<u64> {
        self.entities.get(id).and_then(|s| s.pending_revert_generation())
    }

    /// Create state for `id` and draw it with its category label.
    ///
    /// Returns `Ok(false)` if the point is already materialized. Failures are
    /// logged here and leave no state behind.
    pub fn materialize(
        &mut self,
        id: &PointId,
        policy: &VisibilityPolicy,
    ) -> Result<bool, MaterializeError> {
        if self.entities.contains_key(id) {
            return Ok(false);
        }
        let added = self.add(id, policy);
        if let Err(err) = &added {
            warn!(%id, %err, "point not materialized");
        }
        added.map(|()| true)
    }

    fn add(&mut self, id: &PointId, policy: &VisibilityPolicy) -> Result<(), MaterializeError> {
        let point = self
            .catalog
            .get(id.as_str())
            .ok_or_else(|| MaterializeError::UnknownPoint(id.clone()))?;

        let visible = policy.shows(point.category());
        let label = LabelSpec::category(point, policy.distance_range());
        let render_handle = self.renderer.add_point(point, &label, visible)?;

        self.generation += 1;
        self.entities.insert(
            id.clone(),
            EntityRuntimeState {
                category: point.category(),
                visible,
                label_mode: LabelMode::Category,
                label,
                render_handle,
                epoch: self.generation,
                pending_revert: None,
            },
        );
        Ok(())
    }

    /// Drop state for `id`, cancelling any pending revert. Idempotent.
    pub fn dematerialize(&mut self, id: &PointId) -> bool {
        let Some(mut state) = self.entities.remove(id) else {
            return false;
        };
        if let Some(pending) = state.pending_revert.take() {
            pending.timer.cancel();
        }
        self.renderer.remove_by_id(id);
        true
    }

    /// Apply a working-set change as one renderer batch with a single refresh.
    ///
    /// Deactivations run first. Points that fail to materialize are skipped;
    /// the rest of the batch still applies.
    pub fn apply_delta(
        &mut self,
        to_deactivate: &BTreeSet<PointId>,
        to_activate: &BTreeSet<PointId>,
        policy: &VisibilityPolicy,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        self.renderer.suspend_batch();
        for id in to_deactivate {
            if self.dematerialize(id) {
                report.dematerialized += 1;
            }
        }
        for id in to_activate {
            match self.materialize(id, policy) {
                Ok(true) => report.materialized += 1,
                Ok(false) => {}
                Err(_) => report.failed += 1,
            }
        }
        self.renderer.resume_batch();
        self.renderer.request_refresh();

        debug!(
            materialized = report.materialized,
            dematerialized = report.dematerialized,
            failed = report.failed,
            working_set = self.entities.len(),
            "viewport batch applied"
        );
        report
    }

    /// Show or hide every materialized point of `category`. Label modes are
    /// left alone.
    pub fn set_category_visibility(&mut self, category: Category, visible: bool) -> usize {
        let mut touched = 0;
        for (id, state) in self.entities.iter_mut().filter(|(_, s)| s.category == category) {
            state.visible = visible;
            self.renderer.set_visible(id, visible);
            touched += 1;
        }
        self.renderer.request_refresh();
        touched
    }

    /// Set the distance condition on the current label of every materialized
    /// point, whatever its category or label mode. A revert replaces an
    /// inspected label with one carrying the policy range at that time.
    pub fn set_display_distance_range(&mut self, range: DistanceRange) -> usize {
        for (id, state) in self.entities.iter_mut() {
            state.label.distance_condition = Some(range);
            self.renderer.set_label(id, &state.label);
        }
        self.renderer.request_refresh();
        self.entities.len()
    }

    /// Force `id` visible with its inspected label and arm a revert.
    ///
    /// `epoch` must match the entity's materialization epoch. `start_timer`
    /// receives the new revert generation and returns the handle used to
    /// cancel it. A previous pending revert is cancelled.
    pub fn promote<F>(
        &mut self,
        id: &PointId,
        epoch: u64,
        elevation_m: Option<f64>,
        start_timer: F,
    ) -> PromoteOutcome
    where
        F: FnOnce(u64) -> Box<dyn TimerHandle>,
    {
        let Some(state) = self.entities.get_mut(id) else {
            return PromoteOutcome::Stale;
        };
        if state.epoch != epoch {
            return PromoteOutcome::Stale;
        }
        if state.label_mode == LabelMode::Category && state.visible {
            return PromoteOutcome::AlreadyVisible;
        }
        let Some(point) = self.catalog.get(id.as_str()) else {
            return PromoteOutcome::Stale;
        };

        if let Some(previous) = state.pending_revert.take() {
            previous.timer.cancel();
        }

        self.generation += 1;
        let generation = self.generation;

        state.label = LabelSpec::inspected(point, elevation_m);
        self.renderer.set_label(id, &state.label);
        self.renderer.set_visible(id, true);
        state.visible = true;
        state.label_mode = LabelMode::Inspected;
        state.pending_revert = Some(PendingRevert {
            generation,
            timer: start_timer(generation),
        });
        self.renderer.request_refresh();

        PromoteOutcome::Promoted { generation }
    }

    /// Return an inspected entity to its category label under the current
    /// policy.
    ///
    /// Returns false, changing nothing, unless `generation` is the entity's
    /// pending revert.
    pub fn revert(&mut self, id: &PointId, generation: u64, policy: &VisibilityPolicy) -> bool {
        let Some(state) = self.entities.get_mut(id) else {
            return false;
        };
        if state.pending_revert_generation() != Some(generation) {
            return false;
        }
        let Some(point) = self.catalog.get(id.as_str()) else {
            return false;
        };

        state.pending_revert = None;
        state.label_mode = LabelMode::Category;
        state.visible = policy.shows(state.category);

        state.label = LabelSpec::category(point, policy.distance_range());
        self.renderer.set_label(id, &state.label);
        self.renderer.set_visible(id, state.visible);
        self.renderer.request_refresh();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{BatchReport, EntityStateStore, MaterializeError, PromoteOutcome};
    use crate::label::LabelMode;
    use crate::policy::{DistanceRange, VisibilityPolicy};
    use crate::renderer::RecordingRenderer;
    use catalog::{Category, Point, PointCatalog, PointId};
    use pretty_assertions::assert_eq;
    use runtime::timer::TimerHandle;
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Timer that never fires on its own; records cancellation.
    #[derive(Debug, Clone, Default)]
    struct CancelFlag(Arc<AtomicBool>);

    impl CancelFlag {
        fn new() -> Self {
            Self::default()
        }

        fn is_cancelled(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl TimerHandle for CancelFlag {
        fn cancel(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn store() -> EntityStateStore<RecordingRenderer> {
        let (catalog, _) = PointCatalog::build(vec![
            Point::new("C:1", "Peak one", 43.0, -4.0).unwrap(),
            Point::new("P:1", "Village one", 43.01, -4.0).unwrap(),
            Point::new("A:1", "Lake one", 50.0, 3.0).unwrap(),
        ]);
        EntityStateStore::new(Arc::new(catalog), RecordingRenderer::new())
    }

    fn id(s: &str) -> PointId {
        PointId::from(s)
    }

    fn ids(list: &[&str]) -> BTreeSet<PointId> {
        list.iter().map(|s| PointId::from(*s)).collect()
    }

    fn timer(flag: &CancelFlag) -> impl FnOnce(u64) -> Box<dyn TimerHandle> + '_ {
        move |_| -> Box<dyn TimerHandle> { Box::new(flag.clone()) }
    }

    #[test]
    fn materialize_follows_category_policy() {
        let mut s = store();
        let policy = VisibilityPolicy::default().with_shown(Category::Settlement, true);

        assert!(s.materialize(&id("C:1"), &policy).unwrap());
        assert!(s.materialize(&id("P:1"), &policy).unwrap());
        assert!(s.is_materialized("C:1"));
        assert!(!s.is_visible("C:1"));
        assert!(s.is_visible("P:1"));
        assert_eq!(s.label_mode("C:1"), Some(LabelMode::Category));
        assert_eq!(s.renderer().visible_count(), 1);
    }

    #[test]
    fn materialize_twice_is_a_no_op() {
        let mut s = store();
        let policy = VisibilityPolicy::default();
        s.materialize(&id("C:1"), &policy).unwrap();
        let epoch = s.epoch("C:1");

        assert!(!s.materialize(&id("C:1"), &policy).unwrap());
        assert_eq!(s.epoch("C:1"), epoch);
        assert_eq!(s.renderer().len(), 1);
    }

    #[test]
    fn materialize_failures_leave_no_state() {
        let mut s = store();
        let policy = VisibilityPolicy::default();
        assert!(matches!(
            s.materialize(&id("C:9"), &policy),
            Err(MaterializeError::UnknownPoint(_))
        ));

        s.renderer_mut().reject("P:1");
        assert!(matches!(
            s.materialize(&id("P:1"), &policy),
            Err(MaterializeError::Render(_))
        ));
        assert!(!s.is_materialized("P:1"));
        assert!(!s.is_visible("P:1"));
    }

    #[test]
    fn dematerialize_cancels_pending_revert() {
        let mut s = store();
        let policy = VisibilityPolicy::default();
        s.materialize(&id("C:1"), &policy).unwrap();
        let flag = CancelFlag::new();
        let epoch = s.epoch("C:1").unwrap();
        s.promote(&id("C:1"), epoch, None, timer(&flag));

        assert!(s.dematerialize(&id("C:1")));
        assert!(flag.is_cancelled());
        assert!(!s.is_materialized("C:1"));
        assert_eq!(s.pending_revert_generation("C:1"), None);
        assert!(s.renderer().get("C:1").is_none());

        assert!(!s.dematerialize(&id("C:1")));
    }

    #[test]
    fn delta_is_one_batch_and_skips_rejected_points() {
        let mut s = store();
        let policy = VisibilityPolicy::default();
        s.renderer_mut().reject("P:1");

        let report = s.apply_delta(&BTreeSet::new(), &ids(&["C:1", "P:1"]), &policy);
        assert_eq!(report, BatchReport { materialized: 1, dematerialized: 0, failed: 1 });

        let report = s.apply_delta(&ids(&["C:1"]), &ids(&["A:1"]), &policy);
        assert_eq!(report, BatchReport { materialized: 1, dematerialized: 1, failed: 0 });
        assert_eq!(s.materialized_ids().cloned().collect::<BTreeSet<_>>(), ids(&["A:1"]));
        assert_eq!(s.renderer().batches(), 2);
        assert_eq!(s.renderer().refreshes(), 2);
    }

    #[test]
    fn category_toggle_is_bulk_and_keeps_labels() {
        let mut s = store();
        let policy = VisibilityPolicy::default();
        s.apply_delta(&BTreeSet::new(), &ids(&["C:1", "P:1"]), &policy);

        assert_eq!(s.set_category_visibility(Category::Peak, true), 1);
        assert!(s.is_visible("C:1"));
        assert!(!s.is_visible("P:1"));
        assert_eq!(s.label_mode("C:1"), Some(LabelMode::Category));

        assert_eq!(s.set_category_visibility(Category::Peak, false), 1);
        assert!(!s.is_visible("C:1"));
    }

    #[test]
    fn distance_range_reaches_every_entity() {
        let mut s = store();
        let policy = VisibilityPolicy::default().with_shown(Category::Settlement, true);
        s.apply_delta(&BTreeSet::new(), &ids(&["C:1", "P:1"]), &policy);
        let flag = CancelFlag::new();
        let epoch = s.epoch("C:1").unwrap();
        s.promote(&id("C:1"), epoch, Some(2000.0), timer(&flag));

        let range = DistanceRange::from_km_sliders(1.0, 5.0);
        assert_eq!(s.set_display_distance_range(range), s.len());
        for point in ["C:1", "P:1"] {
            assert_eq!(
                s.renderer().get(point).unwrap().label.distance_condition,
                Some(range)
            );
            assert_eq!(s.get(point).unwrap().label().distance_condition, Some(range));
        }

        // The inspected label keeps its text and mode.
        assert_eq!(s.label_mode("C:1"), Some(LabelMode::Inspected));
        assert_eq!(s.renderer().get("C:1").unwrap().label.text, "Peak one\n2000 m");
    }

    #[test]
    fn entity_keeps_its_render_handle() {
        let mut s = store();
        let policy = VisibilityPolicy::default();
        s.materialize(&id("C:1"), &policy).unwrap();
        s.materialize(&id("P:1"), &policy).unwrap();

        for point in ["C:1", "P:1"] {
            assert_eq!(
                s.get(point).map(|e| e.render_handle()),
                s.renderer().get(point).map(|d| d.handle)
            );
        }
        assert_ne!(
            s.get("C:1").map(|e| e.render_handle()),
            s.get("P:1").map(|e| e.render_handle())
        );
    }

    #[test]
    fn promote_then_revert_restores_hidden_state() {
        let mut s = store();
        let policy = VisibilityPolicy::default();
        s.materialize(&id("C:1"), &policy).unwrap();
        let before = s.renderer().get("C:1").cloned().unwrap();
        let epoch = s.epoch("C:1").unwrap();

        let flag = CancelFlag::new();
        let PromoteOutcome::Promoted { generation } =
            s.promote(&id("C:1"), epoch, Some(2648.4), timer(&flag))
        else {
            panic!("expected promotion");
        };
        assert!(s.is_visible("C:1"));
        assert_eq!(s.label_mode("C:1"), Some(LabelMode::Inspected));
        assert_eq!(s.renderer().get("C:1").unwrap().label.text, "Peak one\n2648 m");
        assert_eq!(s.pending_revert_generation("C:1"), Some(generation));

        assert!(s.revert(&id("C:1"), generation, &policy));
        assert!(!s.is_visible("C:1"));
        assert_eq!(s.label_mode("C:1"), Some(LabelMode::Category));
        assert_eq!(s.pending_revert_generation("C:1"), None);
        assert_eq!(s.renderer().get("C:1").cloned().unwrap(), before);
        assert!(!flag.is_cancelled());
    }

    #[test]
    fn revert_reads_the_current_policy() {
        let mut s = store();
        let mut policy = VisibilityPolicy::default();
        s.materialize(&id("C:1"), &policy).unwrap();
        let epoch = s.epoch("C:1").unwrap();
        let flag = CancelFlag::new();
        let PromoteOutcome::Promoted { generation } =
            s.promote(&id("C:1"), epoch, None, timer(&flag))
        else {
            panic!("expected promotion");
        };

        policy.set_shown(Category::Peak, true);
        s.set_category_visibility(Category::Peak, true);
        assert!(s.revert(&id("C:1"), generation, &policy));
        assert!(s.is_visible("C:1"));
        assert_eq!(s.label_mode("C:1"), Some(LabelMode::Category));
    }

    #[test]
    fn revert_after_dematerialize_changes_nothing() {
        let mut s = store();
        let policy = VisibilityPolicy::default();
        s.materialize(&id("C:1"), &policy).unwrap();
        let epoch = s.epoch("C:1").unwrap();
        let flag = CancelFlag::new();
        let PromoteOutcome::Promoted { generation } =
            s.promote(&id("C:1"), epoch, None, timer(&flag))
        else {
            panic!("expected promotion");
        };

        s.dematerialize(&id("C:1"));
        assert!(!s.revert(&id("C:1"), generation, &policy));
        assert!(!s.is_materialized("C:1"));
        assert!(s.renderer().is_empty());
    }

    #[test]
    fn repromotion_invalidates_the_first_revert() {
        let mut s = store();
        let policy = VisibilityPolicy::default();
        s.materialize(&id("C:1"), &policy).unwrap();
        let epoch = s.epoch("C:1").unwrap();

        let first_flag = CancelFlag::new();
        let PromoteOutcome::Promoted { generation: first } =
            s.promote(&id("C:1"), epoch, None, timer(&first_flag))
        else {
            panic!("expected promotion");
        };
        let second_flag = CancelFlag::new();
        let PromoteOutcome::Promoted { generation: second } =
            s.promote(&id("C:1"), epoch, Some(100.0), timer(&second_flag))
        else {
            panic!("expected promotion");
        };

        assert!(first_flag.is_cancelled());
        assert!(second > first);
        assert!(!s.revert(&id("C:1"), first, &policy));
        assert!(s.is_visible("C:1"));
        assert!(s.revert(&id("C:1"), second, &policy));
        assert!(!s.is_visible("C:1"));
    }

    #[test]
    fn promote_skips_visible_and_stale_entities() {
        let mut s = store();
        let shown = VisibilityPolicy::default().with_shown(Category::Peak, true);
        s.materialize(&id("C:1"), &shown).unwrap();
        let epoch = s.epoch("C:1").unwrap();
        let flag = CancelFlag::new();
        assert_eq!(
            s.promote(&id("C:1"), epoch, None, timer(&flag)),
            PromoteOutcome::AlreadyVisible
        );

        s.dematerialize(&id("C:1"));
        s.materialize(&id("C:1"), &VisibilityPolicy::default()).unwrap();
        assert_ne!(s.epoch("C:1"), Some(epoch));
        assert_eq!(
            s.promote(&id("C:1"), epoch, None, timer(&flag)),
            PromoteOutcome::Stale
        );
        assert_eq!(
            s.promote(&id("A:1"), epoch, None, timer(&flag)),
            PromoteOutcome::Stale
        );
        assert!(!s.is_visible("C:1"));
    }
}
