use std::collections::{BTreeMap, BTreeSet};

use catalog::{Point, PointId};
use foundation::math::GeoPoint;

use crate::label::LabelSpec;

/// Opaque handle returned for a drawn point.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderHandle(pub u64);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("point {0} is already drawn")]
    Duplicate(PointId),
    #[error("renderer rejected {id}: {reason}")]
    Rejected { id: PointId, reason: String },
}

/// Drawing surface for point entities.
///
/// Calls between `suspend_batch` and `resume_batch` may be coalesced; nothing
/// is guaranteed on screen until `request_refresh`.
pub trait Renderer {
    fn add_point(
        &mut self,
        point: &Point,
        label: &LabelSpec,
        visible: bool,
    ) -> Result<RenderHandle, RenderError>;

    /// Returns whether anything was removed.
    fn remove_by_id(&mut self, id: &PointId) -> bool;

    fn set_visible(&mut self, id: &PointId, visible: bool);

    fn set_label(&mut self, id: &PointId, label: &LabelSpec);

    fn suspend_batch(&mut self);

    fn resume_batch(&mut self);

    fn request_refresh(&mut self);
}

/// A point as the recording renderer last saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnPoint {
    pub handle: RenderHandle,
    pub position: GeoPoint,
    pub description: String,
    pub label: LabelSpec,
    pub visible: bool,
}

/// In-memory renderer that keeps the last state of every point.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    drawn: BTreeMap<PointId, DrawnPoint>,
    reject: BTreeSet<PointId>,
    next_handle: u64,
    suspended: u32,
    batches: u64,
    refreshes: u64,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `add_point` fail for `id`.
    pub fn reject(&mut self, id: impl Into<PointId>) {
        self.reject.insert(id.into());
    }

    pub fn get(&self, id: &str) -> Option<&DrawnPoint> {
        self.drawn.get(id)
    }

    pub fn len(&self) -> usize {
        self.drawn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawn.is_empty()
    }

    pub fn visible_count(&self) -> usize {
        self.drawn.values().filter(|d| d.visible).count()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended > 0
    }

    /// Completed suspend/resume pairs.
    pub fn batches(&self) -> u64 {
        self.batches
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }
}

impl Renderer for RecordingRenderer {
    fn add_point(
        &mut self,
        point: &Point,
        label: &LabelSpec,
        visible: bool,
    ) -> Result<RenderHandle, RenderError> {
        if self.reject.contains(point.id()) {
            return Err(RenderError::Rejected {
                id: point.id().clone(),
                reason: "rejected by configuration".to_string(),
            });
        }
        if self.drawn.contains_key(point.id()) {
            return Err(RenderError::Duplicate(point.id().clone()));
        }

        self.next_handle += 1;
        let handle = RenderHandle(self.next_handle);
        self.drawn.insert(
            point.id().clone(),
            DrawnPoint {
                handle,
                position: point.position(),
                description: point.geo_uri(),
                label: label.clone(),
                visible,
            },
        );
        Ok(handle)
    }

    fn remove_by_id(&mut self, id: &PointId) -> bool {
        self.drawn.remove(id).is_some()
    }

    fn set_visible(&mut self, id: &PointId, visible: bool) {
        if let Some(d) = self.drawn.get_mut(id) {
            d.visible = visible;
        }
    }

    fn set_label(&mut self, id: &PointId, label: &LabelSpec) {
        if let Some(d) = self.drawn.get_mut(id) {
            d.label = label.clone();
        }
    }

    fn suspend_batch(&mut self) {
        self.suspended += 1;
    }

    fn resume_batch(&mut self) {
        if self.suspended > 0 {
            self.suspended -= 1;
            if self.suspended == 0 {
                self.batches += 1;
            }
        }
    }

    fn request_refresh(&mut self) {
        self.refreshes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{RecordingRenderer, RenderError, Renderer};
    use crate::label::LabelSpec;
    use crate::policy::DistanceRange;
    use catalog::{Point, PointId};

    fn peak() -> Point {
        Point::new("C:1", "Peak one", 43.0, -4.0).unwrap()
    }

    #[test]
    fn records_added_points_and_updates() {
        let mut r = RecordingRenderer::new();
        let p = peak();
        let label = LabelSpec::category(&p, DistanceRange::default());
        r.add_point(&p, &label, false).unwrap();

        r.set_visible(p.id(), true);
        let drawn = r.get("C:1").unwrap();
        assert!(drawn.visible);
        assert_eq!(drawn.description, "geo:43.000000,-4.000000");
        assert_eq!(r.visible_count(), 1);

        assert!(r.remove_by_id(p.id()));
        assert!(!r.remove_by_id(p.id()));
        assert!(r.is_empty());
    }

    #[test]
    fn duplicate_and_rejected_points_fail() {
        let mut r = RecordingRenderer::new();
        let p = peak();
        let label = LabelSpec::category(&p, DistanceRange::default());
        r.add_point(&p, &label, true).unwrap();
        assert_eq!(
            r.add_point(&p, &label, true),
            Err(RenderError::Duplicate(PointId::from("C:1")))
        );

        let mut r = RecordingRenderer::new();
        r.reject("C:1");
        assert!(matches!(
            r.add_point(&p, &label, true),
            Err(RenderError::Rejected { .. })
        ));
    }

    #[test]
    fn nested_batches_count_once() {
        let mut r = RecordingRenderer::new();
        r.suspend_batch();
        r.suspend_batch();
        r.resume_batch();
        assert!(r.is_suspended());
        r.resume_batch();
        assert!(!r.is_suspended());
        assert_eq!(r.batches(), 1);
    }
}
