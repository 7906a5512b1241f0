use std::collections::BTreeMap;

use tracing::debug;

use crate::bbox::{BBox, Ltrb};
use crate::detection::Detection;
use crate::motion::FilterBank;
use crate::track::TrackId;

/// Bookkeeping for an identity that dropped out of the confirmed output.
#[derive(Debug, Clone)]
pub struct LostTrack {
    pub frames_lost: u32,
    pub bbox: BBox<Ltrb>,
    pub size: (f32, f32),
    pub class: i32,
}

/// A lost identity reunited with a current-frame detection.
#[derive(Debug, Clone)]
pub struct Recovery {
    pub id: TrackId,
    pub detection: Detection,
    pub class: i32,
}

/// Lost-track records keyed by identity.
///
/// The appearance backend has no memory of identities it dropped, so these
/// records are the only route back to a previously assigned id. `BTreeMap`
/// fixes the recovery scan to ascending identity order.
#[derive(Debug, Default)]
pub struct LostPool {
    records: BTreeMap<TrackId, LostTrack>,
}

impl LostPool {
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    /// Records a fresh loss: frames_lost starts at 0, size is taken from the
    /// last known box.
    pub fn insert(&mut self, id: TrackId, bbox: BBox<Ltrb>, class: i32) {
        self.records.insert(
            id,
            LostTrack {
                frames_lost: 0,
                bbox,
                size: (bbox.width(), bbox.height()),
                class,
            },
        );
    }

    pub fn remove(&mut self, id: TrackId) {
        self.records.remove(&id);
    }

    #[inline]
    pub fn contains(&self, id: TrackId) -> bool {
        self.records.contains_key(&id)
    }

    #[inline]
    pub fn frames_lost(&self, id: TrackId) -> Option<u32> {
        self.records.get(&id).map(|r| r.frames_lost)
    }

    #[inline]
    pub fn ids(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.records.keys().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Greedy recovery pass, records visited in ascending identity order.
    ///
    /// Each record advances its filter one step, builds a candidate box of
    /// its last known size around the prediction and claims the available
    /// detection with the highest IoU above `iou_threshold` (first match
    /// wins across records; an equal-IoU tie goes to the earlier detection
    /// in input order). Claimed detections leave the pool; unmatched records
    /// stay lost for the caller to age.
    pub fn recover(
        &mut self,
        filters: &mut FilterBank<f32>,
        mut detections: Vec<Detection>,
        iou_threshold: f32,
    ) -> (Vec<Recovery>, Vec<Detection>) {
        let mut recovered = Vec::new();
        let ids: Vec<TrackId> = self.records.keys().copied().collect();

        for id in ids {
            let predicted = match filters.predict(id) {
                Some(p) => p,
                None => continue,
            };

            let (size, class) = match self.records.get(&id) {
                Some(record) => (record.size, record.class),
                None => continue,
            };

            let candidate = BBox::from_center_size(predicted.x, predicted.y, size.0, size.1);

            let mut best: Option<(usize, f32)> = None;
            for (idx, det) in detections.iter().enumerate() {
                let iou = candidate.iou(&det.bbox_ltrb());
                if iou > iou_threshold && best.map_or(true, |(_, best_iou)| iou > best_iou) {
                    best = Some((idx, iou));
                }
            }

            if let Some((idx, iou)) = best {
                let detection = detections.remove(idx);
                self.records.remove(&id);
                debug!(track = id, iou, "lost track recovered");
                recovered.push(Recovery {
                    id,
                    detection,
                    class,
                });
            }
        }

        (recovered, detections)
    }

    /// Ages every record one frame; returns the identities whose records
    /// exceeded `max_lost` and were dropped. frames_lost only ever grows
    /// while a record exists.
    pub fn age(&mut self, max_lost: u32) -> Vec<TrackId> {
        let mut expired = Vec::new();

        self.records.retain(|&id, record| {
            record.frames_lost += 1;
            if record.frames_lost > max_lost {
                expired.push(id);
                false
            } else {
                true
            }
        });

        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra as na;

    fn det(cx: f32, cy: f32, w: f32, h: f32) -> Detection {
        Detection::new(cx, cy, w, h, 0.8, 41)
    }

    fn lost_box(cx: f32, cy: f32, w: f32, h: f32) -> BBox<Ltrb> {
        BBox::from_center_size(cx, cy, w, h)
    }

    #[test]
    fn record_without_motion_state_is_skipped() {
        let mut pool = LostPool::new();
        let mut filters = FilterBank::new();
        pool.insert(5, lost_box(100., 100., 40., 40.), 41);

        let (recovered, remaining) =
            pool.recover(&mut filters, vec![det(100., 100., 40., 40.)], 0.3);

        assert!(recovered.is_empty());
        assert_eq!(remaining.len(), 1);
        assert!(pool.contains(5));
    }

    #[test]
    fn highest_iou_detection_is_selected() {
        let mut pool = LostPool::new();
        let mut filters = FilterBank::new();
        filters.initialize(1, na::Point2::new(100., 100.));
        pool.insert(1, lost_box(100., 100., 40., 40.), 41);

        let far = det(120., 100., 40., 40.);
        let near = det(105., 100., 40., 40.);
        let (recovered, remaining) = pool.recover(&mut filters, vec![far, near], 0.3);

        assert_eq!(recovered.len(), 1);
        assert_abs_diff_eq!(recovered[0].detection.x, 105.);
        assert_eq!(remaining, vec![far]);
        assert!(!pool.contains(1));
    }

    #[test]
    fn matches_below_threshold_are_rejected() {
        let mut pool = LostPool::new();
        let mut filters = FilterBank::new();
        filters.initialize(1, na::Point2::new(100., 100.));
        pool.insert(1, lost_box(100., 100., 40., 40.), 41);

        // overlap 5x40 -> IoU ~= 0.067
        let (recovered, remaining) =
            pool.recover(&mut filters, vec![det(135., 100., 40., 40.)], 0.3);

        assert!(recovered.is_empty());
        assert_eq!(remaining.len(), 1);
        assert!(pool.contains(1));
        assert_eq!(pool.frames_lost(1), Some(0));
    }

    #[test]
    fn contested_detection_goes_to_the_lower_identity() {
        let mut pool = LostPool::new();
        let mut filters = FilterBank::new();
        filters.initialize(1, na::Point2::new(100., 100.));
        filters.initialize(2, na::Point2::new(104., 100.));
        pool.insert(2, lost_box(104., 100., 50., 50.), 41);
        pool.insert(1, lost_box(100., 100., 50., 50.), 41);

        let (recovered, remaining) =
            pool.recover(&mut filters, vec![det(102., 100., 50., 50.)], 0.3);

        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].id, 1);
        assert!(remaining.is_empty());
        assert!(pool.contains(2));
        assert!(!pool.contains(1));
    }

    #[test]
    fn recovery_carries_the_original_class() {
        let mut pool = LostPool::new();
        let mut filters = FilterBank::new();
        filters.initialize(3, na::Point2::new(50., 50.));
        pool.insert(3, lost_box(50., 50., 30., 30.), 7);

        // the matched detection's class is not trusted
        let (recovered, _) = pool.recover(&mut filters, vec![det(50., 50., 30., 30.)], 0.3);

        assert_eq!(recovered[0].class, 7);
    }

    #[test]
    fn aging_increments_until_expiry() {
        let mut pool = LostPool::new();
        pool.insert(9, lost_box(10., 10., 20., 20.), 41);

        assert!(pool.age(2).is_empty());
        assert_eq!(pool.frames_lost(9), Some(1));
        assert!(pool.age(2).is_empty());
        assert_eq!(pool.frames_lost(9), Some(2));

        let expired = pool.age(2);
        assert_eq!(expired, vec![9]);
        assert!(!pool.contains(9));
        assert_eq!(pool.frames_lost(9), None);
    }
}
