pub mod bbox;
pub mod detection;
pub mod error;
pub mod frame;
pub mod history;
pub mod motion;
pub mod recovery;
pub mod track;

pub use detection::Detection;
pub use error::Error;
pub use frame::Frame;
pub use track::{Track, TrackId};

use std::collections::HashSet;

use serde_derive::{Deserialize, Serialize};
use tracing::debug;

use history::{Trajectory, TrajectoryStore};
use motion::FilterBank;
use recovery::LostPool;

/// Appearance-based multi-object tracker wrapped by the recovery layer.
///
/// The backend owns identity assignment and confirmation; this crate never
/// invents identities. Backend errors are propagated, never swallowed.
pub trait AppearanceTracker {
    fn update(&mut self, detections: &[Detection], frame: &Frame) -> Result<Vec<Track>, Error>;
}

/// Construction-time settings, immutable for the tracker's lifetime.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecoveryConfig {
    /// Frames a lost track survives without recovery before deletion.
    pub max_lost_frames: u32,
    /// Minimum IoU between a predicted box and a detection to recover, in (0, 1).
    pub iou_recovery_threshold: f32,
    /// Confidence given to re-injected recovered detections, in (0, 1].
    pub recovery_confidence: f32,
    /// Track lifetime passed through to the appearance backend.
    pub max_age: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_lost_frames: 5,
            iou_recovery_threshold: 0.3,
            recovery_confidence: 0.9,
            max_age: 30,
        }
    }
}

impl RecoveryConfig {
    fn validate(&self) -> Result<(), Error> {
        if !(self.iou_recovery_threshold > 0. && self.iou_recovery_threshold < 1.) {
            return Err(Error::Config(format!(
                "iou_recovery_threshold must be in (0, 1), got {}",
                self.iou_recovery_threshold
            )));
        }

        if !(self.recovery_confidence > 0. && self.recovery_confidence <= 1.) {
            return Err(Error::Config(format!(
                "recovery_confidence must be in (0, 1], got {}",
                self.recovery_confidence
            )));
        }

        if self.max_age == 0 {
            return Err(Error::Config("max_age must be positive".into()));
        }

        Ok(())
    }
}

/// Recovery-augmented tracking layer over an appearance backend.
///
/// Keeps a constant-velocity filter per identity and, before the backend
/// sees each frame's detections, tries to reunite recently lost identities
/// with them by predicted-position IoU. Per identity the lifecycle is
/// New -> Active -> Lost -> (Active | Deleted); a track never goes from
/// Active to Deleted without passing through Lost.
pub struct RecoveryTracker<T> {
    backend: T,
    config: RecoveryConfig,
    filters: FilterBank<f32>,
    lost: LostPool,
    trajectories: TrajectoryStore,
}

impl<T: AppearanceTracker> RecoveryTracker<T> {
    /// Validates `config` eagerly; invalid settings never reach first use.
    pub fn new(backend: T, config: RecoveryConfig) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            backend,
            config,
            filters: FilterBank::new(),
            lost: LostPool::new(),
            trajectories: TrajectoryStore::new(),
        })
    }

    /// Runs one full frame cycle: recovery, backend update, filter
    /// reconciliation and lost-track aging. Returns the backend's raw track
    /// list; confirmation filtering is left to the caller.
    pub fn update(
        &mut self,
        detections: Vec<Detection>,
        frame: &Frame,
    ) -> Result<Vec<Track>, Error> {
        let (recoveries, mut pending) = self.lost.recover(
            &mut self.filters,
            detections,
            self.config.iou_recovery_threshold,
        );

        for recovery in recoveries {
            pending.push(Detection {
                confidence: self.config.recovery_confidence,
                class: recovery.class,
                ..recovery.detection
            });
        }

        let tracks = self.backend.update(&pending, frame)?;

        let mut confirmed = HashSet::new();
        for track in tracks.iter().filter(|t| t.confirmed) {
            let center = track.bbox.center();

            if self.filters.contains(track.track_id) {
                self.filters.update(track.track_id, center);
            } else {
                self.filters.initialize(track.track_id, center);
            }

            self.trajectories.push(track.track_id, center);
            self.lost.remove(track.track_id);
            confirmed.insert(track.track_id);
        }

        for id in self.filters.ids() {
            if confirmed.contains(&id) || self.lost.contains(id) {
                continue;
            }

            // an identity with no box in the raw list this frame is picked
            // up on a later frame
            if let Some(track) = tracks.iter().find(|t| t.track_id == id) {
                debug!(track = id, "track lost");
                self.lost.insert(id, track.bbox, track.class);
            }
        }

        for id in self.lost.age(self.config.max_lost_frames) {
            debug!(track = id, "lost track aged out");
            self.filters.remove(id);
            self.trajectories.remove(id);
        }

        Ok(tracks)
    }

    #[inline]
    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    #[inline]
    pub fn backend(&self) -> &T {
        &self.backend
    }

    #[inline]
    pub fn is_lost(&self, id: TrackId) -> bool {
        self.lost.contains(id)
    }

    #[inline]
    pub fn frames_lost(&self, id: TrackId) -> Option<u32> {
        self.lost.frames_lost(id)
    }

    #[inline]
    pub fn lost_count(&self) -> usize {
        self.lost.len()
    }

    #[inline]
    pub fn has_motion_state(&self, id: TrackId) -> bool {
        self.filters.contains(id)
    }

    /// Recent confirmed centers for the identity, oldest first.
    #[inline]
    pub fn trajectory(&self, id: TrackId) -> Option<&Trajectory> {
        self.trajectories.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullTracker;

    impl AppearanceTracker for NullTracker {
        fn update(&mut self, _: &[Detection], _: &Frame) -> Result<Vec<Track>, Error> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(RecoveryTracker::new(NullTracker, RecoveryConfig::default()).is_ok());
    }

    #[test]
    fn out_of_range_iou_threshold_is_rejected() {
        for bad in [0.0, -0.1, 1.0, 1.5, f32::NAN] {
            let config = RecoveryConfig {
                iou_recovery_threshold: bad,
                ..Default::default()
            };

            assert!(matches!(
                RecoveryTracker::new(NullTracker, config),
                Err(Error::Config(_))
            ));
        }
    }

    #[test]
    fn out_of_range_recovery_confidence_is_rejected() {
        for bad in [0.0, -0.5, 1.01] {
            let config = RecoveryConfig {
                recovery_confidence: bad,
                ..Default::default()
            };

            assert!(matches!(
                RecoveryTracker::new(NullTracker, config),
                Err(Error::Config(_))
            ));
        }
    }

    #[test]
    fn zero_max_age_is_rejected() {
        let config = RecoveryConfig {
            max_age: 0,
            ..Default::default()
        };

        assert!(matches!(
            RecoveryTracker::new(NullTracker, config),
            Err(Error::Config(_))
        ));
    }
}
