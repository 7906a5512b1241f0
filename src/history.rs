use std::collections::{HashMap, VecDeque};

use nalgebra as na;

use crate::track::TrackId;

/// Points kept per identity for trajectory overlays.
pub const TRAJECTORY_CAPACITY: usize = 50;

/// Ring of recent confirmed centers for one identity, oldest first.
#[derive(Debug, Clone)]
pub struct Trajectory {
    points: VecDeque<na::Point2<f32>>,
    capacity: usize,
}

impl Trajectory {
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, point: na::Point2<f32>) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }

        self.points.push_back(point);
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &na::Point2<f32>> {
        self.points.iter()
    }

    #[inline]
    pub fn latest(&self) -> Option<&na::Point2<f32>> {
        self.points.back()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Per-identity trajectory store, maintained alongside the filter bank.
#[derive(Debug, Default)]
pub struct TrajectoryStore {
    tracks: HashMap<TrackId, Trajectory>,
}

impl TrajectoryStore {
    pub fn new() -> Self {
        Self {
            tracks: HashMap::new(),
        }
    }

    pub fn push(&mut self, id: TrackId, point: na::Point2<f32>) {
        self.tracks
            .entry(id)
            .or_insert_with(|| Trajectory::with_capacity(TRAJECTORY_CAPACITY))
            .push(point);
    }

    #[inline]
    pub fn get(&self, id: TrackId) -> Option<&Trajectory> {
        self.tracks.get(&id)
    }

    pub fn remove(&mut self, id: TrackId) {
        self.tracks.remove(&id);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
