use std::collections::HashMap;

use nalgebra as na;
use num_traits::Float;

use crate::track::TrackId;

const MEASUREMENT_NOISE: f32 = 5.0;
const PROCESS_NOISE: f32 = 0.1;

/// Constant-velocity filter over {x, y, vx, vy}, observing position only.
///
/// Objects of interest move smoothly at video frame rates, so a linear
/// constant-velocity model gives usable short-horizon extrapolation through
/// occlusions without acceleration terms.
#[derive(Debug, Clone)]
pub struct KalmanFilter<F>
where
    F: na::RealField + Float,
{
    x: na::Vector4<F>,
    p: na::Matrix4<F>,
    f: na::Matrix4<F>,
    h: na::Matrix2x4<F>,
    q: na::Matrix4<F>,
    r: na::Matrix2<F>,
}

impl<F> KalmanFilter<F>
where
    F: na::RealField + Float,
{
    pub fn new(center: na::Point2<F>) -> Self {
        let mut f = na::Matrix4::identity();
        f[(0, 2)] = F::one();
        f[(1, 3)] = F::one();

        let mut h = na::Matrix2x4::zeros();
        h[(0, 0)] = F::one();
        h[(1, 1)] = F::one();

        Self {
            x: na::Vector4::new(center.x, center.y, F::zero(), F::zero()),
            p: na::Matrix4::identity(),
            f,
            h,
            q: na::Matrix4::identity() * F::from(PROCESS_NOISE).unwrap(),
            r: na::Matrix2::identity() * F::from(MEASUREMENT_NOISE).unwrap(),
        }
    }

    /// Advances the state one step: x ← Fx, P ← FPFᵀ + Q. A true step, not a
    /// peek; two calls without an update in between advance twice.
    pub fn predict(&mut self) -> na::Point2<F> {
        self.x = self.f * self.x;
        self.p = self.f * self.p * self.f.transpose() + self.q;

        na::Point2::new(self.x[0], self.x[1])
    }

    /// Fuses a measured center into the state.
    pub fn update(&mut self, z: na::Point2<F>) {
        let y = na::Vector2::new(z.x, z.y) - self.h * self.x;
        let s = self.h * self.p * self.h.transpose() + self.r;

        // R keeps S positive definite; a non-invertible S only arises from
        // externally corrupted state
        let si = match s.try_inverse() {
            Some(si) => si,
            None => return,
        };

        let k = self.p * self.h.transpose() * si;
        self.x += k * y;

        // Joseph form keeps P symmetric
        let ikh = na::Matrix4::identity() - k * self.h;
        self.p = ikh * self.p * ikh.transpose() + k * self.r * k.transpose();
    }

    #[inline]
    pub fn position(&self) -> na::Point2<F> {
        na::Point2::new(self.x[0], self.x[1])
    }

    #[inline]
    pub fn velocity(&self) -> na::Vector2<F> {
        na::Vector2::new(self.x[2], self.x[3])
    }
}

/// Identity-indexed bank of owned filter states.
///
/// All lookups against absent identities are benign: `predict` returns
/// `None`, `update` and `remove` are no-ops.
#[derive(Debug)]
pub struct FilterBank<F>
where
    F: na::RealField + Float,
{
    filters: HashMap<TrackId, KalmanFilter<F>>,
}

impl<F> FilterBank<F>
where
    F: na::RealField + Float,
{
    pub fn new() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }

    /// Creates a state at `center` with zero velocity, replacing any
    /// previous state for the identity.
    pub fn initialize(&mut self, id: TrackId, center: na::Point2<F>) {
        self.filters.insert(id, KalmanFilter::new(center));
    }

    pub fn predict(&mut self, id: TrackId) -> Option<na::Point2<F>> {
        self.filters.get_mut(&id).map(|kf| kf.predict())
    }

    pub fn update(&mut self, id: TrackId, center: na::Point2<F>) {
        if let Some(kf) = self.filters.get_mut(&id) {
            kf.update(center);
        }
    }

    pub fn remove(&mut self, id: TrackId) {
        self.filters.remove(&id);
    }

    #[inline]
    pub fn contains(&self, id: TrackId) -> bool {
        self.filters.contains_key(&id)
    }

    #[inline]
    pub fn get(&self, id: TrackId) -> Option<&KalmanFilter<F>> {
        self.filters.get(&id)
    }

    #[inline]
    pub fn ids(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.filters.keys().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl<F> Default for FilterBank<F>
where
    F: na::RealField + Float,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn tracked_filter() -> KalmanFilter<f32> {
        // measurements moving +2px in x per frame build up velocity
        let mut kf = KalmanFilter::new(na::Point2::new(0.0f32, 0.0));
        for i in 1..=6 {
            kf.predict();
            kf.update(na::Point2::new(2.0 * i as f32, 0.0));
        }
        kf
    }

    #[test]
    fn initial_state_has_zero_velocity() {
        let kf = KalmanFilter::new(na::Point2::new(10.0f32, 20.0));

        assert_abs_diff_eq!(kf.position().x, 10.0);
        assert_abs_diff_eq!(kf.position().y, 20.0);
        assert_abs_diff_eq!(kf.velocity().x, 0.0);
        assert_abs_diff_eq!(kf.velocity().y, 0.0);
    }

    #[test]
    fn measurements_build_velocity() {
        let kf = tracked_filter();

        assert!(kf.velocity().x > 0.5);
        assert_abs_diff_eq!(kf.velocity().y, 0.0, epsilon = 1e-4);
        assert!((kf.position().x - 12.0).abs() < 4.0);
    }

    #[test]
    fn predict_is_a_step_not_a_peek() {
        let mut kf = tracked_filter();

        let first = kf.predict();
        let second = kf.predict();

        assert!(second.x > first.x);
    }

    #[test]
    fn noiseless_feedback_leaves_velocity_unchanged() {
        let mut kf = tracked_filter();

        let predicted = kf.predict();
        let velocity = kf.velocity();
        kf.update(predicted);

        assert_abs_diff_eq!(kf.velocity().x, velocity.x, epsilon = 1e-6);
        assert_abs_diff_eq!(kf.velocity().y, velocity.y, epsilon = 1e-6);
        assert_abs_diff_eq!(kf.position().x, predicted.x, epsilon = 1e-6);
    }

    #[test]
    fn bank_lookup_misses_are_noops() {
        let mut bank = FilterBank::<f32>::new();

        assert_eq!(bank.predict(7), None);
        bank.update(7, na::Point2::new(1.0, 1.0));
        bank.remove(7);
        bank.remove(7);
        assert!(bank.is_empty());
    }

    #[test]
    fn bank_initialize_replaces_existing_state() {
        let mut bank = FilterBank::<f32>::new();
        bank.initialize(1, na::Point2::new(0.0, 0.0));
        bank.predict(1);
        bank.initialize(1, na::Point2::new(50.0, 60.0));

        let kf = bank.get(1).unwrap();
        assert_abs_diff_eq!(kf.position().x, 50.0);
        assert_abs_diff_eq!(kf.velocity().x, 0.0);
    }

    #[test]
    fn bank_predict_advances_stored_state() {
        let mut bank = FilterBank::<f32>::new();
        bank.initialize(3, na::Point2::new(5.0, 5.0));

        let p = bank.predict(3).unwrap();

        // zero velocity: position holds, but the step still ran
        assert_abs_diff_eq!(p.x, 5.0);
        assert_abs_diff_eq!(p.y, 5.0);
        assert!(bank.contains(3));
        assert_eq!(bank.len(), 1);
    }
}
