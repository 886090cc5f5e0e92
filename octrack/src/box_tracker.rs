//! Single-object Kalman box tracker with observation-centric recovery

use crate::bbox::BBox;
use crate::detection::{AppearanceBank, Detection, REID_DIM};
use crate::kalman::{KalmanFilter, KalmanFilterParams};
use crate::transform::Warp;
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;

/// Measurement in `(x, y, s, r)` space.
type Measurement = [f32; 4];

/// Rollback state captured after every matched update, used by ORU to
/// replay the filter over an occlusion gap.
#[derive(Debug, Clone)]
struct OruSnapshot {
    x: DVector<f32>,
    p: DMatrix<f32>,
    age: u32,
}

/// Unit direction `(dy, dx)` of the center motion from one box to another.
///
/// The `(dy, dx)` ordering matches the official OC-SORT convention.
pub(crate) fn speed_direction(from: &BBox, to: &BBox) -> [f32; 2] {
    let dx = to.center_x() - from.center_x();
    let dy = to.center_y() - from.center_y();
    let norm = (dx * dx + dy * dy).sqrt() + 1e-6;
    [dy / norm, dx / norm]
}

/// Kalman filter-based single object tracker.
///
/// Uses a 7-state constant velocity model:
/// state `[x, y, s, r, vx, vy, vs]` where `(x, y)` is the bbox center,
/// `s` the area and `r` the aspect ratio; measurement `[x, y, s, r]`.
///
/// On top of the plain SORT tracker this keeps the observation history
/// needed by OC-SORT: the last observation (for OCR), a per-age observation
/// map (for OCM lookback), a per-frame measurement history plus a state
/// snapshot (for ORU), and a bounded appearance bank (for ReID-assisted
/// association).
#[derive(Debug, Clone)]
pub struct KalmanBoxTracker {
    track_id: u32,
    time_since_update: u32,
    hits: u32,
    hit_streak: u32,
    age: u32,
    delta_t: u32,

    kf: KalmanFilter,

    last_observation: Option<Detection>,
    observations_by_age: BTreeMap<u32, Detection>,
    velocity_dir: Option<[f32; 2]>,

    appearance: AppearanceBank,

    // ORU bookkeeping: one entry per frame since creation.
    oru_history: Vec<Option<Measurement>>,
    oru_observed: bool,
    oru_snapshot: Option<OruSnapshot>,
}

impl KalmanBoxTracker {
    pub fn new(det: &Detection, track_id: u32, delta_t: u32) -> Self {
        let z = det.bbox.to_measurement();

        let f = {
            // Constant velocity: x += vx, y += vy, s += vs, r constant.
            let mut f = DMatrix::<f32>::identity(7, 7);
            f[(0, 4)] = 1.0;
            f[(1, 5)] = 1.0;
            f[(2, 6)] = 1.0;
            f
        };

        let mut h = DMatrix::<f32>::zeros(4, 7);
        for i in 0..4 {
            h[(i, i)] = 1.0;
        }

        // SORT / OC-SORT noise defaults. The official implementation scales
        // Q[-1,-1] by 0.01 twice (once alone, once as part of the velocity
        // block), so the scale-velocity entry ends up at 1e-4, not 1e-2.
        let q = DMatrix::from_diagonal(&DVector::from_vec(vec![
            1.0, 1.0, 1.0, 1.0, 0.01, 0.01, 0.0001,
        ]));
        let r = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 1.0, 10.0, 10.0]));
        // P[4:,4:] *= 1000, then P *= 10.
        let p = DMatrix::from_diagonal(&DVector::from_vec(vec![
            10.0, 10.0, 10.0, 10.0, 10000.0, 10000.0, 10000.0,
        ]));

        let kf = KalmanFilter::new(KalmanFilterParams {
            dim_x: 7,
            dim_z: 4,
            x: DVector::from_vec(vec![z[0], z[1], z[2], z[3], 0.0, 0.0, 0.0]),
            p,
            f,
            h,
            r,
            q,
        });

        let mut appearance = AppearanceBank::new();
        if let Some(reid) = &det.reid {
            appearance.offer(&reid.feature, reid.quality);
        }

        let snapshot = OruSnapshot {
            x: kf.x.clone(),
            p: kf.p.clone(),
            age: 0,
        };

        let mut observations_by_age = BTreeMap::new();
        observations_by_age.insert(0, *det);

        Self {
            track_id,
            time_since_update: 0,
            hits: 1,
            hit_streak: 1,
            age: 0,
            delta_t,
            kf,
            last_observation: Some(*det),
            observations_by_age,
            velocity_dir: None,
            appearance,
            oru_history: vec![Some(z)],
            oru_observed: true,
            oru_snapshot: Some(snapshot),
        }
    }

    /// Advance the filter one frame and return the predicted box.
    pub fn predict(&mut self) -> BBox {
        self.predict_state();
        self.age += 1;
        if self.time_since_update > 0 {
            self.hit_streak = 0;
        }
        self.time_since_update += 1;
        self.state_bbox()
    }

    /// Update with the frame's outcome: a matched detection or none.
    ///
    /// Must be called once per frame after [`predict`](Self::predict), even
    /// for unmatched tracks (`None`) -- the ORU gap detection depends on the
    /// per-frame history staying aligned with the frame counter.
    pub fn update(&mut self, det: Option<&Detection>) {
        let det = match det {
            Some(d) => d,
            None => {
                self.oru_history.push(None);
                self.oru_observed = false;
                return;
            }
        };

        let z = det.bbox.to_measurement();
        self.oru_history.push(Some(z));

        if !self.oru_observed {
            // Re-activation after a gap: replay the filter over a virtual
            // straight-line trajectory before applying the real update.
            self.run_observation_recovery(&z);
        }

        // Observation-centric momentum direction, measured against the
        // observation delta_t frames back (or the nearest older one).
        if let Some(last) = &self.last_observation {
            let mut prev = *last;
            for i in 0..self.delta_t {
                let dt = self.delta_t - i;
                if let Some(older) = self
                    .age
                    .checked_sub(dt)
                    .and_then(|a| self.observations_by_age.get(&a))
                {
                    prev = *older;
                    break;
                }
            }
            self.velocity_dir = Some(speed_direction(&prev.bbox, &det.bbox));
        }

        self.time_since_update = 0;
        self.hits += 1;
        self.hit_streak += 1;

        self.last_observation = Some(*det);
        self.observations_by_age.insert(self.age, *det);

        if let Some(reid) = &det.reid {
            self.appearance.offer(&reid.feature, reid.quality);
        }

        self.kf
            .update(&DVector::from_vec(vec![z[0], z[1], z[2], z[3]]));

        self.oru_snapshot = Some(OruSnapshot {
            x: self.kf.x.clone(),
            p: self.kf.p.clone(),
            age: self.age,
        });
        self.oru_observed = true;
    }

    /// Current filter state as a bounding box.
    pub fn get_state(&self) -> BBox {
        self.state_bbox()
    }

    /// Apply a global motion warp (prev frame -> current frame) to the whole
    /// track state: filter box and velocities, the observation history used
    /// by OCM/OCR, the ORU measurement history and the ORU snapshot.
    pub fn apply_warp(&mut self, warp: &Warp, frame_width: u32, frame_height: u32) {
        if frame_width == 0 || frame_height == 0 {
            return;
        }

        let warped = warp.apply_bbox_norm(&self.state_bbox(), frame_width, frame_height);
        let z = warped.to_measurement();
        for (i, v) in z.iter().enumerate() {
            self.kf.x[i] = *v;
        }

        // Velocity transport uses only the affine part; projective terms are
        // negligible for the camera motions GMC produces.
        let w = frame_width as f32;
        let h = frame_height as f32;
        let vx_px = self.kf.x[4] * w;
        let vy_px = self.kf.x[5] * h;
        self.kf.x[4] = (warp.at(0, 0) * vx_px + warp.at(0, 1) * vy_px) / w;
        self.kf.x[5] = (warp.at(1, 0) * vx_px + warp.at(1, 1) * vy_px) / h;

        let det_a = warp.affine_determinant();
        if det_a.is_finite() && det_a > 0.0 {
            self.kf.x[6] *= det_a;
        }

        if let Some(obs) = &mut self.last_observation {
            obs.bbox = warp.apply_bbox_norm(&obs.bbox, frame_width, frame_height);
        }
        for obs in self.observations_by_age.values_mut() {
            obs.bbox = warp.apply_bbox_norm(&obs.bbox, frame_width, frame_height);
        }
        for entry in self.oru_history.iter_mut().flatten() {
            let b = BBox::from_measurement(entry);
            let wb = warp.apply_bbox_norm(&b, frame_width, frame_height);
            *entry = wb.to_measurement();
        }
        if let Some(snapshot) = &mut self.oru_snapshot {
            let saved = [snapshot.x[0], snapshot.x[1], snapshot.x[2], snapshot.x[3]];
            let b = BBox::from_measurement(&saved);
            let wb = warp.apply_bbox_norm(&b, frame_width, frame_height);
            let zs = wb.to_measurement();
            for (i, v) in zs.iter().enumerate() {
                snapshot.x[i] = *v;
            }
        }

        // Recomputed from observations on the next matched update.
        self.velocity_dir = None;
    }

    pub fn track_id(&self) -> u32 {
        self.track_id
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn hit_streak(&self) -> u32 {
        self.hit_streak
    }

    pub fn time_since_update(&self) -> u32 {
        self.time_since_update
    }

    pub fn last_observation(&self) -> Option<&Detection> {
        self.last_observation.as_ref()
    }

    /// Track inertia direction as a `(dy, dx)` unit vector, when known.
    pub fn velocity_dir(&self) -> Option<[f32; 2]> {
        self.velocity_dir
    }

    pub fn has_appearance(&self) -> bool {
        !self.appearance.is_empty()
    }

    /// Published appearance prototype (quality-weighted bank mean).
    pub fn appearance(&self) -> Option<&[f32; REID_DIM]> {
        self.appearance.prototype()
    }

    /// Observation from up to `k` ages ago, falling back to the most recent
    /// one. `None` only when the track has never been observed.
    pub fn k_previous_observation(&self, k: u32) -> Option<&Detection> {
        for i in 0..k {
            let dt = k - i;
            if let Some(obs) = self
                .age
                .checked_sub(dt)
                .and_then(|a| self.observations_by_age.get(&a))
            {
                return Some(obs);
            }
        }
        self.observations_by_age.values().next_back()
    }

    /// One filter step without touching the track counters. Shared by the
    /// public predict and the ORU replay loop.
    fn predict_state(&mut self) {
        // A negative predicted area would make the measurement mapping
        // meaningless; freeze the area velocity instead.
        if self.kf.x[6] + self.kf.x[2] <= 0.0 {
            self.kf.x[6] = 0.0;
        }
        self.kf.predict();
    }

    fn state_bbox(&self) -> BBox {
        let z = [self.kf.x[0], self.kf.x[1], self.kf.x[2], self.kf.x[3]];
        BBox::from_measurement(&z)
    }

    /// ORU: roll the filter back to the last matched state and replay it
    /// over the gap with a linearly interpolated virtual trajectory between
    /// the two most recent real observations. Leaves the filter predicted to
    /// the current frame; the caller applies the real update afterwards.
    fn run_observation_recovery(&mut self, current: &Measurement) {
        let snapshot = match &self.oru_snapshot {
            Some(s) => s.clone(),
            None => return,
        };
        debug_assert!(snapshot.age <= self.age);

        // The two most recent real observations; `current` was already
        // pushed, so idx2 points at it.
        let mut idx2 = None;
        let mut idx1 = None;
        for (i, entry) in self.oru_history.iter().enumerate().rev() {
            if entry.is_some() {
                if idx2.is_none() {
                    idx2 = Some(i);
                } else {
                    idx1 = Some(i);
                    break;
                }
            }
        }
        let (idx1, idx2) = match (idx1, idx2) {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };

        let gap = idx2 - idx1;
        if gap < 2 {
            return;
        }

        let prev = self.oru_history[idx1].expect("idx1 indexes a real observation");

        self.kf.x = snapshot.x;
        self.kf.p = snapshot.p;

        let (x1, y1, w1, h1) = measurement_to_xywh(&prev);
        let (x2, y2, w2, h2) = measurement_to_xywh(current);

        for i in 1..gap {
            let alpha = i as f32 / gap as f32;
            let xi = x1 + alpha * (x2 - x1);
            let yi = y1 + alpha * (y2 - y1);
            let wi = w1 + alpha * (w2 - w1);
            let hi = h1 + alpha * (h2 - h1);

            self.predict_state();
            let z = xywh_to_measurement(xi, yi, wi, hi);
            self.kf
                .update(&DVector::from_vec(vec![z[0], z[1], z[2], z[3]]));
        }

        // Bring the filter to the current frame.
        self.predict_state();
    }
}

fn measurement_to_xywh(z: &Measurement) -> (f32, f32, f32, f32) {
    let s = z[2].max(1e-6);
    let r = z[3].max(1e-6);
    let w = (s * r).max(0.0).sqrt();
    let h = if w > 0.0 { s / w } else { 0.0 };
    (z[0], z[1], w, h)
}

fn xywh_to_measurement(x: f32, y: f32, w: f32, h: f32) -> Measurement {
    let w = w.max(1e-6);
    let h = h.max(1e-6);
    [x, y, w * h, w / h]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn det_at(cx: f32, cy: f32, w: f32, h: f32, score: f32) -> Detection {
        Detection::new(
            BBox::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0),
            score,
        )
    }

    #[test]
    fn test_counters_follow_predict_update_cycle() {
        let mut trk = KalmanBoxTracker::new(&det_at(0.2, 0.5, 0.1, 0.1, 0.9), 7, 3);
        assert_eq!(trk.track_id(), 7);
        assert_eq!(trk.hits(), 1);
        assert_eq!(trk.hit_streak(), 1);
        assert_eq!(trk.age(), 0);

        trk.predict();
        assert_eq!(trk.age(), 1);
        assert_eq!(trk.time_since_update(), 1);

        trk.update(Some(&det_at(0.25, 0.5, 0.1, 0.1, 0.9)));
        assert_eq!(trk.hits(), 2);
        assert_eq!(trk.hit_streak(), 2);
        assert_eq!(trk.time_since_update(), 0);

        // Two prediction-only frames break the streak.
        trk.predict();
        trk.update(None);
        trk.predict();
        trk.update(None);
        assert_eq!(trk.hit_streak(), 0);
        assert_eq!(trk.time_since_update(), 2);
    }

    #[test]
    fn test_velocity_dir_points_along_motion() {
        let mut trk = KalmanBoxTracker::new(&det_at(0.2, 0.5, 0.1, 0.1, 0.9), 0, 3);
        trk.predict();
        trk.update(Some(&det_at(0.3, 0.5, 0.1, 0.1, 0.9)));
        let dir = trk.velocity_dir().unwrap();
        // (dy, dx) convention: pure +x motion.
        assert_abs_diff_eq!(dir[0], 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(dir[1], 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_oru_recovers_velocity_after_occlusion() {
        // Observe motion to the right, lose the object for five frames,
        // re-observe far to the right; the replayed filter must come out of
        // the gap with positive x velocity.
        let mut trk = KalmanBoxTracker::new(&det_at(0.20, 0.50, 0.10, 0.10, 1.0), 0, 3);

        for f in 1..=2 {
            trk.predict();
            let cx = 0.20 + 0.05 * f as f32;
            trk.update(Some(&det_at(cx, 0.50, 0.10, 0.10, 1.0)));
        }

        for _ in 3..=7 {
            trk.predict();
            trk.update(None);
        }

        trk.predict();
        trk.update(Some(&det_at(0.80, 0.50, 0.10, 0.10, 1.0)));
        let cx8 = trk.get_state().center_x();

        let b9 = trk.predict();
        let cx9 = b9.center_x();

        assert!(
            cx9 > cx8 + 0.02,
            "expected positive velocity after recovery (cx8={cx8:.4}, cx9={cx9:.4})"
        );
    }

    #[test]
    fn test_identity_warp_is_noop_on_state() {
        let mut trk = KalmanBoxTracker::new(&det_at(0.3, 0.4, 0.1, 0.2, 0.9), 0, 3);
        trk.predict();
        trk.update(Some(&det_at(0.32, 0.4, 0.1, 0.2, 0.9)));

        let before = trk.get_state();
        let vel_before = [trk.kf.x[4], trk.kf.x[5], trk.kf.x[6]];
        trk.apply_warp(&Warp::identity(), 640, 480);
        let after = trk.get_state();

        assert_abs_diff_eq!(before.x1, after.x1, epsilon = 1e-6);
        assert_abs_diff_eq!(before.y1, after.y1, epsilon = 1e-6);
        assert_abs_diff_eq!(before.x2, after.x2, epsilon = 1e-6);
        assert_abs_diff_eq!(before.y2, after.y2, epsilon = 1e-6);
        assert_abs_diff_eq!(trk.kf.x[4], vel_before[0], epsilon = 1e-6);
        assert_abs_diff_eq!(trk.kf.x[5], vel_before[1], epsilon = 1e-6);
        assert_abs_diff_eq!(trk.kf.x[6], vel_before[2], epsilon = 1e-6);
    }

    #[test]
    fn test_translation_warp_moves_state_and_observations() {
        let mut trk = KalmanBoxTracker::new(&det_at(0.3, 0.4, 0.1, 0.1, 0.9), 0, 3);
        // +64px on a 640-wide frame = +0.1 normalized.
        trk.apply_warp(&Warp::from_translation(64.0, 0.0), 640, 480);

        assert_abs_diff_eq!(trk.get_state().center_x(), 0.4, epsilon = 1e-4);
        let obs = trk.last_observation().unwrap();
        assert_abs_diff_eq!(obs.bbox.center_x(), 0.4, epsilon = 1e-4);
        assert!(trk.velocity_dir().is_none());
    }

    #[test]
    fn test_k_previous_observation_lookback() {
        let mut trk = KalmanBoxTracker::new(&det_at(0.2, 0.5, 0.1, 0.1, 0.9), 0, 3);
        trk.predict();
        trk.update(Some(&det_at(0.25, 0.5, 0.1, 0.1, 0.9)));
        trk.predict();
        trk.update(Some(&det_at(0.30, 0.5, 0.1, 0.1, 0.9)));

        // age == 2; looking back 2 ages reaches the initial observation.
        let prev = trk.k_previous_observation(2).unwrap();
        assert_abs_diff_eq!(prev.bbox.center_x(), 0.2, epsilon = 1e-5);

        // Looking back further than history falls back to the oldest entry
        // reachable within k, which is still the initial observation.
        let prev = trk.k_previous_observation(10).unwrap();
        assert_abs_diff_eq!(prev.bbox.center_x(), 0.2, epsilon = 1e-5);
    }

    #[test]
    fn test_negative_area_prediction_is_guarded() {
        let mut trk = KalmanBoxTracker::new(&det_at(0.5, 0.5, 0.05, 0.05, 0.9), 0, 3);
        // Force a large negative area velocity.
        trk.kf.x[6] = -1.0;
        let b = trk.predict();
        assert!(b.width() >= 0.0);
        assert!(trk.kf.x[2] > 0.0 || trk.kf.x[2].abs() < 1e-6);
    }
}
