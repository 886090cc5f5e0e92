//! OC-SORT: observation-centric multi-object tracking engine
//!
//! Ties the per-track Kalman filters together with two association passes
//! per frame: a primary pass on predicted-state IoU augmented with
//! observation-centric momentum and an optional appearance bonus, and a
//! recovery pass (OCR) on last-observation IoU for whatever is left.

use crate::bbox::{iou_matrix, BBox};
use crate::box_tracker::{speed_direction, KalmanBoxTracker};
use crate::detection::{cosine_similarity, Detection, REID_DIM};
use crate::hungarian::HungarianSolver;
use crate::transform::Warp;
use ndarray::Array2;
use std::collections::BTreeMap;
use std::f32::consts::PI;

/// Score assigned to geometry-gated pairs so the solver never picks them.
const GATED_SCORE: f32 = -1e6;

/// Which counter confirms a track.
///
/// `Auto` follows official OC-SORT: consecutive hits normally,
/// total hits in `return_all` mode (a hit-streak gate would "un-confirm"
/// tracks on prediction-only frames, which sparse-detection pipelines hit
/// constantly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmationPolicy {
    #[default]
    Auto,
    HitStreak,
    TotalHits,
}

/// Engine configuration. Immutable for the lifetime of an engine instance.
#[derive(Debug, Clone)]
pub struct OcSortConfig {
    /// Minimum IoU for any detection-track pairing.
    pub iou_thresh: f32,
    /// Frames a track may go unmatched before removal.
    pub max_age: u32,
    /// Matched frames required before a track is emitted.
    pub min_hits: u32,
    /// OCM lookback window in frames.
    pub delta_t: u32,
    /// OCM weight in the association score.
    pub inertia: f32,
    /// Enable appearance-assisted association.
    pub use_reid: bool,
    /// Appearance weight in association scores.
    pub reid_weight: f32,
    /// Cosine similarity gate for appearance terms.
    pub reid_cos_thresh: f32,
    pub confirmation: ConfirmationPolicy,
}

impl Default for OcSortConfig {
    fn default() -> Self {
        Self {
            iou_thresh: 0.15,
            max_age: 30,
            min_hits: 3,
            delta_t: 3,
            inertia: 0.2,
            use_reid: false,
            reid_weight: 0.35,
            reid_cos_thresh: 0.35,
            confirmation: ConfirmationPolicy::default(),
        }
    }
}

/// Per-frame output for one confirmed track.
#[derive(Debug, Clone, Copy)]
pub struct TrackResult {
    pub bbox: BBox,
    pub confidence: f32,
}

/// Observation-centric momentum term: rewards detections whose motion
/// direction from a past observation agrees with the track's stored
/// direction, scaled by the configured inertia and the detection score.
pub(crate) fn ocm_cost(
    inertia_dir: [f32; 2],
    prev_obs: &BBox,
    det: &BBox,
    det_score: f32,
    inertia: f32,
) -> f32 {
    let dir = speed_direction(prev_obs, det);
    let cos = (inertia_dir[1] * dir[1] + inertia_dir[0] * dir[0]).clamp(-1.0, 1.0);
    let angle = cos.acos();
    let diff = (PI / 2.0 - angle.abs()) / PI;
    diff * inertia * det_score
}

/// The OC-SORT multi-object tracker.
///
/// Owns every live track exclusively; tracks are addressed externally by
/// their stable `track_id`.
pub struct OcSort {
    config: OcSortConfig,
    trackers: Vec<KalmanBoxTracker>,
    next_id: u32,
    frame_count: u32,
    finished_appearances: BTreeMap<u32, [f32; REID_DIM]>,
}

impl OcSort {
    pub fn new(config: OcSortConfig) -> Self {
        Self {
            config,
            trackers: Vec::new(),
            next_id: 0,
            frame_count: 0,
            finished_appearances: BTreeMap::new(),
        }
    }

    /// Advance one frame.
    ///
    /// `warp` is an optional GMC transform mapping the previous frame's
    /// coordinates into the current frame's (applied to every track after
    /// prediction, so association runs in a single reference frame);
    /// `frame_width`/`frame_height` are the current frame's pixel
    /// dimensions and are required for warp application.
    ///
    /// Returns confirmed tracks keyed by id (ascending). In the default
    /// mode only tracks updated this frame are emitted; with `return_all`
    /// prediction-only frames are emitted too, with decayed confidence.
    pub fn update(
        &mut self,
        detections: &[Detection],
        return_all: bool,
        warp: Option<&Warp>,
        frame_width: u32,
        frame_height: u32,
    ) -> BTreeMap<u32, TrackResult> {
        self.frame_count += 1;

        for tracker in &mut self.trackers {
            tracker.predict();
        }

        if let Some(warp) = warp {
            if frame_width > 0 && frame_height > 0 {
                for tracker in &mut self.trackers {
                    tracker.apply_warp(warp, frame_width, frame_height);
                }
            }
        }

        let (matched, mut unmatched_dets, mut unmatched_trackers) = self.associate(detections);
        for &(d_idx, t_idx) in &matched {
            self.trackers[t_idx].update(Some(&detections[d_idx]));
        }

        let ocr_matched =
            self.associate_ocr(detections, &mut unmatched_dets, &mut unmatched_trackers);
        for &(d_idx, t_idx) in &ocr_matched {
            self.trackers[t_idx].update(Some(&detections[d_idx]));
        }

        // Unmatched tracks still need their per-frame history entry for ORU.
        for &t_idx in &unmatched_trackers {
            self.trackers[t_idx].update(None);
        }

        for &d_idx in &unmatched_dets {
            self.trackers.push(KalmanBoxTracker::new(
                &detections[d_idx],
                self.next_id,
                self.config.delta_t,
            ));
            self.next_id += 1;
        }

        // Retire expired tracks, keeping their appearance for the offline
        // linking stage.
        let max_age = self.config.max_age;
        let finished = &mut self.finished_appearances;
        self.trackers.retain(|t| {
            if t.time_since_update() > max_age {
                if let Some(proto) = t.appearance() {
                    finished.insert(t.track_id(), *proto);
                }
                false
            } else {
                true
            }
        });

        self.emit(return_all)
    }

    /// Reset all tracking state (call at scene boundaries).
    pub fn reset(&mut self) {
        self.trackers.clear();
        self.next_id = 0;
        self.finished_appearances.clear();
    }

    pub fn num_trackers(&self) -> usize {
        self.trackers.len()
    }

    /// Drain the appearance prototypes of retired tracks.
    pub fn take_finished_appearances(&mut self) -> BTreeMap<u32, [f32; REID_DIM]> {
        std::mem::take(&mut self.finished_appearances)
    }

    /// Snapshot of the appearance prototypes of live tracks.
    pub fn active_appearances(&self) -> BTreeMap<u32, [f32; REID_DIM]> {
        self.trackers
            .iter()
            .filter_map(|t| t.appearance().map(|a| (t.track_id(), *a)))
            .collect()
    }

    fn emit(&self, return_all: bool) -> BTreeMap<u32, TrackResult> {
        let min_hits = self.config.min_hits;
        let mut result = BTreeMap::new();

        for tracker in &self.trackers {
            let gate = match self.config.confirmation {
                ConfirmationPolicy::HitStreak => tracker.hit_streak() >= min_hits,
                ConfirmationPolicy::TotalHits => tracker.hits() >= min_hits,
                ConfirmationPolicy::Auto => {
                    if return_all {
                        tracker.hits() >= min_hits
                    } else {
                        tracker.hit_streak() >= min_hits
                    }
                }
            };
            let confirmed = gate || self.frame_count <= min_hits;
            if !confirmed {
                continue;
            }

            if !return_all && tracker.time_since_update() >= 1 {
                continue;
            }

            // Prefer the most recent observation when updated this frame,
            // otherwise the prediction; decay confidence on prediction
            // frames.
            let mut bbox = tracker.get_state();
            let mut confidence = 1.0;
            if let Some(obs) = tracker.last_observation() {
                confidence = obs.score;
                if tracker.time_since_update() == 0 {
                    bbox = obs.bbox;
                }
            }
            if tracker.time_since_update() > 0 {
                confidence *= (1.0 - 0.05 * tracker.time_since_update() as f32).max(0.0);
            }

            result.insert(tracker.track_id(), TrackResult { bbox, confidence });
        }

        result
    }

    /// Primary association: IoU of detections against predicted states,
    /// augmented with OCM and (when enabled) a gated appearance bonus.
    #[allow(clippy::type_complexity)]
    fn associate(
        &self,
        detections: &[Detection],
    ) -> (Vec<(usize, usize)>, Vec<usize>, Vec<usize>) {
        let n_dets = detections.len();
        let n_trks = self.trackers.len();

        if n_trks == 0 {
            return (Vec::new(), (0..n_dets).collect(), Vec::new());
        }
        if n_dets == 0 {
            return (Vec::new(), Vec::new(), (0..n_trks).collect());
        }

        let cfg = &self.config;
        let det_boxes: Vec<BBox> = detections.iter().map(|d| d.bbox).collect();
        let predicted: Vec<BBox> = self.trackers.iter().map(|t| t.get_state()).collect();
        let ious = iou_matrix(&det_boxes, &predicted);

        let mut scores = Array2::<f32>::zeros((n_dets, n_trks));
        let mut max_score = f32::NEG_INFINITY;
        for d in 0..n_dets {
            for t in 0..n_trks {
                let iou = ious[[d, t]];
                let tracker = &self.trackers[t];

                let mut angle_cost = 0.0;
                if let Some(prev) = tracker.k_previous_observation(cfg.delta_t) {
                    let inertia_dir = tracker.velocity_dir().unwrap_or([0.0, 0.0]);
                    angle_cost = ocm_cost(
                        inertia_dir,
                        &prev.bbox,
                        &detections[d].bbox,
                        detections[d].score,
                        cfg.inertia,
                    );
                }

                let mut reid_bonus = 0.0;
                // Geometry first: appearance only influences pairs that
                // already overlap, which rules out appearance-only
                // "teleport" matches under a shaky camera.
                if iou >= cfg.iou_thresh && cfg.use_reid {
                    if let (Some(sample), Some(proto)) =
                        (&detections[d].reid, tracker.appearance())
                    {
                        let sim = cosine_similarity(&sample.feature, proto);
                        if sim >= cfg.reid_cos_thresh {
                            reid_bonus = cfg.reid_weight * (sim + 1.0) * 0.5;
                        }
                    }
                }

                let total = if iou >= cfg.iou_thresh {
                    let total = iou + angle_cost + reid_bonus;
                    max_score = max_score.max(total);
                    total
                } else {
                    GATED_SCORE
                };
                scores[[d, t]] = total;
            }
        }

        // Fast path: unique 1-1 overlaps need no solver. Only valid without
        // appearance, where the IoU structure alone decides the matching.
        let assignment: Vec<i32> = if !cfg.use_reid && has_unique_overlaps(&ious, cfg.iou_thresh) {
            (0..n_dets)
                .map(|d| {
                    (0..n_trks)
                        .find(|&t| ious[[d, t]] > cfg.iou_thresh)
                        .map_or(-1, |t| t as i32)
                })
                .collect()
        } else {
            let shift = if max_score.is_finite() { max_score } else { 0.0 };
            let cost = Array2::from_shape_fn((n_dets, n_trks), |(d, t)| {
                f64::from(shift - scores[[d, t]])
            });
            HungarianSolver::solve(cost.view())
        };

        let mut matched = Vec::new();
        let mut det_matched = vec![false; n_dets];
        let mut trk_matched = vec![false; n_trks];
        for (d, &t) in assignment.iter().enumerate() {
            if t < 0 {
                continue;
            }
            let t = t as usize;
            if ious[[d, t]] >= cfg.iou_thresh {
                matched.push((d, t));
                det_matched[d] = true;
                trk_matched[t] = true;
            }
        }

        let unmatched_dets = (0..n_dets).filter(|&d| !det_matched[d]).collect();
        let unmatched_trks = (0..n_trks).filter(|&t| !trk_matched[t]).collect();
        (matched, unmatched_dets, unmatched_trks)
    }

    /// Observation-centric recovery: a second pass over still-unmatched
    /// pairs, scored on last-observation IoU blended with appearance.
    fn associate_ocr(
        &self,
        detections: &[Detection],
        unmatched_dets: &mut Vec<usize>,
        unmatched_trackers: &mut Vec<usize>,
    ) -> Vec<(usize, usize)> {
        if unmatched_dets.is_empty() || unmatched_trackers.is_empty() || detections.is_empty() {
            return Vec::new();
        }

        let cfg = &self.config;
        let n_dets = unmatched_dets.len();
        let n_trks = unmatched_trackers.len();

        let mut ious = Array2::<f32>::zeros((n_dets, n_trks));
        let mut sims = Array2::<f32>::from_elem((n_dets, n_trks), -1.0);
        let mut sim_valid = Array2::<bool>::from_elem((n_dets, n_trks), false);
        let mut max_iou = 0.0f32;

        for (di, &d_idx) in unmatched_dets.iter().enumerate() {
            for (ti, &t_idx) in unmatched_trackers.iter().enumerate() {
                let tracker = &self.trackers[t_idx];
                let iou = tracker
                    .last_observation()
                    .map_or(0.0, |obs| detections[d_idx].bbox.iou(&obs.bbox));
                ious[[di, ti]] = iou;
                max_iou = max_iou.max(iou);

                if cfg.use_reid {
                    if let (Some(sample), Some(proto)) =
                        (&detections[d_idx].reid, tracker.appearance())
                    {
                        sims[[di, ti]] = cosine_similarity(&sample.feature, proto);
                        sim_valid[[di, ti]] = true;
                    }
                }
            }
        }

        if !cfg.use_reid && max_iou <= cfg.iou_thresh {
            return Vec::new();
        }

        let cost = Array2::from_shape_fn((n_dets, n_trks), |(di, ti)| {
            let iou_cost = 1.0 - ious[[di, ti]];
            let mut app_cost = 1.0f32;
            if cfg.use_reid && sim_valid[[di, ti]] && sims[[di, ti]] >= cfg.reid_cos_thresh {
                app_cost = 1.0 - (sims[[di, ti]] + 1.0) * 0.5;
            }
            let w = if cfg.use_reid && ious[[di, ti]] >= cfg.iou_thresh && app_cost < 1.0 {
                cfg.reid_weight
            } else {
                0.0
            };
            f64::from((1.0 - w) * iou_cost + w * app_cost)
        });

        let assignment = HungarianSolver::solve(cost.view());

        let mut matched = Vec::new();
        let mut det_used = vec![false; n_dets];
        let mut trk_used = vec![false; n_trks];
        for (di, &ti) in assignment.iter().enumerate() {
            if ti < 0 {
                continue;
            }
            let ti = ti as usize;
            if ious[[di, ti]] >= cfg.iou_thresh {
                matched.push((unmatched_dets[di], unmatched_trackers[ti]));
                det_used[di] = true;
                trk_used[ti] = true;
            }
        }

        *unmatched_dets = unmatched_dets
            .iter()
            .enumerate()
            .filter(|(di, _)| !det_used[*di])
            .map(|(_, &d)| d)
            .collect();
        *unmatched_trackers = unmatched_trackers
            .iter()
            .enumerate()
            .filter(|(ti, _)| !trk_used[*ti])
            .map(|(_, &t)| t)
            .collect();

        matched
    }
}

/// True when every row and column of the IoU matrix has at most one entry
/// above the threshold.
fn has_unique_overlaps(ious: &Array2<f32>, thresh: f32) -> bool {
    let (n_dets, n_trks) = ious.dim();
    let mut col_sum = vec![0u32; n_trks];
    for d in 0..n_dets {
        let mut row_sum = 0u32;
        for t in 0..n_trks {
            if ious[[d, t]] > thresh {
                row_sum += 1;
                col_sum[t] += 1;
            }
        }
        if row_sum > 1 {
            return false;
        }
    }
    col_sum.iter().all(|&c| c <= 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn det_at(cx: f32, cy: f32, size: f32, score: f32) -> Detection {
        Detection::new(
            BBox::new(
                cx - size / 2.0,
                cy - size / 2.0,
                cx + size / 2.0,
                cy + size / 2.0,
            ),
            score,
        )
    }

    fn reid_det(cx: f32, cy: f32, size: f32, score: f32, axis: usize, quality: f32) -> Detection {
        let mut feature = [0.0f32; REID_DIM];
        feature[axis] = 1.0;
        Detection::with_reid(
            BBox::new(
                cx - size / 2.0,
                cy - size / 2.0,
                cx + size / 2.0,
                cy + size / 2.0,
            ),
            score,
            feature,
            quality,
        )
    }

    #[test]
    fn test_empty_frame_is_noop() {
        let mut tracker = OcSort::new(OcSortConfig::default());
        let out = tracker.update(&[], false, None, 0, 0);
        assert!(out.is_empty());
        assert_eq!(tracker.num_trackers(), 0);
    }

    #[test]
    fn test_single_track_linear_motion() {
        let mut tracker = OcSort::new(OcSortConfig::default());
        let mut seen_ids = std::collections::BTreeSet::new();
        let mut frames_emitted = 0;

        for i in 0..10 {
            let cx = 0.20 + 0.05 * i as f32;
            let dets = vec![det_at(cx, 0.50, 0.10, 0.9)];
            let out = tracker.update(&dets, false, None, 0, 0);
            for (&id, result) in &out {
                seen_ids.insert(id);
                assert_abs_diff_eq!(result.bbox.center_x(), cx, epsilon = 0.01);
                assert_abs_diff_eq!(result.bbox.center_y(), 0.50, epsilon = 0.01);
                assert!(result.confidence >= 0.0 && result.confidence <= 1.0);
                frames_emitted += 1;
            }
        }

        assert_eq!(seen_ids.len(), 1);
        assert_eq!(frames_emitted, 10);
    }

    #[test]
    fn test_two_track_crossing_keeps_ids() {
        let mut tracker = OcSort::new(OcSortConfig::default());
        let mut last_center = BTreeMap::new();
        let mut seen_ids = std::collections::BTreeSet::new();

        for i in 0..12 {
            let a = det_at(0.20 + 0.06 * i as f32, 0.30, 0.10, 0.9);
            let b = det_at(0.80 - 0.06 * i as f32, 0.30, 0.10, 0.9);
            let out = tracker.update(&[a, b], false, None, 0, 0);
            for (&id, result) in &out {
                seen_ids.insert(id);
                last_center.insert(id, result.bbox.center_x());
            }
        }

        assert_eq!(seen_ids.len(), 2, "expected exactly two stable ids");
        // Track 0 started on the left and must end on the right; track 1
        // the other way around. A swap at the crossing frame would flip
        // these.
        assert!(last_center[&0] > 0.75, "track 0 ended at {}", last_center[&0]);
        assert!(last_center[&1] < 0.25, "track 1 ended at {}", last_center[&1]);
    }

    #[test]
    fn test_ocm_prefers_aligned_motion() {
        // Same IoU and score, opposite directions: the aligned candidate
        // must receive the strictly higher momentum term.
        let inertia_dir = [0.0, 1.0]; // moving in +x
        let prev = BBox::new(0.2, 0.3, 0.3, 0.4);
        let forward = BBox::new(0.3, 0.3, 0.4, 0.4);
        let backward = BBox::new(0.1, 0.3, 0.2, 0.4);

        let aligned = ocm_cost(inertia_dir, &prev, &forward, 0.9, 0.2);
        let opposed = ocm_cost(inertia_dir, &prev, &backward, 0.9, 0.2);
        assert!(
            aligned > opposed,
            "aligned {aligned} should beat opposed {opposed}"
        );
    }

    #[test]
    fn test_return_all_emits_predictions_with_decay() {
        let mut tracker = OcSort::new(OcSortConfig {
            min_hits: 1,
            ..OcSortConfig::default()
        });

        let out = tracker.update(&[det_at(0.5, 0.5, 0.1, 0.8)], true, None, 0, 0);
        assert_eq!(out.len(), 1);
        assert_abs_diff_eq!(out[&0].confidence, 0.8, epsilon = 1e-5);

        // Three prediction-only frames: still emitted, confidence decaying
        // by 5% of the base score per frame.
        for step in 1..=3u32 {
            let out = tracker.update(&[], true, None, 0, 0);
            assert_eq!(out.len(), 1);
            let expected = 0.8 * (1.0 - 0.05 * step as f32);
            assert_abs_diff_eq!(out[&0].confidence, expected, epsilon = 1e-5);
        }

        // Default mode would emit nothing on a prediction-only frame.
        let out = tracker.update(&[], false, None, 0, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_tracks_expire_after_max_age() {
        let mut tracker = OcSort::new(OcSortConfig {
            max_age: 2,
            min_hits: 1,
            ..OcSortConfig::default()
        });

        tracker.update(&[det_at(0.5, 0.5, 0.1, 0.9)], true, None, 0, 0);
        assert_eq!(tracker.num_trackers(), 1);

        for _ in 0..3 {
            tracker.update(&[], true, None, 0, 0);
        }
        assert_eq!(tracker.num_trackers(), 0);
    }

    #[test]
    fn test_retired_track_appearance_is_drained_once() {
        let mut tracker = OcSort::new(OcSortConfig {
            max_age: 1,
            min_hits: 1,
            use_reid: true,
            ..OcSortConfig::default()
        });

        tracker.update(&[reid_det(0.5, 0.5, 0.1, 0.9, 0, 0.9)], true, None, 0, 0);
        for _ in 0..2 {
            tracker.update(&[], true, None, 0, 0);
        }
        assert_eq!(tracker.num_trackers(), 0);

        let finished = tracker.take_finished_appearances();
        assert_eq!(finished.len(), 1);
        assert!(finished.contains_key(&0));
        assert!(tracker.take_finished_appearances().is_empty());
    }

    #[test]
    fn test_ids_are_unique_and_deterministic() {
        let run = || {
            let mut tracker = OcSort::new(OcSortConfig {
                min_hits: 1,
                ..OcSortConfig::default()
            });
            let mut ids = Vec::new();
            for i in 0..5 {
                let dets = vec![
                    det_at(0.2 + 0.01 * i as f32, 0.2, 0.1, 0.9),
                    det_at(0.7, 0.7 - 0.01 * i as f32, 0.1, 0.9),
                ];
                let out = tracker.update(&dets, false, None, 0, 0);
                ids.push(out.keys().copied().collect::<Vec<_>>());
            }
            ids
        };

        let first = run();
        let second = run();
        assert_eq!(first, second);
        for frame_ids in &first {
            let mut sorted = frame_ids.clone();
            sorted.dedup();
            assert_eq!(&sorted, frame_ids);
        }
    }

    #[test]
    fn test_appearance_bonus_breaks_geometric_tie() {
        let mut config = OcSortConfig {
            min_hits: 1,
            use_reid: true,
            ..OcSortConfig::default()
        };
        config.inertia = 0.0; // isolate the appearance term
        let mut tracker = OcSort::new(config);

        // Two stationary tracks with distinct appearances.
        let dets = vec![
            reid_det(0.40, 0.50, 0.20, 0.9, 0, 0.9),
            reid_det(0.60, 0.50, 0.20, 0.9, 1, 0.9),
        ];
        tracker.update(&dets, false, None, 0, 0);
        tracker.update(&dets, false, None, 0, 0);

        // A frame where both detections crowd the middle with their
        // features swapped relative to what plain geometry would pick: the
        // det at 0.49 is slightly closer to track 0 but carries track 1's
        // appearance, and vice versa. The appearance bonus (0.35 for a
        // perfect match) outweighs the small IoU edge.
        let mixed = vec![
            reid_det(0.49, 0.50, 0.20, 0.9, 1, 0.9),
            reid_det(0.51, 0.50, 0.20, 0.9, 0, 0.9),
        ];
        let out = tracker.update(&mixed, false, None, 0, 0);
        assert_eq!(out.len(), 2);
        assert_abs_diff_eq!(out[&0].bbox.center_x(), 0.51, epsilon = 1e-4);
        assert_abs_diff_eq!(out[&1].bbox.center_x(), 0.49, epsilon = 1e-4);
    }

    #[test]
    fn test_ocr_recovers_on_last_observation_overlap() {
        let mut tracker = OcSort::new(OcSortConfig {
            min_hits: 1,
            ..OcSortConfig::default()
        });

        // Establish a fast-moving track.
        tracker.update(&[det_at(0.20, 0.5, 0.10, 0.9)], true, None, 0, 0);
        tracker.update(&[det_at(0.30, 0.5, 0.10, 0.9)], true, None, 0, 0);

        // Miss three frames: the prediction sails on ahead of the object.
        for _ in 0..3 {
            tracker.update(&[], true, None, 0, 0);
        }

        // The object is still near its last observed position. The primary
        // pass fails (prediction has moved ~0.3 away), OCR matches against
        // the last observation.
        let out = tracker.update(&[det_at(0.33, 0.5, 0.10, 0.9)], true, None, 0, 0);
        assert_eq!(out.len(), 1);
        assert!(out.contains_key(&0), "expected OCR to keep the original id");
        assert_abs_diff_eq!(out[&0].bbox.center_x(), 0.33, epsilon = 1e-4);
    }
}
