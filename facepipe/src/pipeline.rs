//! The offline face tracking driver
//!
//! Runs sparse detection over an ordered frame list, tracks every frame
//! with the OC-SORT engine (predictions fill the gaps between detection
//! frames), compensates camera motion, then links compatible tracklets
//! offline using appearance and spatiotemporal constraints.

use crate::detector::FaceDetector;
use crate::error::Result;
use crate::frame::{FrameLoader, RgbFrame};
use crate::gmc::{GmcConfig, GmcEstimator};
use crate::reid::ReidExtractor;
use crate::types::{FaceTrack, TrackFrame, TrackingOutput};
use octrack::detection::cosine_similarity;
use octrack::{BBox, Detection, OcSort, OcSortConfig, REID_DIM};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// IoU above which two detections on the same frame are considered
/// duplicates of one face. Detectors occasionally emit several
/// highly-overlapping boxes near profile views; suppressing them here
/// avoids duplicate track births downstream.
const DUPLICATE_NMS_IOU: f32 = 0.30;

/// Emitted boxes below this confidence are not recorded; with
/// `return_all` the engine keeps predicting long after the face is gone
/// and those ghost boxes would otherwise linger in the output.
const MIN_OUTPUT_CONFIDENCE: f32 = 0.05;

/// Minimum surviving frames for a final track.
const MIN_TRACK_FRAMES: usize = 10;

/// Tracklet linking: spatial gates.
const LINK_MAX_CENTER_DIST: f32 = 2.0;
const LINK_MAX_AREA_RATIO: f32 = 4.0;

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Face detection confidence threshold.
    pub conf_thresh: f32,
    /// Detector-side NMS threshold (forwarded to the backend).
    pub nms_thresh: f32,
    /// Tracking IoU gate.
    pub iou_thresh: f32,
    /// Sparse detection sampling rate.
    pub detection_fps: f32,
    /// Appearance weight in association.
    pub reid_weight: f32,
    /// Appearance cosine gate.
    pub reid_cos_thresh: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            conf_thresh: 0.5,
            nms_thresh: 0.4,
            iou_thresh: 0.15,
            detection_fps: 5.0,
            reid_weight: 0.35,
            reid_cos_thresh: 0.35,
        }
    }
}

/// Env-gated stderr diagnostics, read once at pipeline construction.
#[derive(Debug, Clone, Copy, Default)]
struct Diagnostics {
    log_gmc: bool,
    log_reid: bool,
    log_reid_cands: bool,
}

impl Diagnostics {
    fn from_env() -> Self {
        Self {
            log_gmc: std::env::var_os("FACE_PIPELINE_LOG_GMC").is_some(),
            log_reid: std::env::var_os("FACE_PIPELINE_LOG_REID").is_some(),
            log_reid_cands: std::env::var_os("FACE_PIPELINE_LOG_REID_CANDS").is_some(),
        }
    }
}

#[derive(Debug, Default)]
struct ReidStats {
    attempted: usize,
    kept: usize,
    q_sum: f64,
    q_min: f64,
    q_max: f64,
}

impl ReidStats {
    fn new() -> Self {
        Self {
            q_min: f64::INFINITY,
            q_max: f64::NEG_INFINITY,
            ..Self::default()
        }
    }

    fn record(&mut self, quality: f64, kept: bool) {
        self.attempted += 1;
        self.q_sum += quality;
        self.q_min = self.q_min.min(quality);
        self.q_max = self.q_max.max(quality);
        if kept {
            self.kept += 1;
        }
    }
}

/// Per-tracklet summary used by the offline linking stage.
#[derive(Debug, Clone, Copy)]
struct TrackletSummary {
    id: u32,
    start_frame: usize,
    end_frame: usize,
    start_bbox: BBox,
    end_bbox: BBox,
    /// Frames with confidence at or above the pipeline threshold.
    conf_ge_thresh: usize,
}

/// Disjoint-set over track ids; the smallest id in a set is its
/// representative so merged ids are stable across runs.
#[derive(Debug, Default)]
struct UnionFind {
    parent: BTreeMap<u32, u32>,
}

impl UnionFind {
    fn insert(&mut self, x: u32) {
        self.parent.entry(x).or_insert(x);
    }

    fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while let Some(&p) = self.parent.get(&root) {
            if p == root {
                break;
            }
            root = p;
        }
        // Path compression.
        let mut cur = x;
        while let Some(&p) = self.parent.get(&cur) {
            if p == root {
                break;
            }
            self.parent.insert(cur, root);
            cur = p;
        }
        self.parent.entry(x).or_insert(root);
        root
    }

    fn unite(&mut self, a: u32, b: u32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        if ra < rb {
            self.parent.insert(rb, ra);
        } else {
            self.parent.insert(ra, rb);
        }
    }
}

fn center_dist_over_max_diag(a: &BBox, b: &BBox) -> f32 {
    let dx = a.center_x() - b.center_x();
    let dy = a.center_y() - b.center_y();
    // Normalize by the larger diagonal so a box that temporarily shrinks
    // (partial occlusion, detector jitter) is not over-penalized.
    let diag = a.diagonal().max(b.diagonal()) + 1e-6;
    (dx * dx + dy * dy).sqrt() / diag
}

/// Greedy score-descending NMS over same-frame detections.
fn suppress_duplicates(mut dets: Vec<Detection>, iou_thresh: f32) -> Vec<Detection> {
    if dets.len() <= 1 {
        return dets;
    }
    dets.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut kept: Vec<Detection> = Vec::with_capacity(dets.len());
    for det in dets {
        if kept.iter().all(|k| det.bbox.iou(&k.bbox) <= iou_thresh) {
            kept.push(det);
        }
    }
    kept
}

/// Face detection and tracking pipeline.
///
/// ```rust,ignore
/// let pipeline = FacePipeline::new(detector, loader, PipelineConfig::default());
/// let output = pipeline.process(&paths, 30.0);
/// ```
pub struct FacePipeline {
    detector: Box<dyn FaceDetector>,
    loader: Box<dyn FrameLoader>,
    reid: Option<Box<dyn ReidExtractor>>,
    gmc: GmcEstimator,
    config: PipelineConfig,
    cancel: Option<Arc<AtomicBool>>,
    diagnostics: Diagnostics,
}

impl FacePipeline {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        loader: Box<dyn FrameLoader>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            detector,
            loader,
            reid: None,
            gmc: GmcEstimator::new(GmcConfig::default()),
            config,
            cancel: None,
            diagnostics: Diagnostics::from_env(),
        }
    }

    /// Attach an appearance extractor; enables ReID-assisted association
    /// and offline tracklet linking.
    pub fn with_reid(mut self, reid: Box<dyn ReidExtractor>) -> Self {
        self.reid = Some(reid);
        self
    }

    /// Override the GMC configuration.
    pub fn with_gmc(mut self, config: GmcConfig) -> Self {
        self.gmc = GmcEstimator::new(config);
        self
    }

    /// Cooperative cancellation, checked once per frame iteration. After
    /// cancellation the pipeline finishes linking over the frames already
    /// processed.
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = Some(flag);
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }

    /// Detect faces in a single frame and convert them to normalized
    /// tracking detections (with appearance attached when available).
    ///
    /// Errors only on frame load failure; a failing detector backend
    /// degrades to zero detections.
    fn frame_detections(&self, path: &str, stats: &mut ReidStats) -> Result<Vec<Detection>> {
        let frame = self.loader.load(path)?;
        let faces = match self.detector.detect(&frame) {
            Ok(faces) => faces,
            Err(e) => {
                log::debug!("detector failed on {path}: {e}");
                Vec::new()
            }
        };

        let w = frame.width as f32;
        let h = frame.height as f32;
        let mut dets = Vec::with_capacity(faces.len());
        for face in &faces {
            let bbox = BBox::new(
                face.bbox[0] / w,
                face.bbox[1] / h,
                face.bbox[2] / w,
                face.bbox[3] / h,
            );
            let mut det = Detection::new(bbox, face.score);
            if let Some(reid) = &self.reid {
                match reid.extract(&frame, face.bbox, face.landmarks.as_ref()) {
                    Some((feature, quality)) => {
                        stats.record(f64::from(quality), true);
                        det.reid = Some(octrack::ReidSample { feature, quality });
                    }
                    None => stats.record(0.0, false),
                }
            }
            dets.push(det);
        }

        Ok(suppress_duplicates(dets, DUPLICATE_NMS_IOU))
    }

    /// Process an ordered frame list into stable face tracks.
    pub fn process(&self, image_paths: &[String], video_fps: f32) -> TrackingOutput {
        let frame_count = image_paths.len();
        let mut output = TrackingOutput {
            tracks: Vec::new(),
            frame_count,
        };
        if frame_count == 0 {
            return output;
        }

        let use_reid = self.reid.is_some();
        let mut reid_stats = ReidStats::new();

        // Phase 1: sparse detection.
        let stride = (video_fps / self.config.detection_fps).floor().max(1.0) as usize;
        let mut detections: BTreeMap<usize, Vec<Detection>> = BTreeMap::new();
        let mut i = 0;
        while i < frame_count {
            match self.frame_detections(&image_paths[i], &mut reid_stats) {
                Ok(dets) if !dets.is_empty() => {
                    detections.insert(i, dets);
                }
                Ok(_) => {}
                Err(e) => log::debug!("skipping detection frame {i}: {e}"),
            }
            i += stride;
        }

        // The last frame anchors the end of every track; always detect
        // there.
        let last = frame_count - 1;
        if !detections.contains_key(&last) {
            match self.frame_detections(&image_paths[last], &mut reid_stats) {
                Ok(dets) if !dets.is_empty() => {
                    detections.insert(last, dets);
                }
                Ok(_) => {}
                Err(e) => log::debug!("skipping detection frame {last}: {e}"),
            }
        }

        // Phase 2: track every frame. max_age=90 (3s at 30fps) lets tracks
        // survive long occlusions; min_hits=1 admits single-detection
        // tracks, which the final filter prunes if they stay short.
        let mut engine = OcSort::new(OcSortConfig {
            iou_thresh: self.config.iou_thresh,
            max_age: 90,
            min_hits: 1,
            delta_t: 3,
            inertia: 0.2,
            use_reid,
            reid_weight: self.config.reid_weight,
            reid_cos_thresh: self.config.reid_cos_thresh,
            ..OcSortConfig::default()
        });

        let mut track_data: BTreeMap<u32, Vec<TrackFrame>> = BTreeMap::new();
        let mut prev_frame: Option<RgbFrame> = None;
        let mut gmc_attempts = 0usize;
        let mut gmc_ok = 0usize;
        let mut frames_loaded = 0usize;

        for i in 0..frame_count {
            if self.cancelled() {
                log::info!("cancelled at frame {i}; assembling partial result");
                break;
            }

            let cur_frame = self.loader.load(&image_paths[i]).ok();
            if cur_frame.is_some() {
                frames_loaded += 1;
            }

            let mut warp = None;
            if i > 0 {
                if let (Some(prev), Some(cur)) = (&prev_frame, &cur_frame) {
                    gmc_attempts += 1;
                    warp = self.gmc.estimate(cur, prev);
                    if warp.is_some() {
                        gmc_ok += 1;
                    }
                }
            }

            let empty = Vec::new();
            let frame_dets = detections.get(&i).unwrap_or(&empty);
            let (fw, fh) = cur_frame
                .as_ref()
                .map_or((0, 0), |f| (f.width, f.height));
            let active = engine.update(frame_dets, true, warp.as_ref(), fw, fh);

            prev_frame = cur_frame;

            for (&track_id, result) in &active {
                let bbox = result.bbox.clamped01();
                if bbox.width() < 0.01 || bbox.height() < 0.01 {
                    continue;
                }
                if result.confidence < MIN_OUTPUT_CONFIDENCE {
                    continue;
                }
                track_data
                    .entry(track_id)
                    .or_default()
                    .push(TrackFrame::new(i, bbox, result.confidence));
            }
        }

        if self.diagnostics.log_gmc {
            let ok_ratio = if gmc_attempts > 0 {
                gmc_ok as f64 / gmc_attempts as f64
            } else {
                0.0
            };
            eprintln!(
                "GMC: backend={} frames_loaded={}/{} attempts={} ok={} ok_ratio={:.3}",
                self.gmc.backend_id(),
                frames_loaded,
                frame_count,
                gmc_attempts,
                gmc_ok,
                ok_ratio
            );
        }

        if use_reid && self.diagnostics.log_reid {
            let mean_q = if reid_stats.attempted > 0 {
                reid_stats.q_sum / reid_stats.attempted as f64
            } else {
                0.0
            };
            eprintln!(
                "ReID: attempted={} kept={} kept_ratio={:.3} q_mean={:.3} q_min={:.3} q_max={:.3}",
                reid_stats.attempted,
                reid_stats.kept,
                if reid_stats.attempted > 0 {
                    reid_stats.kept as f64 / reid_stats.attempted as f64
                } else {
                    0.0
                },
                mean_q,
                if reid_stats.q_min.is_finite() { reid_stats.q_min } else { 0.0 },
                if reid_stats.q_max.is_finite() { reid_stats.q_max } else { 0.0 },
            );
        }

        // Phase 3: offline tracklet linking over appearance summaries of
        // finished and still-active tracks, then final assembly.
        let mut appearances: BTreeMap<u32, [f32; REID_DIM]> = BTreeMap::new();
        if use_reid {
            appearances = engine.take_finished_appearances();
            appearances.extend(engine.active_appearances());
        }

        let mut uf = self.link_tracklets(&track_data, &appearances, video_fps);

        // Merge recorded frames by representative id.
        let mut merged: BTreeMap<u32, Vec<TrackFrame>> = BTreeMap::new();
        for (id, frames) in track_data {
            let root = uf.find(id);
            merged.entry(root).or_default().extend(frames);
        }

        for (id, mut frames) in merged {
            frames.sort_by_key(|f| f.frame_index);
            // Per-frame dedup keeping the most confident entry.
            let mut dedup: Vec<TrackFrame> = Vec::with_capacity(frames.len());
            for f in frames {
                match dedup.last_mut() {
                    Some(last) if last.frame_index == f.frame_index => {
                        if f.confidence > last.confidence {
                            *last = f;
                        }
                    }
                    _ => dedup.push(f),
                }
            }

            if dedup.len() < MIN_TRACK_FRAMES {
                continue;
            }
            // Tracks dominated by low-confidence predictions are noise or
            // duplicate short-lived ids under jitter.
            let ge = dedup
                .iter()
                .filter(|f| f.confidence >= self.config.conf_thresh)
                .count();
            if ge < 3 || (ge as f32) < 0.15 * dedup.len() as f32 {
                continue;
            }

            output.tracks.push(FaceTrack { id, frames: dedup });
        }

        output.tracks.sort_by_key(|t| t.id);
        output
    }

    /// Build tracklet summaries and union mutually-best appearance links.
    fn link_tracklets(
        &self,
        track_data: &BTreeMap<u32, Vec<TrackFrame>>,
        appearances: &BTreeMap<u32, [f32; REID_DIM]>,
        video_fps: f32,
    ) -> UnionFind {
        let mut uf = UnionFind::default();
        for &id in track_data.keys() {
            uf.insert(id);
        }

        let use_reid = self.reid.is_some();
        if !use_reid || appearances.is_empty() || track_data.len() < 2 {
            return uf;
        }

        // Trim very low-confidence prediction tails so a tracklet's span
        // reflects when the face was actually present.
        let span_conf = (0.20f32).max(self.config.conf_thresh * 0.60);
        let mut tracklets: Vec<TrackletSummary> = Vec::with_capacity(track_data.len());
        for (&id, frames) in track_data {
            if frames.is_empty() {
                continue;
            }
            let mut first = frames.iter().position(|f| f.confidence >= span_conf);
            let mut last = frames.iter().rposition(|f| f.confidence >= span_conf);
            if first.is_none() || last.is_none() || last < first {
                first = Some(0);
                last = Some(frames.len() - 1);
            }
            let (first, last) = (first.unwrap(), last.unwrap());

            tracklets.push(TrackletSummary {
                id,
                start_frame: frames[first].frame_index,
                end_frame: frames[last].frame_index,
                start_bbox: frames[first].bbox(),
                end_bbox: frames[last].bbox(),
                conf_ge_thresh: frames
                    .iter()
                    .filter(|f| f.confidence >= self.config.conf_thresh)
                    .count(),
            });
        }

        let gap_short = ((video_fps * 2.0).round() as usize).max(1);
        let gap_long = ((video_fps * 10.0).round() as usize).max(gap_short);

        let n = tracklets.len();
        let mut best_to = vec![usize::MAX; n];
        let mut best_to_sim = vec![-1.0f32; n];
        let mut best_to_dist = vec![f32::INFINITY; n];
        let mut best_from = vec![usize::MAX; n];
        let mut best_from_sim = vec![-1.0f32; n];
        let mut best_from_dist = vec![f32::INFINITY; n];

        // Best long-gap candidate per tracklet, kept for threshold tuning.
        let mut best_long: Vec<Option<(usize, f32, usize, f32)>> = vec![None; n];

        for i in 0..n {
            let a = &tracklets[i];
            let Some(app_a) = appearances.get(&a.id) else {
                continue;
            };
            for j in 0..n {
                if i == j {
                    continue;
                }
                let b = &tracklets[j];
                if b.start_frame <= a.end_frame {
                    continue;
                }
                let gap = b.start_frame - a.end_frame;
                if gap > gap_long {
                    continue;
                }
                let Some(app_b) = appearances.get(&b.id) else {
                    continue;
                };

                let dist = center_dist_over_max_diag(&a.end_bbox, &b.start_bbox);
                if dist > LINK_MAX_CENTER_DIST {
                    continue;
                }
                let area_a = a.end_bbox.area().max(1e-6);
                let area_b = b.start_bbox.area().max(1e-6);
                let ratio = (area_b / area_a).max(area_a / area_b);
                if ratio > LINK_MAX_AREA_RATIO {
                    continue;
                }

                let sim = cosine_similarity(app_a, app_b);
                let long_gap = gap > gap_short;
                if long_gap {
                    let better = match best_long[i] {
                        None => true,
                        Some((_, s, _, d)) => sim > s || (sim == s && dist < d),
                    };
                    if better {
                        best_long[i] = Some((j, sim, gap, dist));
                    }
                }

                let mut sim_thresh = self.config.reid_cos_thresh;
                if long_gap {
                    // Long gaps are riskier: require enough confident
                    // frames on both sides and a moderate absolute floor.
                    if a.conf_ge_thresh < 6 || b.conf_ge_thresh < 6 {
                        continue;
                    }
                    sim_thresh = sim_thresh.max(0.50);
                }
                if sim < sim_thresh {
                    continue;
                }

                if sim > best_to_sim[i] || (sim == best_to_sim[i] && dist < best_to_dist[i]) {
                    best_to[i] = j;
                    best_to_sim[i] = sim;
                    best_to_dist[i] = dist;
                }
                if sim > best_from_sim[j] || (sim == best_from_sim[j] && dist < best_from_dist[j])
                {
                    best_from[j] = i;
                    best_from_sim[j] = sim;
                    best_from_dist[j] = dist;
                }
            }
        }

        let mut links_made = 0usize;
        let mut sim_sum = 0.0f64;
        let mut sim_min = f64::INFINITY;
        let mut sim_max = f64::NEG_INFINITY;

        for i in 0..n {
            let j = best_to[i];
            if j == usize::MAX || best_from[j] != i {
                continue; // only merge mutual nearest neighbors
            }
            let id_a = tracklets[i].id;
            let id_b = tracklets[j].id;
            if uf.find(id_a) == uf.find(id_b) {
                continue;
            }
            uf.unite(id_a, id_b);
            links_made += 1;
            let s = f64::from(best_to_sim[i]);
            sim_sum += s;
            sim_min = sim_min.min(s);
            sim_max = sim_max.max(s);
        }

        if self.diagnostics.log_reid_cands {
            for (i, cand) in best_long.iter().enumerate() {
                let Some((j, sim, gap, dist)) = cand else {
                    continue;
                };
                eprintln!(
                    "ReIDLinkLongCand: {} -> {} gap={} sim={:.3} dist={:.3}",
                    tracklets[i].id, tracklets[*j].id, gap, sim, dist
                );
            }
        }

        if self.diagnostics.log_reid {
            eprintln!(
                "ReIDLink: links={} sim_mean={:.3} sim_min={:.3} sim_max={:.3}",
                links_made,
                if links_made > 0 {
                    sim_sum / links_made as f64
                } else {
                    0.0
                },
                if sim_min.is_finite() { sim_min } else { 0.0 },
                if sim_max.is_finite() { sim_max } else { 0.0 },
            );
        }

        uf
    }
}
