//! Face detector interface

use crate::error::{PipelineError, Result};
use crate::frame::RgbFrame;
use std::path::Path;

/// One detected face in absolute pixel coordinates.
#[derive(Debug, Clone, Copy)]
pub struct DetectedFace {
    /// `[x1, y1, x2, y2]` in pixels.
    pub bbox: [f32; 4],
    /// Confidence in `[0, 1]`; detections below the configured threshold
    /// are already excluded by the backend.
    pub score: f32,
    /// Optional 5-point landmarks (eyes, nose, mouth corners) in pixels.
    pub landmarks: Option<[[f32; 2]; 5]>,
}

/// Face detection backend.
///
/// The pipeline is generic over this trait; the concrete model runtime is a
/// deployment concern. Backends may parallelize internally but must be
/// deterministic for identical input.
pub trait FaceDetector: std::fmt::Debug {
    fn detect(&self, frame: &RgbFrame) -> Result<Vec<DetectedFace>>;
}

/// Placeholder backend used until the SCRFD runtime integration lands.
/// Validates like the real model loader but always reports zero faces.
// TODO: wire the ncnn SCRFD runtime behind this trait.
#[derive(Debug)]
pub struct StubDetector;

impl FaceDetector for StubDetector {
    fn detect(&self, _frame: &RgbFrame) -> Result<Vec<DetectedFace>> {
        log::warn!("stub detector active: no faces will be reported");
        Ok(Vec::new())
    }
}

/// Locate and open the detector from a model directory.
///
/// The directory must exist; a missing or unreadable directory maps to the
/// dedicated model-not-found exit code.
pub fn load_detector(model_dir: &Path, _conf_thresh: f32, _nms_thresh: f32) -> Result<Box<dyn FaceDetector>> {
    if !model_dir.is_dir() {
        return Err(PipelineError::ModelNotFound(
            model_dir.display().to_string(),
        ));
    }
    Ok(Box::new(StubDetector))
}
