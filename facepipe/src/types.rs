//! Output data model for the face pipeline

use octrack::BBox;
use serde::{Deserialize, Serialize};

/// A single frame entry within a face track. Bounding boxes are normalized
/// `[x1, y1, x2, y2]` in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackFrame {
    #[serde(rename = "frameIndex")]
    pub frame_index: usize,
    pub bbox: [f32; 4],
    pub confidence: f32,
}

impl TrackFrame {
    pub fn new(frame_index: usize, bbox: BBox, confidence: f32) -> Self {
        Self {
            frame_index,
            bbox: [bbox.x1, bbox.y1, bbox.x2, bbox.y2],
            confidence,
        }
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(self.bbox[0], self.bbox[1], self.bbox[2], self.bbox[3])
    }
}

/// A complete face track: frame entries in ascending `frame_index` order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceTrack {
    pub id: u32,
    pub frames: Vec<TrackFrame>,
}

/// Tracking-mode output: the full JSON document written to stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingOutput {
    pub tracks: Vec<FaceTrack>,
    #[serde(rename = "frameCount")]
    pub frame_count: usize,
}

/// One detected face in single-image mode. Bbox and landmarks are in
/// absolute pixel coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedFaceJson {
    pub bbox: [f32; 4],
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<[[f32; 2]; 5]>,
}

/// Single-image detection output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionOutput {
    pub image: String,
    pub width: u32,
    pub height: u32,
    pub faces: Vec<DetectedFaceJson>,
}
