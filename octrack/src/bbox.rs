//! Bounding box operations and IoU calculations

use ndarray::Array2;
use rayon::prelude::*;
use std::fmt;

/// Minimum area / aspect-ratio used when reconstructing a box from a
/// measurement, so degenerate detections cannot poison the filter state.
const MEASUREMENT_EPS: f32 = 1e-6;

/// Axis-aligned bounding box `(x1, y1, x2, y2)`.
///
/// Coordinates are normalized to the image extent (`0..1`) everywhere this
/// type crosses a module boundary; absolute pixel coordinates appear only
/// transiently inside warp application.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center_x(&self) -> f32 {
        (self.x1 + self.x2) / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.y1 + self.y2) / 2.0
    }

    /// Diagonal length; non-positive extents contribute zero.
    pub fn diagonal(&self) -> f32 {
        let w = self.width().max(0.0);
        let h = self.height().max(0.0);
        (w * w + h * h).sqrt()
    }

    /// Intersection over union with `other`. Returns 0 for disjoint or
    /// degenerate boxes.
    pub fn iou(&self, other: &BBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        if ix2 < ix1 || iy2 < iy1 {
            return 0.0;
        }

        let intersection = (ix2 - ix1) * (iy2 - iy1);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Clamp all coordinates into `[0, 1]`.
    pub fn clamped01(&self) -> BBox {
        let c = |v: f32| v.clamp(0.0, 1.0);
        BBox::new(c(self.x1), c(self.y1), c(self.x2), c(self.y2))
    }

    /// Convert to the Kalman measurement space `[x, y, s, r]` where
    /// `(x, y)` is the center, `s = w*h` the area and `r = w/h` the aspect
    /// ratio.
    pub fn to_measurement(&self) -> [f32; 4] {
        let w = self.width();
        let h = self.height().max(MEASUREMENT_EPS);
        [self.center_x(), self.center_y(), w * h, w / h]
    }

    /// Reconstruct a box from a `[x, y, s, r]` measurement.
    pub fn from_measurement(z: &[f32; 4]) -> Self {
        let s = z[2].max(MEASUREMENT_EPS);
        let r = z[3].max(MEASUREMENT_EPS);
        let w = (s * r).max(0.0).sqrt();
        let h = if w > 0.0 { s / w } else { 0.0 };
        BBox::new(
            z[0] - w / 2.0,
            z[1] - h / 2.0,
            z[0] + w / 2.0,
            z[1] + h / 2.0,
        )
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BBox({:.4}, {:.4}, {:.4}, {:.4})",
            self.x1, self.y1, self.x2, self.y2
        )
    }
}

/// Compute the `(n_dets, n_tracks)` IoU matrix between two box sets.
pub fn iou_matrix(detections: &[BBox], tracks: &[BBox]) -> Array2<f32> {
    let n_dets = detections.len();
    let n_tracks = tracks.len();

    if n_dets == 0 || n_tracks == 0 {
        return Array2::zeros((n_dets, n_tracks));
    }

    let data: Vec<f32> = detections
        .par_iter()
        .flat_map_iter(|det| tracks.iter().map(move |trk| det.iou(trk)))
        .collect();

    Array2::from_shape_vec((n_dets, n_tracks), data).unwrap()
}
