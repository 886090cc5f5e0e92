//! ReID embedding extractor interface

use crate::frame::RgbFrame;
use octrack::REID_DIM;

/// Tuning knobs forwarded to the ReID backend's crop preprocessing.
///
/// Blurry crops produce unstable embeddings; backends sharpen moderately
/// blurry crops and skip hopeless ones, using Laplacian variance as the
/// sharpness measure. Values come from environment variables so they can be
/// tuned without rebuilding.
#[derive(Debug, Clone, Copy)]
pub struct ReidTuning {
    /// Sharpen crops whose Laplacian variance falls below this.
    pub blur_sharpen_var: f32,
    /// Skip crops whose Laplacian variance falls below this.
    pub blur_skip_var: f32,
    /// Sharpening strength.
    pub laplacian_alpha: f32,
}

impl Default for ReidTuning {
    fn default() -> Self {
        Self {
            blur_sharpen_var: 50.0,
            blur_skip_var: 12.0,
            laplacian_alpha: 0.6,
        }
    }
}

impl ReidTuning {
    /// Read the tuning from `FACE_PIPELINE_REID_*` environment variables,
    /// keeping defaults for unset or unparseable values.
    pub fn from_env() -> Self {
        let read = |name: &str, default: f32| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.trim().parse::<f32>().ok())
                .unwrap_or(default)
        };
        let defaults = Self::default();
        Self {
            blur_sharpen_var: read(
                "FACE_PIPELINE_REID_BLUR_SHARPEN_VAR",
                defaults.blur_sharpen_var,
            ),
            blur_skip_var: read("FACE_PIPELINE_REID_BLUR_SKIP_VAR", defaults.blur_skip_var),
            laplacian_alpha: read(
                "FACE_PIPELINE_REID_LAPLACIAN_ALPHA",
                defaults.laplacian_alpha,
            ),
        }
    }
}

/// Appearance embedding backend.
///
/// Implementations return an L2-normalized 128-D embedding for a face crop
/// plus a quality score in `[0, 1]`, or `None` when no usable embedding
/// could be produced (the detection then simply tracks without appearance).
pub trait ReidExtractor {
    fn extract(
        &self,
        frame: &RgbFrame,
        face_bbox_px: [f32; 4],
        landmarks_px: Option<&[[f32; 2]; 5]>,
    ) -> Option<([f32; REID_DIM], f32)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tuning() {
        let t = ReidTuning::default();
        assert_eq!(t.blur_sharpen_var, 50.0);
        assert_eq!(t.blur_skip_var, 12.0);
        assert_eq!(t.laplacian_alpha, 0.6);
    }
}
