//! Global motion compensation

use crate::frame::RgbFrame;
use octrack::Warp;

/// Available warp estimation backends.
///
/// A keypoint-based similarity estimator would slot in as a further
/// variant; it is an external collaborator and not part of this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GmcBackend {
    /// Brute-force integer translation search on a downsampled luma grid.
    /// Dependency-free and good enough to stabilize association under
    /// handheld pans.
    #[default]
    LumaSadTranslation,
    /// Always report failure; tracking runs uncompensated.
    NoOp,
}

#[derive(Debug, Clone, Copy)]
pub struct GmcConfig {
    pub backend: GmcBackend,
    /// Downsampling factor for the luma grid.
    pub downscale: u32,
}

impl Default for GmcConfig {
    fn default() -> Self {
        Self {
            backend: GmcBackend::default(),
            downscale: 4,
        }
    }
}

/// Estimates the camera warp between consecutive frames.
pub struct GmcEstimator {
    config: GmcConfig,
}

impl GmcEstimator {
    pub fn new(config: GmcConfig) -> Self {
        Self { config }
    }

    /// Numeric id of the active backend, for diagnostics.
    pub fn backend_id(&self) -> u32 {
        match self.config.backend {
            GmcBackend::LumaSadTranslation => 2,
            GmcBackend::NoOp => 0,
        }
    }

    /// Estimate the warp mapping points from `prev` into `curr`.
    /// `None` means estimation failed; the caller proceeds with identity.
    pub fn estimate(&self, curr: &RgbFrame, prev: &RgbFrame) -> Option<Warp> {
        match self.config.backend {
            GmcBackend::NoOp => None,
            GmcBackend::LumaSadTranslation => {
                let (dx, dy) = estimate_translation(curr, prev, self.config.downscale)?;
                Some(Warp::from_translation(dx as f32, dy as f32))
            }
        }
    }
}

/// Brute-force translation search on a downsampled luma grid.
///
/// Samples a sparse grid of luma values, scores every integer shift in a
/// bounded range by summed absolute difference with a small quadratic
/// penalty favoring smaller motions, and accepts the best shift only when
/// it beats the identity baseline by at least 1%.
fn estimate_translation(curr: &RgbFrame, prev: &RgbFrame, downscale: u32) -> Option<(i32, i32)> {
    if curr.width != prev.width || curr.height != prev.height {
        return None;
    }
    let down = downscale.max(1) as i32;
    let w = curr.width as i32;
    let h = curr.height as i32;

    let ds_w = (w / down).max(1);
    let ds_h = (h / down).max(1);
    if ds_w < 32 || ds_h < 32 {
        return None;
    }

    // Search range in downsampled pixels: at down=4, +/-8 covers +/-32px of
    // full-resolution motion.
    const MAX_SHIFT_DS: i32 = 8;
    const STEP_DS: i32 = 12;
    const MARGIN_DS: i32 = 8;

    let sad_for = |dx_ds: i32, dy_ds: i32, best_so_far: u64| -> u64 {
        let mut sad = 0u64;
        let y0 = MARGIN_DS;
        let y1 = ds_h - MARGIN_DS;
        let x0 = MARGIN_DS;
        let x1 = ds_w - MARGIN_DS;
        let mut y = y0;
        while y < y1 {
            let y2 = y + dy_ds;
            if y2 >= y0 && y2 < y1 {
                let py = (y * down) as u32;
                let cy = (y2 * down) as u32;
                let mut x = x0;
                while x < x1 {
                    let x2 = x + dx_ds;
                    if x2 >= x0 && x2 < x1 {
                        let px = (x * down) as u32;
                        let cx = (x2 * down) as u32;
                        let dp = i64::from(prev.luma(px, py));
                        let dc = i64::from(curr.luma(cx, cy));
                        sad += dp.abs_diff(dc);
                        if sad >= best_so_far {
                            return sad;
                        }
                    }
                    x += STEP_DS;
                }
            }
            y += STEP_DS;
        }
        sad
    };

    let sad0 = sad_for(0, 0, u64::MAX);
    if sad0 == 0 {
        return None;
    }

    let mut best = sad0;
    let mut best_dx = 0;
    let mut best_dy = 0;

    for dy in -MAX_SHIFT_DS..=MAX_SHIFT_DS {
        for dx in -MAX_SHIFT_DS..=MAX_SHIFT_DS {
            // Favor smaller motion slightly to reduce jitter when the
            // scene is ambiguous.
            let penalty = ((dx * dx + dy * dy) * 4) as u64;
            let sad = sad_for(dx, dy, best.saturating_sub(penalty)) + penalty;
            if sad < best {
                best = sad;
                best_dx = dx;
                best_dy = dy;
            }
        }
    }

    let improvement = (sad0 as f64 - best as f64) / sad0 as f64;
    if improvement <= 0.01 {
        return None;
    }

    Some((best_dx * down, best_dy * down))
}
