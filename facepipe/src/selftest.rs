//! Deterministic tracker self-test

use crate::error::{PipelineError, Result};
use octrack::{BBox, Detection, KalmanBoxTracker};

fn det_at(cx: f32, cy: f32, w: f32, h: f32, score: f32) -> Detection {
    Detection::new(
        BBox::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0),
        score,
    )
}

/// Minimal deterministic check of the observation-centric re-update path.
///
/// Scenario: a box moves right for three frames, disappears for five, and
/// reappears far to the right. After the recovery update, the next
/// prediction must keep moving right; a plain Kalman filter (no ORU) fails
/// this because the gap collapses its velocity estimate.
pub fn run_ocsort_self_test() -> Result<()> {
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

    let cx9 = trk.predict().center_x();

    if cx9 <= cx8 + 0.02 {
        return Err(PipelineError::SelfTest(format!(
            "expected positive velocity after recovery (cx8={cx8:.4}, cx9={cx9:.4})"
        )));
    }

    log::info!("OC-SORT self-test passed (cx8={cx8:.4}, cx9={cx9:.4})");
    Ok(())
}
