//! 3x3 warps for global motion compensation

use crate::bbox::BBox;
use nalgebra::Matrix3;

/// A 3x3 projective warp acting on 2D pixel coordinates.
///
/// Maps `(x, y)` to `((m00*x + m01*y + m02)/d, (m10*x + m11*y + m12)/d)`
/// with `d = m20*x + m21*y + m22`. GMC produces warps mapping points from
/// the previous frame into the current one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Warp {
    m: Matrix3<f32>,
}

impl Warp {
    pub fn identity() -> Self {
        Self {
            m: Matrix3::identity(),
        }
    }

    /// Pure pixel translation.
    pub fn from_translation(dx: f32, dy: f32) -> Self {
        let mut m = Matrix3::identity();
        m[(0, 2)] = dx;
        m[(1, 2)] = dy;
        Self { m }
    }

    pub fn from_matrix(m: Matrix3<f32>) -> Self {
        Self { m }
    }

    pub fn at(&self, r: usize, c: usize) -> f32 {
        self.m[(r, c)]
    }

    /// Apply to a pixel-space point. Near-zero denominators fall back to the
    /// undivided affine result rather than exploding.
    pub fn apply_point(&self, x: f32, y: f32) -> (f32, f32) {
        let nx = self.m[(0, 0)] * x + self.m[(0, 1)] * y + self.m[(0, 2)];
        let ny = self.m[(1, 0)] * x + self.m[(1, 1)] * y + self.m[(1, 2)];
        let d = self.m[(2, 0)] * x + self.m[(2, 1)] * y + self.m[(2, 2)];
        if d.abs() < 1e-6 {
            return (nx, ny);
        }
        (nx / d, ny / d)
    }

    /// Warp a normalized bbox through the pixel-space transform: all four
    /// corners are transformed, then re-axis-aligned by component-wise
    /// min/max and renormalized by the image extent.
    pub fn apply_bbox_norm(&self, b: &BBox, width: u32, height: u32) -> BBox {
        if width == 0 || height == 0 {
            return *b;
        }
        let w = width as f32;
        let h = height as f32;

        let corners = [
            self.apply_point(b.x1 * w, b.y1 * h),
            self.apply_point(b.x2 * w, b.y1 * h),
            self.apply_point(b.x2 * w, b.y2 * h),
            self.apply_point(b.x1 * w, b.y2 * h),
        ];

        let mut min_x = corners[0].0;
        let mut max_x = corners[0].0;
        let mut min_y = corners[0].1;
        let mut max_y = corners[0].1;
        for &(x, y) in corners.iter().skip(1) {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        BBox::new(min_x / w, min_y / h, max_x / w, max_y / h)
    }

    /// Determinant of the affine 2x2 part; used to rescale area velocity
    /// under GMC.
    pub fn affine_determinant(&self) -> f32 {
        self.m[(0, 0)] * self.m[(1, 1)] - self.m[(0, 1)] * self.m[(1, 0)]
    }
}

impl Default for Warp {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_identity_point() {
        let w = Warp::identity();
        let (x, y) = w.apply_point(123.0, 45.0);
        assert_abs_diff_eq!(x, 123.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, 45.0, epsilon = 1e-6);
    }

    #[test]
    fn test_identity_bbox_is_noop() {
        let warp = Warp::identity();
        let b = BBox::new(0.1, 0.2, 0.4, 0.5);
        let out = warp.apply_bbox_norm(&b, 640, 480);
        assert_abs_diff_eq!(out.x1, b.x1, epsilon = 1e-6);
        assert_abs_diff_eq!(out.y1, b.y1, epsilon = 1e-6);
        assert_abs_diff_eq!(out.x2, b.x2, epsilon = 1e-6);
        assert_abs_diff_eq!(out.y2, b.y2, epsilon = 1e-6);
    }

    #[test]
    fn test_translation_bbox() {
        let warp = Warp::from_translation(64.0, -48.0);
        let b = BBox::new(0.2, 0.3, 0.4, 0.5);
        let out = warp.apply_bbox_norm(&b, 640, 480);
        assert_abs_diff_eq!(out.x1, 0.3, epsilon = 1e-5);
        assert_abs_diff_eq!(out.y1, 0.2, epsilon = 1e-5);
        assert_abs_diff_eq!(out.x2, 0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(out.y2, 0.4, epsilon = 1e-5);
    }

    #[test]
    fn test_zero_image_extent_is_noop() {
        let warp = Warp::from_translation(10.0, 10.0);
        let b = BBox::new(0.1, 0.1, 0.2, 0.2);
        assert_eq!(warp.apply_bbox_norm(&b, 0, 480), b);
    }

    #[test]
    fn test_affine_determinant() {
        let mut m = Matrix3::identity();
        m[(0, 0)] = 2.0;
        m[(1, 1)] = 3.0;
        let warp = Warp::from_matrix(m);
        assert_abs_diff_eq!(warp.affine_determinant(), 6.0, epsilon = 1e-6);
    }

    #[test]
    fn test_near_zero_denominator_guard() {
        let mut m = Matrix3::identity();
        m[(2, 2)] = 0.0;
        // d == 0 at the origin; the guard returns the undivided result.
        let warp = Warp::from_matrix(m);
        let (x, y) = warp.apply_point(0.0, 0.0);
        assert!(x.is_finite() && y.is_finite());
    }
}
