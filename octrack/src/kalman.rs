//! Kalman filter core used by the box tracker

use crate::matrix::invert_regularized;
use nalgebra::{DMatrix, DVector};

/// Construction parameters for a [`KalmanFilter`].
#[derive(Debug, Clone)]
pub struct KalmanFilterParams {
    /// State dimension.
    pub dim_x: usize,
    /// Observation dimension.
    pub dim_z: usize,
    /// Initial state.
    pub x: DVector<f32>,
    /// Initial state covariance.
    pub p: DMatrix<f32>,
    /// State transition matrix.
    pub f: DMatrix<f32>,
    /// Observation matrix.
    pub h: DMatrix<f32>,
    /// Observation noise covariance.
    pub r: DMatrix<f32>,
    /// Process noise covariance.
    pub q: DMatrix<f32>,
}

/// Small dense Kalman filter.
///
/// The update step never fails: a near-singular innovation covariance is
/// absorbed by the regularized inverse rather than surfaced to the caller.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    pub dim_x: usize,
    pub dim_z: usize,
    pub x: DVector<f32>,
    pub p: DMatrix<f32>,
    pub f: DMatrix<f32>,
    pub h: DMatrix<f32>,
    pub r: DMatrix<f32>,
    pub q: DMatrix<f32>,
}

impl KalmanFilter {
    pub fn new(params: KalmanFilterParams) -> Self {
        Self {
            dim_x: params.dim_x,
            dim_z: params.dim_z,
            x: params.x,
            p: params.p,
            f: params.f,
            h: params.h,
            r: params.r,
            q: params.q,
        }
    }

    /// Propagate the state: `x = F x`, `P = F P F' + Q`.
    pub fn predict(&mut self) {
        self.x = &self.f * &self.x;
        self.p = &self.f * &self.p * self.f.transpose() + &self.q;
    }

    /// Correct with an observation `z`.
    pub fn update(&mut self, z: &DVector<f32>) {
        // y = z - H x
        let y = z - &self.h * &self.x;

        // S = H P H' + R
        let s = &self.h * &self.p * self.h.transpose() + &self.r;

        // K = P H' S^-1
        let k = &self.p * self.h.transpose() * invert_regularized(&s);

        // x = x + K y
        self.x = &self.x + &k * y;

        // P = (I - K H) P
        let i = DMatrix::<f32>::identity(self.dim_x, self.dim_x);
        self.p = (i - &k * &self.h) * &self.p;
    }
}
