//! Observation-centric multi-object tracking for face pipelines
//!
//! This crate implements the OC-SORT tracking algorithm (Cao et al., CVPR
//! 2023) on top of a 7-state constant-velocity Kalman filter:
//!
//! - Observation-Centric Re-Update (ORU) for occlusion recovery
//! - Observation-Centric Momentum (OCM) in the association cost
//! - Observation-Centric Recovery (OCR) second-pass association
//! - an optional bounded appearance bank for ReID-assisted association
//! - global motion compensation (GMC) warp transport of track state
//!
//! All bounding boxes crossing the crate boundary are normalized to the
//! `[0,1]` image extent; pixel coordinates only appear transiently inside
//! warp application.
//!
//! ```rust,ignore
//! use octrack::{Detection, OcSort, OcSortConfig};
//!
//! let mut tracker = OcSort::new(OcSortConfig::default());
//! for dets in frames {
//!     let tracks = tracker.update(&dets, false, None, 0, 0);
//!     // tracks[&track_id] = TrackResult { bbox, confidence }
//! }
//! ```

pub mod bbox;
pub mod box_tracker;
pub mod detection;
pub mod hungarian;
pub mod kalman;
pub mod matrix;
pub mod ocsort;
pub mod transform;

pub use bbox::BBox;
pub use box_tracker::KalmanBoxTracker;
pub use detection::{Detection, ReidSample, REID_DIM};
pub use hungarian::HungarianSolver;
pub use ocsort::{ConfirmationPolicy, OcSort, OcSortConfig, TrackResult};
pub use transform::Warp;
