//! Offline face detection and tracking pipeline
//!
//! Turns an ordered list of frame images into a small set of stable face
//! tracks (normalized bounding boxes keyed by frame index), ready to drive
//! a downstream blur-mask authoring tool.
//!
//! The tracking core lives in the `octrack` crate; this crate adds the
//! driver around it: sparse detection scheduling, global motion
//! compensation, offline tracklet linking, the external adaptor traits
//! (detector, ReID, frame loading) and the JSON-emitting CLI.

pub mod detector;
pub mod error;
pub mod frame;
pub mod gmc;
pub mod pipeline;
pub mod reid;
pub mod selftest;
pub mod types;

pub use detector::{DetectedFace, FaceDetector};
pub use error::{PipelineError, Result};
pub use frame::{FrameLoader, ImageFileLoader, RgbFrame};
pub use gmc::{GmcBackend, GmcConfig, GmcEstimator};
pub use pipeline::{FacePipeline, PipelineConfig};
pub use reid::{ReidExtractor, ReidTuning};
pub use types::{DetectionOutput, FaceTrack, TrackFrame, TrackingOutput};
