//! Command-line frontend for the face tracking pipeline
//!
//! Two modes: single-image detection (`--image`) and multi-frame tracking
//! (`--track` / `--images-file`). Both emit JSON on stdout; diagnostics go
//! to stderr so the output stays machine-readable.

use clap::Parser;
use facepipe::detector::load_detector;
use facepipe::error::{PipelineError, Result};
use facepipe::frame::{FrameLoader, ImageFileLoader};
use facepipe::selftest::run_ocsort_self_test;
use facepipe::types::{DetectedFaceJson, DetectionOutput};
use facepipe::{FacePipeline, PipelineConfig, ReidTuning};
use std::io::BufRead;
use std::path::PathBuf;

/// Face detection and tracking pipeline.
///
/// Exit codes: 0 success, 1 invalid arguments, 2 model not found,
/// 3 image load failed, 4 inference error, 5 no input, 6 self-test failed.
#[derive(Parser, Debug)]
#[command(name = "facepipe", about = "Face detection and tracking pipeline", long_about = None)]
struct Args {
    /// Directory containing detector artifacts
    #[arg(long)]
    model: Option<PathBuf>,

    /// Single image path (detection mode)
    #[arg(long)]
    image: Option<String>,

    /// Tracking mode: read image paths from stdin, one per line
    #[arg(long)]
    track: bool,

    /// File containing image paths, one per line (implies tracking mode)
    #[arg(long)]
    images_file: Option<PathBuf>,

    /// Confidence threshold
    #[arg(long, default_value_t = 0.5)]
    conf: f32,

    /// NMS IoU threshold
    #[arg(long, default_value_t = 0.4)]
    nms: f32,

    /// Tracking IoU threshold
    #[arg(long, default_value_t = 0.15)]
    iou: f32,

    /// Detection sampling rate
    #[arg(long, default_value_t = 5.0)]
    detection_fps: f32,

    /// Source video FPS
    #[arg(long, default_value_t = 30.0)]
    video_fps: f32,

    /// Optional directory containing the ReID embedding model
    #[arg(long)]
    reid_model: Option<PathBuf>,

    /// ReID appearance weight
    #[arg(long, default_value_t = 0.35)]
    reid_weight: f32,

    /// ReID cosine gate threshold
    #[arg(long = "reid-cos", default_value_t = 0.35)]
    reid_cos: f32,

    /// Run the deterministic OC-SORT self-test
    #[arg(long)]
    test_ocsort: bool,
}

fn read_paths<R: BufRead>(reader: R) -> Vec<String> {
    reader
        .lines()
        .map_while(|line| line.ok())
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn run_detection(args: &Args, model_dir: &PathBuf, image_path: &str) -> Result<()> {
    let detector = load_detector(model_dir, args.conf, args.nms)?;
    let frame = ImageFileLoader.load(image_path)?;
    let faces = detector.detect(&frame)?;

    let output = DetectionOutput {
        image: image_path.to_string(),
        width: frame.width,
        height: frame.height,
        faces: faces
            .iter()
            .map(|f| DetectedFaceJson {
                bbox: f.bbox,
                confidence: f.score,
                landmarks: f.landmarks,
            })
            .collect(),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_tracking(args: &Args, model_dir: &PathBuf, image_paths: Vec<String>) -> Result<()> {
    if image_paths.is_empty() {
        return Err(PipelineError::NoInput);
    }

    let detector = load_detector(model_dir, args.conf, args.nms)?;
    let config = PipelineConfig {
        conf_thresh: args.conf,
        nms_thresh: args.nms,
        iou_thresh: args.iou,
        detection_fps: args.detection_fps,
        reid_weight: args.reid_weight,
        reid_cos_thresh: args.reid_cos,
    };

    let pipeline = FacePipeline::new(detector, Box::new(ImageFileLoader), config);

    if let Some(reid_dir) = &args.reid_model {
        if reid_dir.is_dir() {
            // TODO: wire the ncnn MobileFaceNet runtime behind ReidExtractor.
            log::warn!(
                "ReID model at {} found, but no embedding runtime is wired in; tracking runs without appearance",
                reid_dir.display()
            );
            log::debug!("ReID tuning: {:?}", ReidTuning::from_env());
        } else {
            log::warn!(
                "ReID model directory {} not found; tracking runs without appearance",
                reid_dir.display()
            );
        }
    }

    let output = pipeline.process(&image_paths, args.video_fps);
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run(args: Args) -> Result<()> {
    if args.test_ocsort {
        run_ocsort_self_test()?;
        eprintln!("OC-SORT self-test passed");
        return Ok(());
    }

    let model_dir = args
        .model
        .clone()
        .ok_or_else(|| PipelineError::InvalidArgs("--model is required".into()))?;

    let track_mode = args.track || args.images_file.is_some();
    match (&args.image, track_mode) {
        (Some(_), true) => Err(PipelineError::InvalidArgs(
            "--image and --track are mutually exclusive".into(),
        )),
        (Some(image), false) => {
            let image = image.clone();
            run_detection(&args, &model_dir, &image)
        }
        (None, true) => {
            let paths = match &args.images_file {
                Some(file) => {
                    // An unreadable list file is the same as an empty one.
                    let content = std::fs::read_to_string(file).unwrap_or_default();
                    read_paths(content.as_bytes())
                }
                None => read_paths(std::io::stdin().lock()),
            };
            run_tracking(&args, &model_dir, paths)
        }
        (None, false) => Err(PipelineError::InvalidArgs(
            "either --image or --track is required".into(),
        )),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            eprint!("{e}");
            std::process::exit(1);
        }
        Err(e) => {
            // --help / --version render on stdout and are not failures.
            print!("{e}");
            std::process::exit(0);
        }
    };

    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}
