//! Motion-transfer animation wrapper.
//!
//! This crate provides:
//! - Loading of a pretrained keypoint detector and generator (ONNX Runtime)
//! - Source image and driving video preprocessing to a square RGB resolution
//! - Keypoint motion transfer with relative motion and hull-based scaling
//! - FFmpeg-backed decoding and encoding at the driving video's frame rate
//! - A configurable catalog of canned expressions

pub mod animation;
pub mod catalog;
pub mod command;
pub mod encode;
pub mod error;
pub mod frame;
pub mod frames;
pub mod keypoints;
pub mod metrics;
pub mod model;
pub mod probe;

pub use animation::{
    animate_frames, even_resolution, AnimationTask, Animator, AnimatorConfig, AnimatorHandle,
    DrivingSource, GenerationOptions, TaskOutcome,
};
pub use catalog::{ExpressionCatalog, DEFAULT_EXPRESSIONS};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand};
pub use encode::{encode_frames, OutputFormat};
pub use error::{MediaError, MediaResult, ModelLoadError};
pub use frame::{load_source_image, Frame};
pub use frames::{decode_driving_video, DrivingVideo};
pub use keypoints::{hull_area, normalize_keypoints, Keypoints};
pub use model::{ComputeDevice, ModelConfig, MotionModel, OrtMotionModel};
pub use probe::{probe_video, FrameRate, VideoInfo};
