//! Animation wrapper: loads the motion model and turns a portrait plus a
//! driving video into an animated video.
//!
//! [`Animator`] is only constructed from a successfully loaded model.
//! Callers that must keep running without one hold an [`AnimatorHandle`],
//! whose `NotReady` variant rejects generation with
//! [`MediaError::ModelNotLoaded`] before touching any file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::catalog::ExpressionCatalog;
use crate::encode::encode_frames;
use crate::error::{MediaError, MediaResult, ModelLoadError};
use crate::frame::{load_source_image, Frame};
use crate::frames::decode_driving_video;
use crate::keypoints::normalize_keypoints;
use crate::metrics;
use crate::model::{ComputeDevice, ModelConfig, MotionModel, OrtMotionModel};

/// Animation wrapper configuration.
#[derive(Debug, Clone)]
pub struct AnimatorConfig {
    /// Model architecture document (YAML/TOML/JSON)
    pub model_config_path: PathBuf,
    /// Directory holding `kp_detector.onnx` and `generator.onnx`
    pub checkpoint_dir: PathBuf,
    /// Preferred execution device
    pub device: ComputeDevice,
    /// Square working resolution; defaults to the model's `frame_shape`
    pub resolution: Option<u32>,
    pub catalog: ExpressionCatalog,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            model_config_path: PathBuf::from("first-order-model/config/vox-256.yaml"),
            checkpoint_dir: PathBuf::from("first-order-model/checkpoints/vox-256"),
            device: ComputeDevice::Cuda,
            resolution: None,
            catalog: ExpressionCatalog::default(),
        }
    }
}

impl AnimatorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let expressions_dir = std::env::var("EXPRESSIONS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("expressions"));

        let catalog = match std::env::var("EXPRESSION_CATALOG") {
            Ok(entries) if !entries.trim().is_empty() => {
                match ExpressionCatalog::parse(&entries, &expressions_dir) {
                    Ok(catalog) => catalog,
                    Err(e) => {
                        warn!("Ignoring EXPRESSION_CATALOG: {}", e);
                        ExpressionCatalog::default_in(&expressions_dir)
                    }
                }
            }
            _ => ExpressionCatalog::default_in(&expressions_dir),
        };

        let device = match std::env::var("MODEL_DEVICE")
            .map(|v| v.to_lowercase())
            .as_deref()
        {
            Ok("cpu") => ComputeDevice::Cpu,
            _ => ComputeDevice::Cuda,
        };

        Self {
            model_config_path: std::env::var("MODEL_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_config_path),
            checkpoint_dir: std::env::var("MODEL_CHECKPOINT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.checkpoint_dir),
            device,
            resolution: std::env::var("ANIMATION_RESOLUTION")
                .ok()
                .and_then(|s| s.parse().ok())
                .and_then(even_resolution),
            catalog,
        }
    }
}

/// Round a working resolution down to an even size; yuv420p encoders reject
/// odd dimensions. Sizes below 2 are unusable.
pub fn even_resolution(requested: u32) -> Option<u32> {
    let even = requested - requested % 2;
    if even != requested {
        warn!(requested, used = even, "Rounding odd resolution down to an even size");
    }
    (even > 0).then_some(even)
}

/// Knobs for one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Express motion relative to the first driving frame
    pub relative: bool,
    /// Scale motion by the ratio of source and driving face sizes
    pub adapt_movement_scale: bool,
    /// Run on the CPU even when the model was loaded on an accelerator
    pub use_cpu: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            relative: true,
            adapt_movement_scale: true,
            use_cpu: false,
        }
    }
}

/// A loaded motion model plus the expression catalog.
pub struct Animator {
    model: Box<dyn MotionModel>,
    resolution: u32,
    catalog: ExpressionCatalog,
}

impl std::fmt::Debug for Animator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Animator")
            .field("device", &self.model.device())
            .field("resolution", &self.resolution)
            .field("catalog", &self.catalog)
            .finish()
    }
}

impl Animator {
    /// Read the model document and load both sub-networks.
    pub fn load(config: AnimatorConfig) -> Result<Self, ModelLoadError> {
        let mut model_config = ModelConfig::from_file(&config.model_config_path)?;

        if let Some(resolution) = config.resolution {
            if resolution != model_config.frame_size {
                warn!(
                    resolution,
                    frame_shape = model_config.frame_size,
                    "Overriding the model's frame shape"
                );
                model_config.frame_size = resolution;
            }
        }
        let resolution = even_resolution(model_config.frame_size)
            .ok_or_else(|| ModelLoadError::InvalidConfig("frame size must be at least 2".to_string()))?;
        model_config.frame_size = resolution;

        let model = OrtMotionModel::load(&config.checkpoint_dir, model_config, config.device)?;
        Ok(Self::with_model(model, resolution, config.catalog))
    }

    /// Wrap an already loaded model.
    pub fn with_model(
        model: impl MotionModel + 'static,
        resolution: u32,
        catalog: ExpressionCatalog,
    ) -> Self {
        Self {
            model: Box::new(model),
            resolution,
            catalog,
        }
    }

    pub fn device(&self) -> ComputeDevice {
        self.model.device()
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn catalog(&self) -> &ExpressionCatalog {
        &self.catalog
    }

    /// Animate `source_image_path` with the motion of `driving_video_path`.
    ///
    /// The output has one frame per decoded driving frame and keeps the
    /// driving video's frame rate.
    pub fn generate_animation(
        &self,
        source_image_path: &Path,
        driving_video_path: &Path,
        output_path: &Path,
        options: GenerationOptions,
    ) -> MediaResult<PathBuf> {
        let start = Instant::now();
        let device = if options.use_cpu {
            ComputeDevice::Cpu
        } else {
            self.device()
        };

        let result = self.run_generation(source_image_path, driving_video_path, output_path, options);
        let elapsed = start.elapsed().as_secs_f64();

        match &result {
            Ok(_) => {
                metrics::record_animation("success", device.as_str(), elapsed);
                info!(
                    source = %source_image_path.display(),
                    driving = %driving_video_path.display(),
                    output = %output_path.display(),
                    elapsed_secs = elapsed,
                    "Animation saved"
                );
            }
            Err(e) => {
                metrics::record_animation(e.kind(), device.as_str(), elapsed);
                error!(
                    source = %source_image_path.display(),
                    driving = %driving_video_path.display(),
                    "Error generating animation: {}",
                    e
                );
            }
        }
        result
    }

    fn run_generation(
        &self,
        source_image_path: &Path,
        driving_video_path: &Path,
        output_path: &Path,
        options: GenerationOptions,
    ) -> MediaResult<PathBuf> {
        let source = load_source_image(source_image_path, self.resolution)?;
        let driving = decode_driving_video(driving_video_path, self.resolution)?;

        let model = if options.use_cpu {
            self.model.on_cpu()?
        } else {
            self.model.as_ref()
        };

        let frames = animate_frames(model, &source, &driving.frames, options)?;
        metrics::record_frames_rendered(model.device().as_str(), frames.len() as u64);

        encode_frames(output_path, &frames, driving.frame_rate)?;
        Ok(output_path.to_path_buf())
    }

    /// Animate with one of the catalog's canned expressions.
    ///
    /// Unknown names fail before any file is touched.
    pub fn generate_expression_animation(
        &self,
        source_image_path: &Path,
        expression: &str,
        output_path: &Path,
    ) -> MediaResult<PathBuf> {
        let driving = self.catalog.resolve(expression)?;
        self.generate_animation(
            source_image_path,
            driving,
            output_path,
            GenerationOptions::default(),
        )
    }
}

/// Run the model over every driving frame.
///
/// Source keypoints are detected once; the first driving frame anchors
/// relative motion.
pub fn animate_frames(
    model: &dyn MotionModel,
    source: &Frame,
    driving: &[Frame],
    options: GenerationOptions,
) -> MediaResult<Vec<Frame>> {
    let first = driving
        .first()
        .ok_or_else(|| MediaError::invalid_video("driving sequence is empty"))?;
    if let Some(bad) = driving
        .iter()
        .find(|f| f.width() != source.width() || f.height() != source.height())
    {
        return Err(MediaError::inference(format!(
            "driving frame is {}x{}, source is {}x{}",
            bad.width(),
            bad.height(),
            source.width(),
            source.height()
        )));
    }

    let kp_source = model.detect_keypoints(source)?;
    let kp_initial = model.detect_keypoints(first)?;

    let mut predictions = Vec::with_capacity(driving.len());
    for frame in driving {
        let kp_driving = model.detect_keypoints(frame)?;
        let kp_norm = normalize_keypoints(
            &kp_source,
            &kp_driving,
            &kp_initial,
            options.relative,
            options.adapt_movement_scale,
        )?;
        predictions.push(model.render(source, &kp_source, &kp_norm)?);
    }
    Ok(predictions)
}

/// Readiness-aware access to the animation wrapper.
#[derive(Debug, Clone)]
pub enum AnimatorHandle {
    Ready(Arc<Animator>),
    NotReady { reason: String },
}

impl AnimatorHandle {
    /// Load the model, logging and recording any failure instead of raising it.
    pub fn load(config: AnimatorConfig) -> Self {
        match Animator::load(config) {
            Ok(animator) => {
                info!("Model loaded successfully");
                AnimatorHandle::Ready(Arc::new(animator))
            }
            Err(e) => {
                error!("Error loading model: {}", e);
                AnimatorHandle::NotReady {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn not_ready(reason: impl Into<String>) -> Self {
        AnimatorHandle::NotReady {
            reason: reason.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, AnimatorHandle::Ready(_))
    }

    /// The loaded animator, or `ModelNotLoaded`.
    pub fn animator(&self) -> MediaResult<&Arc<Animator>> {
        match self {
            AnimatorHandle::Ready(animator) => Ok(animator),
            AnimatorHandle::NotReady { reason } => Err(MediaError::ModelNotLoaded(reason.clone())),
        }
    }

    pub fn not_ready_reason(&self) -> Option<&str> {
        match self {
            AnimatorHandle::Ready(_) => None,
            AnimatorHandle::NotReady { reason } => Some(reason),
        }
    }

    pub fn generate_animation(
        &self,
        source_image_path: &Path,
        driving_video_path: &Path,
        output_path: &Path,
        options: GenerationOptions,
    ) -> MediaResult<PathBuf> {
        self.animator()?
            .generate_animation(source_image_path, driving_video_path, output_path, options)
    }

    pub fn generate_expression_animation(
        &self,
        source_image_path: &Path,
        expression: &str,
        output_path: &Path,
    ) -> MediaResult<PathBuf> {
        self.animator()?
            .generate_expression_animation(source_image_path, expression, output_path)
    }

    /// Run one task, reporting failure as an outcome.
    pub fn process_task(&self, task: &AnimationTask) -> TaskOutcome {
        let result = match &task.source {
            DrivingSource::Expression(name) => {
                self.generate_expression_animation(&task.avatar_path, name, &task.output_path)
            }
            DrivingSource::Custom(path) => self.generate_animation(
                &task.avatar_path,
                path,
                &task.output_path,
                GenerationOptions::default(),
            ),
        };

        match result {
            Ok(output_path) => TaskOutcome::Success { output_path },
            Err(e) => TaskOutcome::Failed {
                error: e.to_string(),
            },
        }
    }
}

/// Where a task takes its motion from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum DrivingSource {
    /// Catalog expression name
    Expression(String),
    /// User-supplied driving video
    Custom(PathBuf),
}

/// One animation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationTask {
    pub avatar_path: PathBuf,
    pub source: DrivingSource,
    pub output_path: PathBuf,
}

/// Result of [`AnimatorHandle::process_task`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum TaskOutcome {
    Success { output_path: PathBuf },
    Failed { error: String },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success { .. })
    }

    pub fn message(&self) -> &'static str {
        match self {
            TaskOutcome::Success { .. } => "Animation generated successfully",
            TaskOutcome::Failed { .. } => "Animation generation failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::Keypoints;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Keypoints follow the mean brightness of the frame; rendering tints
    /// the source by the first driving keypoint.
    #[derive(Default)]
    struct StubModel {
        detections: AtomicUsize,
        renders: AtomicUsize,
    }

    impl MotionModel for StubModel {
        fn device(&self) -> ComputeDevice {
            ComputeDevice::Cpu
        }

        fn detect_keypoints(&self, frame: &Frame) -> MediaResult<Keypoints> {
            self.detections.fetch_add(1, Ordering::SeqCst);
            let bytes = frame.as_bytes();
            let mean = bytes.iter().map(|&b| b as f32).sum::<f32>() / bytes.len() as f32 / 255.0;
            Ok(Keypoints::from_values(vec![
                [mean, 0.0],
                [mean + 0.5, 0.0],
                [mean, 0.5],
            ]))
        }

        fn render(
            &self,
            source: &Frame,
            _kp_source: &Keypoints,
            kp_driving: &Keypoints,
        ) -> MediaResult<Frame> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            let shift = kp_driving.value[0][0];
            let chw: Vec<f32> = source.to_chw().iter().map(|v| v + shift).collect();
            Frame::from_chw(source.width(), source.height(), &chw)
        }

        fn on_cpu(&self) -> MediaResult<&dyn MotionModel> {
            Ok(self)
        }
    }

    fn gray(v: u8) -> Frame {
        Frame::filled(8, 8, [v, v, v])
    }

    #[test]
    fn test_one_output_frame_per_driving_frame() {
        let model = StubModel::default();
        let driving: Vec<Frame> = (0..5).map(|i| gray(i * 10)).collect();

        let out = animate_frames(&model, &gray(0), &driving, GenerationOptions::default()).unwrap();
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|f| f.width() == 8 && f.height() == 8));
        // source + first frame + one per driving frame
        assert_eq!(model.detections.load(Ordering::SeqCst), 7);
        assert_eq!(model.renders.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_relative_first_frame_reproduces_source_pose() {
        let model = StubModel::default();
        let source = gray(51);
        let driving = vec![gray(200), gray(255)];

        let out = animate_frames(&model, &source, &driving, GenerationOptions::default()).unwrap();
        // First driving frame maps exactly onto the source keypoints.
        let kp_source = model.detect_keypoints(&source).unwrap();
        let expected = model.render(&source, &kp_source, &kp_source).unwrap();
        assert_eq!(out[0], expected);
        assert_ne!(out[1], out[0]);
    }

    #[test]
    fn test_absolute_mode_uses_driving_keypoints() {
        let model = StubModel::default();
        let options = GenerationOptions {
            relative: false,
            ..GenerationOptions::default()
        };
        let out = animate_frames(&model, &gray(0), &[gray(255)], options).unwrap();
        // Shift of 1.0 saturates every channel.
        assert!(out[0].as_bytes().iter().all(|&b| b == 255));
    }

    #[test]
    fn test_rejects_mismatched_sizes() {
        let model = StubModel::default();
        let err = animate_frames(
            &model,
            &gray(0),
            &[Frame::filled(4, 4, [0, 0, 0])],
            GenerationOptions::default(),
        );
        assert!(matches!(err, Err(MediaError::Inference(_))));
        assert!(animate_frames(&model, &gray(0), &[], GenerationOptions::default()).is_err());
    }

    #[test]
    fn test_unknown_expression_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = ExpressionCatalog::default_in(dir.path());
        let animator = Animator::with_model(StubModel::default(), 8, catalog);
        let output = dir.path().join("out.mp4");

        let err = animator
            .generate_expression_animation(Path::new("/nonexistent/face.png"), "wink", &output)
            .unwrap_err();
        assert!(matches!(err, MediaError::UnknownExpression(_)));

        let err = animator
            .generate_expression_animation(Path::new("/nonexistent/face.png"), "smile", &output)
            .unwrap_err();
        assert!(matches!(err, MediaError::DrivingFileMissing(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_not_ready_handle_creates_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnimatorConfig {
            model_config_path: dir.path().join("missing.yaml"),
            checkpoint_dir: dir.path().join("missing"),
            device: ComputeDevice::Cpu,
            resolution: None,
            catalog: ExpressionCatalog::default_in(dir.path()),
        };
        let handle = AnimatorHandle::load(config);
        assert!(!handle.is_ready());
        assert!(handle.not_ready_reason().unwrap().contains("missing.yaml"));

        let output = dir.path().join("out.mp4");
        let err = handle
            .generate_animation(
                &dir.path().join("face.png"),
                &dir.path().join("drive.mp4"),
                &output,
                GenerationOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, MediaError::ModelNotLoaded(_)));

        let err = handle
            .generate_expression_animation(&dir.path().join("face.png"), "smile", &output)
            .unwrap_err();
        assert!(matches!(err, MediaError::ModelNotLoaded(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_process_task_reports_failure() {
        let handle = AnimatorHandle::not_ready("no checkpoint");
        let task = AnimationTask {
            avatar_path: PathBuf::from("face.png"),
            source: DrivingSource::Expression("smile".to_string()),
            output_path: PathBuf::from("out.mp4"),
        };

        let outcome = handle.process_task(&task);
        assert!(!outcome.is_success());
        assert_eq!(outcome.message(), "Animation generation failed");

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert!(json["error"].as_str().unwrap().contains("no checkpoint"));
    }

    #[test]
    #[serial_test::serial]
    fn test_config_from_env() {
        std::env::set_var("EXPRESSIONS_DIR", "/srv/expressions");
        std::env::set_var("EXPRESSION_CATALOG", "wink=wink.mp4");
        std::env::set_var("MODEL_DEVICE", "CPU");
        std::env::set_var("ANIMATION_RESOLUTION", "512");

        let config = AnimatorConfig::from_env();
        assert_eq!(config.device, ComputeDevice::Cpu);
        assert_eq!(config.resolution, Some(512));
        assert_eq!(
            config.catalog.lookup("wink").unwrap(),
            Path::new("/srv/expressions/wink.mp4")
        );
        assert!(config.catalog.lookup("smile").is_err());

        for key in [
            "EXPRESSIONS_DIR",
            "EXPRESSION_CATALOG",
            "MODEL_DEVICE",
            "ANIMATION_RESOLUTION",
        ] {
            std::env::remove_var(key);
        }

        let config = AnimatorConfig::from_env();
        assert_eq!(config.device, ComputeDevice::Cuda);
        assert_eq!(config.resolution, None);
        assert_eq!(config.catalog.len(), 4);
    }

    #[test]
    #[serial_test::serial]
    fn test_odd_resolution_rounded_to_even() {
        std::env::set_var("ANIMATION_RESOLUTION", "257");
        assert_eq!(AnimatorConfig::from_env().resolution, Some(256));
        std::env::set_var("ANIMATION_RESOLUTION", "1");
        assert_eq!(AnimatorConfig::from_env().resolution, None);
        std::env::remove_var("ANIMATION_RESOLUTION");

        assert_eq!(even_resolution(256), Some(256));
        assert_eq!(even_resolution(0), None);
    }

    #[test]
    fn test_generation_options_default() {
        let options = GenerationOptions::default();
        assert!(options.relative);
        assert!(options.adapt_movement_scale);
        assert!(!options.use_cpu);
    }
}
