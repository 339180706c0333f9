//! Pretrained motion-transfer model: configuration and ONNX Runtime sessions.
//!
//! A checkpoint is a directory holding the two exported sub-networks:
//!
//! | File | Inputs | Outputs |
//! |------|--------|---------|
//! | `kp_detector.onnx` | `image` `[1,C,N,N]` | `value` `[1,K,2]`, `jacobian` `[1,K,2,2]` |
//! | `generator.onnx` | `source_image`, `kp_source_value`, `kp_source_jacobian`, `kp_driving_value`, `kp_driving_jacobian` | `prediction` `[1,C,N,N]` |
//!
//! Models exported without jacobian estimation omit the `jacobian` output and
//! are fed identity jacobians.

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult, ModelLoadError};
use crate::frame::Frame;
use crate::keypoints::Keypoints;

pub const KP_DETECTOR_FILE: &str = "kp_detector.onnx";
pub const GENERATOR_FILE: &str = "generator.onnx";

/// Resolution used when the model document has no `frame_shape`.
pub const DEFAULT_FRAME_SIZE: u32 = 256;

/// Architecture parameters read from the model configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Square input resolution
    pub frame_size: u32,
    pub num_kp: usize,
    pub num_channels: usize,
    pub estimate_jacobian: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            num_kp: 10,
            num_channels: 3,
            estimate_jacobian: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawModelConfig {
    #[serde(default)]
    dataset_params: RawDatasetParams,
    #[serde(default)]
    model_params: RawModelParams,
}

#[derive(Debug, Default, Deserialize)]
struct RawDatasetParams {
    frame_shape: Option<Vec<u32>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawModelParams {
    #[serde(default)]
    common_params: RawCommonParams,
}

#[derive(Debug, Default, Deserialize)]
struct RawCommonParams {
    num_kp: Option<usize>,
    num_channels: Option<usize>,
    estimate_jacobian: Option<bool>,
}

impl ModelConfig {
    /// Read a YAML, TOML or JSON model document.
    pub fn from_file(path: &Path) -> Result<Self, ModelLoadError> {
        if !path.is_file() {
            return Err(ModelLoadError::ConfigMissing(path.to_path_buf()));
        }

        let raw: RawModelConfig = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;

        let defaults = Self::default();
        let frame_size = match raw.dataset_params.frame_shape.as_deref() {
            Some([h, w, ..]) if h != w => {
                return Err(ModelLoadError::InvalidConfig(format!(
                    "frame_shape must be square, got {h}x{w}"
                )))
            }
            Some([h, ..]) => *h,
            _ => defaults.frame_size,
        };

        let cfg = Self {
            frame_size,
            num_kp: raw.model_params.common_params.num_kp.unwrap_or(defaults.num_kp),
            num_channels: raw
                .model_params
                .common_params
                .num_channels
                .unwrap_or(defaults.num_channels),
            estimate_jacobian: raw
                .model_params
                .common_params
                .estimate_jacobian
                .unwrap_or(defaults.estimate_jacobian),
        };

        if cfg.frame_size == 0 || cfg.num_kp == 0 {
            return Err(ModelLoadError::InvalidConfig(
                "frame_shape and num_kp must be positive".to_string(),
            ));
        }
        if cfg.num_channels != Frame::CHANNELS {
            return Err(ModelLoadError::InvalidConfig(format!(
                "only {}-channel models are supported, got {}",
                Frame::CHANNELS,
                cfg.num_channels
            )));
        }
        Ok(cfg)
    }
}

/// Device the sessions execute on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeDevice {
    Cuda,
    Cpu,
}

impl ComputeDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeDevice::Cuda => "cuda",
            ComputeDevice::Cpu => "cpu",
        }
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keypoint detector and generator pair.
pub trait MotionModel: Send + Sync {
    fn device(&self) -> ComputeDevice;

    /// Detect keypoints on one frame.
    fn detect_keypoints(&self, frame: &Frame) -> MediaResult<Keypoints>;

    /// Warp `source` so its keypoints move from `kp_source` to `kp_driving`.
    fn render(
        &self,
        source: &Frame,
        kp_source: &Keypoints,
        kp_driving: &Keypoints,
    ) -> MediaResult<Frame>;

    /// The same model pinned to the CPU. CPU models return themselves.
    fn on_cpu(&self) -> MediaResult<&dyn MotionModel>;
}

/// Both sub-networks committed as inference-only sessions.
struct SessionPair {
    kp_detector: Mutex<Session>,
    generator: Mutex<Session>,
}

/// [`MotionModel`] backed by ONNX Runtime.
pub struct OrtMotionModel {
    checkpoint_dir: PathBuf,
    config: ModelConfig,
    device: ComputeDevice,
    sessions: SessionPair,
    /// CPU copy, loaded on first `use_cpu` request
    cpu_copy: OnceLock<Box<OrtMotionModel>>,
}

impl OrtMotionModel {
    /// Load both sessions, preferring `preferred` and falling back to CPU.
    pub fn load(
        checkpoint_dir: &Path,
        config: ModelConfig,
        preferred: ComputeDevice,
    ) -> Result<Self, ModelLoadError> {
        let kp_path = checkpoint_dir.join(KP_DETECTOR_FILE);
        let gen_path = checkpoint_dir.join(GENERATOR_FILE);
        for path in [&kp_path, &gen_path] {
            if !path.is_file() {
                return Err(ModelLoadError::CheckpointMissing(path.clone()));
            }
        }

        let kp_bytes = std::fs::read(&kp_path)
            .map_err(|e| ModelLoadError::runtime(format!("read {}: {e}", kp_path.display())))?;
        let gen_bytes = std::fs::read(&gen_path)
            .map_err(|e| ModelLoadError::runtime(format!("read {}: {e}", gen_path.display())))?;

        let (kp_detector, device) = create_session(&kp_bytes, preferred)?;
        // Keep both networks on the same device.
        let (generator, _) = create_session(&gen_bytes, device)?;

        info!(
            checkpoint = %checkpoint_dir.display(),
            device = %device,
            num_kp = config.num_kp,
            frame_size = config.frame_size,
            "Motion model loaded"
        );

        Ok(Self {
            checkpoint_dir: checkpoint_dir.to_path_buf(),
            config,
            device,
            sessions: SessionPair {
                kp_detector: Mutex::new(kp_detector),
                generator: Mutex::new(generator),
            },
            cpu_copy: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn image_tensor(&self, frame: &Frame) -> MediaResult<Value> {
        let n = self.config.frame_size;
        if frame.width() != n || frame.height() != n {
            return Err(MediaError::inference(format!(
                "frame is {}x{}, model expects {n}x{n}",
                frame.width(),
                frame.height()
            )));
        }
        let shape = vec![1usize, Frame::CHANNELS, n as usize, n as usize];
        tensor(shape, frame.to_chw())
    }

    fn keypoint_tensors(&self, kp: &Keypoints) -> MediaResult<(Value, Value)> {
        let k = kp.len();
        if k != self.config.num_kp {
            return Err(MediaError::inference(format!(
                "got {k} keypoints, model expects {}",
                self.config.num_kp
            )));
        }
        Ok((
            tensor(vec![1, k, 2], kp.flat_values())?,
            tensor(vec![1, k, 2, 2], kp.flat_jacobians())?,
        ))
    }
}

impl MotionModel for OrtMotionModel {
    fn device(&self) -> ComputeDevice {
        self.device
    }

    fn detect_keypoints(&self, frame: &Frame) -> MediaResult<Keypoints> {
        let input = self.image_tensor(frame)?;

        let mut session = self
            .sessions
            .kp_detector
            .lock()
            .map_err(|_| MediaError::inference("keypoint detector session poisoned"))?;
        let outputs = session
            .run(ort::inputs!["image" => input])
            .map_err(|e| MediaError::inference(format!("keypoint detector run: {e}")))?;

        let value = outputs
            .get("value")
            .ok_or_else(|| MediaError::inference("keypoint detector returned no `value`"))?;
        let (_, value) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::inference(format!("extract keypoints: {e}")))?;

        let jacobian = if self.config.estimate_jacobian {
            let output = outputs
                .get("jacobian")
                .ok_or_else(|| MediaError::inference("keypoint detector returned no `jacobian`"))?;
            let (_, data) = output
                .try_extract_tensor::<f32>()
                .map_err(|e| MediaError::inference(format!("extract jacobian: {e}")))?;
            Some(data)
        } else {
            None
        };

        Keypoints::from_flat(value, jacobian)
    }

    fn render(
        &self,
        source: &Frame,
        kp_source: &Keypoints,
        kp_driving: &Keypoints,
    ) -> MediaResult<Frame> {
        let source_image = self.image_tensor(source)?;
        let (src_value, src_jacobian) = self.keypoint_tensors(kp_source)?;
        let (drv_value, drv_jacobian) = self.keypoint_tensors(kp_driving)?;

        let mut session = self
            .sessions
            .generator
            .lock()
            .map_err(|_| MediaError::inference("generator session poisoned"))?;
        let outputs = session
            .run(ort::inputs![
                "source_image" => source_image,
                "kp_source_value" => src_value,
                "kp_source_jacobian" => src_jacobian,
                "kp_driving_value" => drv_value,
                "kp_driving_jacobian" => drv_jacobian,
            ])
            .map_err(|e| MediaError::inference(format!("generator run: {e}")))?;

        let prediction = outputs
            .get("prediction")
            .ok_or_else(|| MediaError::inference("generator returned no `prediction`"))?;
        let (_, data) = prediction
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::inference(format!("extract prediction: {e}")))?;

        Frame::from_chw(source.width(), source.height(), data)
    }

    fn on_cpu(&self) -> MediaResult<&dyn MotionModel> {
        if self.device == ComputeDevice::Cpu {
            return Ok(self);
        }
        if let Some(cpu) = self.cpu_copy.get() {
            return Ok(cpu.as_ref());
        }

        debug!(checkpoint = %self.checkpoint_dir.display(), "Loading CPU copy of motion model");
        let cpu = OrtMotionModel::load(&self.checkpoint_dir, self.config.clone(), ComputeDevice::Cpu)
            .map_err(|e| MediaError::inference(format!("load CPU sessions: {e}")))?;
        // A concurrent caller may have won the race; either copy is equivalent.
        let _ = self.cpu_copy.set(Box::new(cpu));

        self.cpu_copy
            .get()
            .map(|m| m.as_ref() as &dyn MotionModel)
            .ok_or_else(|| MediaError::internal("CPU sessions unavailable"))
    }
}

fn tensor(shape: Vec<usize>, data: Vec<f32>) -> MediaResult<Value> {
    Tensor::from_array((shape, data.into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| MediaError::inference(format!("ORT tensor: {e}")))
}

/// Commit a session on `preferred`, falling back to CPU.
fn create_session(
    model_bytes: &[u8],
    preferred: ComputeDevice,
) -> Result<(Session, ComputeDevice), ModelLoadError> {
    let builder = Session::builder()
        .map_err(|e| ModelLoadError::runtime(format!("session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| ModelLoadError::runtime(format!("optimization level: {e}")))?;

    #[cfg(feature = "cuda")]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if preferred == ComputeDevice::Cuda {
            if let Ok(cuda_builder) = builder
                .clone()
                .with_execution_providers([CUDAExecutionProvider::default().build()])
            {
                if let Ok(session) = cuda_builder.commit_from_memory(model_bytes) {
                    return Ok((session, ComputeDevice::Cuda));
                }
            }
            warn!("CUDA execution provider not available, falling back to CPU");
        }
    }

    #[cfg(not(feature = "cuda"))]
    {
        if preferred == ComputeDevice::Cuda {
            warn!("Built without the `cuda` feature; using CPU");
        }
    }

    let session = builder
        .commit_from_memory(model_bytes)
        .map_err(|e| ModelLoadError::runtime(format!("load model: {e}")))?;
    Ok((session, ComputeDevice::Cpu))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOX_256: &str = r#"
dataset_params:
  root_dir: data/vox-png
  frame_shape: [256, 256, 3]
model_params:
  common_params:
    num_kp: 10
    num_channels: 3
    estimate_jacobian: True
  kp_detector_params:
    temperature: 0.1
"#;

    fn write_config(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_model_config_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "vox-256.yaml", VOX_256);

        let cfg = ModelConfig::from_file(&path).unwrap();
        assert_eq!(cfg, ModelConfig::default());
    }

    #[test]
    fn test_model_config_defaults_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "small.yaml",
            "dataset_params:\n  frame_shape: [128, 128, 3]\nmodel_params:\n  common_params:\n    estimate_jacobian: false\n",
        );

        let cfg = ModelConfig::from_file(&path).unwrap();
        assert_eq!(cfg.frame_size, 128);
        assert_eq!(cfg.num_kp, 10);
        assert!(!cfg.estimate_jacobian);
    }

    #[test]
    fn test_model_config_rejects_non_square() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "wide.yaml",
            "dataset_params:\n  frame_shape: [256, 384, 3]\n",
        );
        assert!(matches!(
            ModelConfig::from_file(&path),
            Err(ModelLoadError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_model_config_missing() {
        let err = ModelConfig::from_file(Path::new("/nonexistent/vox-256.yaml")).unwrap_err();
        assert!(matches!(err, ModelLoadError::ConfigMissing(_)));
    }

    #[test]
    fn test_missing_checkpoint_detected_before_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let err = OrtMotionModel::load(dir.path(), ModelConfig::default(), ComputeDevice::Cpu)
            .err()
            .unwrap();
        match err {
            ModelLoadError::CheckpointMissing(path) => {
                assert!(path.ends_with(KP_DETECTOR_FILE));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
