// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Configuration for the frame pipeline driver.

use std::path::{Path, PathBuf};

use crate::source::DEFAULT_FPS;

/// File name of the external inference binary, looked up in the working directory.
pub const DEFAULT_BINARY: &str = "trt_infer_video_fix";

/// Default class-names file passed to the external binary.
pub const DEFAULT_NAMES_FILE: &str = "names.txt";

/// Default output video name.
pub const DEFAULT_OUTPUT_VIDEO: &str = "trt_result_video_from_frames.mp4";

/// Default confidence threshold passed to the external binary.
pub const DEFAULT_CONF: f32 = 0.25;

/// Configuration for one driver run.
///
/// # Example
///
/// ```rust
/// use trt_annotate::PipelineConfig;
///
/// let config = PipelineConfig::new("model.engine", 640, 640)
///     .with_workdir("/tmp/run")
///     .with_confidence(0.4)
///     .with_output("annotated.mp4");
///
/// assert_eq!(config.output_path(), std::path::Path::new("/tmp/run/annotated.mp4"));
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Compiled inference engine passed to the external binary.
    pub engine: String,
    /// Network input width passed to the external binary.
    pub input_w: u32,
    /// Network input height passed to the external binary.
    pub input_h: u32,
    /// Working directory holding the scratch directories and relative outputs.
    pub workdir: PathBuf,
    /// External binary, `None` for `<workdir>/trt_infer_video_fix`.
    pub binary: Option<PathBuf>,
    /// Class-names file passed as `--names`.
    pub names: PathBuf,
    /// Confidence threshold passed as `--conf`.
    pub confidence_threshold: f32,
    /// Output video path; relative paths are resolved against `workdir`.
    pub output: PathBuf,
    /// Frame rate used when the source does not report one.
    pub fallback_fps: f32,
}

impl PipelineConfig {
    /// Create a configuration with default values for everything but the engine and geometry.
    #[must_use]
    pub fn new(engine: impl Into<String>, input_w: u32, input_h: u32) -> Self {
        Self {
            engine: engine.into(),
            input_w,
            input_h,
            workdir: PathBuf::from("."),
            binary: None,
            names: PathBuf::from(DEFAULT_NAMES_FILE),
            confidence_threshold: DEFAULT_CONF,
            output: PathBuf::from(DEFAULT_OUTPUT_VIDEO),
            fallback_fps: DEFAULT_FPS,
        }
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    /// Set the external binary path.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    /// Set the class-names file.
    #[must_use]
    pub fn with_names(mut self, names: impl Into<PathBuf>) -> Self {
        self.names = names.into();
        self
    }

    /// Set the confidence threshold.
    #[must_use]
    pub const fn with_confidence(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the output video path.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /// Set the frame rate used for sources without one.
    #[must_use]
    pub const fn with_fallback_fps(mut self, fps: f32) -> Self {
        self.fallback_fps = fps;
        self
    }

    /// Resolved path of the external binary.
    #[must_use]
    pub fn binary_path(&self) -> PathBuf {
        self.binary
            .clone()
            .unwrap_or_else(|| self.workdir.join(DEFAULT_BINARY))
    }

    /// Resolved path of the output video.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        resolve(&self.workdir, &self.output)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
