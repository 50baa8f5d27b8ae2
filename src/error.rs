// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the annotation tools.

use std::fmt;
use std::path::PathBuf;

/// Result type alias for annotation operations.
pub type Result<T> = std::result::Result<T, AnnotateError>;

/// Main error type for the annotation tools.
#[derive(Debug)]
pub enum AnnotateError {
    /// The source video (or frame directory) could not be opened or decoded.
    VideoOpen(String),
    /// The external inference binary does not exist.
    BinaryNotFound(PathBuf),
    /// A per-frame invocation of the external binary failed.
    FrameFailed {
        /// 1-based frame index.
        index: usize,
        /// Exit code, `None` when the process was terminated by a signal.
        code: Option<i32>,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },
    /// No annotated frames exist after the annotation stage.
    NoAnnotatedFrames,
    /// Some, but not all, annotated frames exist after the annotation stage.
    IncompleteAnnotation {
        /// First missing annotated frame.
        missing: PathBuf,
        /// Number of annotated frames found.
        found: usize,
        /// Number of annotated frames expected.
        expected: usize,
    },
    /// The output video writer could not be opened.
    WriterOpen(String),
    /// An annotated frame could not be read back or appended to the output video.
    FrameUnreadable(String),
    /// The PyTorch checkpoint given to `export` does not exist.
    CheckpointNotFound(PathBuf),
    /// The Python exporter exited non-zero.
    ExportFailed {
        /// Exit code, `None` when the process was terminated by a signal.
        code: Option<i32>,
    },
    /// Error loading the ONNX model.
    ModelLoadError(String),
    /// Error during model inference.
    InferenceError(String),
    /// Error processing images.
    ImageError(String),
    /// Video/stream processing error.
    VideoError(String),
    /// IO error with context.
    IoError(String),
    /// Wrapped `std::io::Error`.
    Io(std::io::Error),
    /// Feature not enabled.
    FeatureNotEnabled(String),
}

impl AnnotateError {
    /// Process exit code for this error.
    ///
    /// The video driver reports each failure class with its own code. `export`
    /// exits 2 for a missing checkpoint and passes the exporter's 3 and 4 through.
    /// Everything else exits with `1`.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::VideoOpen(_) => 2,
            Self::BinaryNotFound(_) => 3,
            Self::FrameFailed { .. } => 4,
            Self::NoAnnotatedFrames | Self::IncompleteAnnotation { .. } => 5,
            Self::WriterOpen(_) => 6,
            Self::FrameUnreadable(_) => 7,
            Self::CheckpointNotFound(_) => 2,
            Self::ExportFailed {
                code: Some(code @ (3 | 4)),
            } => *code,
            _ => 1,
        }
    }
}

impl fmt::Display for AnnotateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VideoOpen(msg) => write!(f, "Failed to open video: {msg}"),
            Self::BinaryNotFound(path) => write!(f, "Binary not found: {}", path.display()),
            Self::FrameFailed { index, code, .. } => match code {
                Some(code) => write!(f, "Frame {index} failed: {code}"),
                None => write!(f, "Frame {index} failed: terminated by signal"),
            },
            Self::NoAnnotatedFrames => write!(f, "No annotated frames found"),
            Self::IncompleteAnnotation {
                missing,
                found,
                expected,
            } => write!(
                f,
                "Annotated frames incomplete ({found}/{expected}), missing {}",
                missing.display()
            ),
            Self::WriterOpen(msg) => write!(f, "Failed to open output video writer: {msg}"),
            Self::FrameUnreadable(msg) => write!(f, "Failed to read annotated frame: {msg}"),
            Self::CheckpointNotFound(path) => {
                write!(f, ".pt file not found: {}", path.display())
            }
            Self::ExportFailed { code } => match code {
                Some(code) => write!(f, "Export failed: {code}"),
                None => write!(f, "Export failed: terminated by signal"),
            },
            Self::ModelLoadError(msg) => write!(f, "Model load error: {msg}"),
            Self::InferenceError(msg) => write!(f, "Inference error: {msg}"),
            Self::ImageError(msg) => write!(f, "Image error: {msg}"),
            Self::VideoError(msg) => write!(f, "Video error: {msg}"),
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::FeatureNotEnabled(msg) => write!(f, "Feature not enabled: {msg}"),
        }
    }
}

impl std::error::Error for AnnotateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AnnotateError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for AnnotateError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageError(err.to_string())
    }
}
