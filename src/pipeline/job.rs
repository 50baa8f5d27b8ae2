// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Per-frame annotation jobs and the external binary that runs them.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::{AnnotateError, Result};

/// One invocation of the external inference binary for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationJob {
    /// 1-based frame sequence index.
    pub index: usize,
    /// Compiled inference engine.
    pub engine: String,
    /// Extracted input frame.
    pub input: PathBuf,
    /// Network input width.
    pub input_w: u32,
    /// Network input height.
    pub input_h: u32,
    /// Class-names file.
    pub names: PathBuf,
    /// Where the annotated frame must be written.
    pub output: PathBuf,
    /// Confidence threshold.
    pub confidence_threshold: f32,
}

impl AnnotationJob {
    /// Command-line arguments in invocation order:
    /// `<engine> <frame> <w> <h> --names <names> --out <output> --conf <threshold>`.
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        vec![
            OsString::from(&self.engine),
            self.input.clone().into_os_string(),
            OsString::from(self.input_w.to_string()),
            OsString::from(self.input_h.to_string()),
            OsString::from("--names"),
            self.names.clone().into_os_string(),
            OsString::from("--out"),
            self.output.clone().into_os_string(),
            OsString::from("--conf"),
            OsString::from(self.confidence_threshold.to_string()),
        ]
    }
}

/// Produces one annotated image per job.
pub trait Annotator {
    /// Check that the annotator can run at all.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotateError::BinaryNotFound`] when the backing executable is missing.
    fn ensure_available(&self) -> Result<()>;

    /// Run one job, blocking until its annotated image is written.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotateError::FrameFailed`] when the job does not succeed.
    fn annotate(&self, job: &AnnotationJob) -> Result<()>;
}

/// Runs the external inference binary as a subprocess, one process per frame.
#[derive(Debug, Clone)]
pub struct ExternalAnnotator {
    binary: PathBuf,
}

impl ExternalAnnotator {
    /// Create an annotator for the given binary.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// The full command for a job, without running it.
    #[must_use]
    pub fn command(&self, job: &AnnotationJob) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(job.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Annotator for ExternalAnnotator {
    fn ensure_available(&self) -> Result<()> {
        if self.binary.exists() {
            Ok(())
        } else {
            Err(AnnotateError::BinaryNotFound(self.binary.clone()))
        }
    }

    fn annotate(&self, job: &AnnotationJob) -> Result<()> {
        let output = self.command(job).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AnnotateError::BinaryNotFound(self.binary.clone())
            } else {
                AnnotateError::IoError(format!(
                    "Failed to run {} for frame {}: {e}",
                    self.binary.display(),
                    job.index
                ))
            }
        })?;

        if output.status.success() {
            return Ok(());
        }

        Err(AnnotateError::FrameFailed {
            index: job.index,
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
