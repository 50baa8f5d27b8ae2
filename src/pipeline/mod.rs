// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Frame pipeline driver.
//!
//! Turns a source video into an annotated video by way of an external inference
//! binary that only understands single images:
//!
//! 1. Recreate the scratch directories (`tmp_in_frames`, `tmp_out_frames`).
//! 2. Open the source and check the external binary exists.
//! 3. Extract every frame to `tmp_in_frames/frame_NNNNNN.png`.
//! 4. Run the binary once per frame, writing `tmp_out_frames/<same name>`.
//! 5. Check the annotated set is complete, then re-encode it at the source frame
//!    rate and dimensions.
//!
//! Everything runs sequentially and any failure aborts the run. Each failure maps
//! to its own exit code through [`AnnotateError::exit_code`].
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "video")]
//! # fn main() -> trt_annotate::Result<()> {
//! use trt_annotate::io::VideoWriter;
//! use trt_annotate::{FramePipeline, PipelineConfig};
//!
//! let config = PipelineConfig::new("best.engine", 640, 640).with_output("annotated.mp4");
//! let report = FramePipeline::new(config).run(std::path::Path::new("input.mp4"), |path, info| {
//!     VideoWriter::new(path, info.width as usize, info.height as usize, info.fps)
//! })?;
//! println!("wrote {} frames", report.frames_written);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "video"))]
//! # fn main() {}
//! ```

pub mod config;
pub mod job;
pub mod scratch;

use std::path::{Path, PathBuf};

use crate::error::{AnnotateError, Result};
use crate::io::FrameSink;
use crate::source::{FrameReader, VideoInfo};
use crate::{info, verbose};

pub use config::PipelineConfig;
pub use job::{AnnotationJob, Annotator, ExternalAnnotator};
pub use scratch::{ScratchDirs, frame_file_name};

/// Progress is reported every this many extracted frames.
const EXTRACT_LOG_EVERY: usize = 100;
/// Progress is reported every this many annotated frames.
const ANNOTATE_LOG_EVERY: usize = 50;
/// Progress is reported every this many written frames.
const WRITE_LOG_EVERY: usize = 100;

/// Outcome of a successful driver run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Source frame rate and dimensions, also used for the output.
    pub info: VideoInfo,
    /// Frames written to the input scratch directory.
    pub frames_extracted: usize,
    /// Frames the external binary annotated.
    pub frames_annotated: usize,
    /// Frames appended to the output video.
    pub frames_written: usize,
    /// Output video path.
    pub output: PathBuf,
    /// Scratch directories used by the run.
    pub scratch: ScratchDirs,
}

/// Drives one source video through the external annotator.
pub struct FramePipeline<A: Annotator = ExternalAnnotator> {
    config: PipelineConfig,
    annotator: A,
}

impl FramePipeline<ExternalAnnotator> {
    /// Create a pipeline that runs the configured external binary.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        let annotator = ExternalAnnotator::new(config.binary_path());
        Self { config, annotator }
    }
}

impl<A: Annotator> FramePipeline<A> {
    /// Create a pipeline with a custom annotator.
    pub const fn with_annotator(config: PipelineConfig, annotator: A) -> Self {
        Self { config, annotator }
    }

    /// Pipeline configuration.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Annotator that runs the per-frame jobs.
    pub const fn annotator(&self) -> &A {
        &self.annotator
    }

    /// Run the full pipeline on `video`.
    ///
    /// `open_sink` is called once, after every frame has been annotated, with the
    /// resolved output path and the source's frame rate and dimensions.
    ///
    /// # Errors
    ///
    /// Returns the first failure; see [`AnnotateError::exit_code`] for how each
    /// maps to a process exit code. Scratch contents written before the failure
    /// are left in place.
    pub fn run<S, F>(&self, video: &Path, open_sink: F) -> Result<PipelineReport>
    where
        S: FrameSink,
        F: FnOnce(&Path, &VideoInfo) -> Result<S>,
    {
        let scratch = ScratchDirs::prepare(&self.config.workdir)?;

        let reader = FrameReader::open(video, self.config.fallback_fps)?;
        let info = reader.info();
        info!(
            "Video opened: {} fps={} size={}x{}",
            video.display(),
            info.fps,
            info.width,
            info.height
        );

        self.annotator.ensure_available()?;

        let frames = extract_frames(reader, &scratch)?;
        info!("Total frames extracted: {}", frames.len());

        let jobs = self.build_jobs(&frames, &scratch);
        self.annotate_all(&jobs)?;
        verify_outputs(&jobs)?;

        let output = self.config.output_path();
        let sink = open_sink(&output, &info).map_err(into_writer_open)?;
        let frames_written = assemble(&jobs, sink)?;
        info!("Annotated video written to {}", output.display());

        Ok(PipelineReport {
            info,
            frames_extracted: frames.len(),
            frames_annotated: jobs.len(),
            frames_written,
            output,
            scratch,
        })
    }

    /// One job per extracted frame, output named after the input frame.
    fn build_jobs(&self, frames: &[PathBuf], scratch: &ScratchDirs) -> Vec<AnnotationJob> {
        frames
            .iter()
            .enumerate()
            .map(|(i, input)| AnnotationJob {
                index: i + 1,
                engine: self.config.engine.clone(),
                input: input.clone(),
                input_w: self.config.input_w,
                input_h: self.config.input_h,
                names: self.config.names.clone(),
                output: scratch
                    .output
                    .join(input.file_name().unwrap_or_default()),
                confidence_threshold: self.config.confidence_threshold,
            })
            .collect()
    }

    fn annotate_all(&self, jobs: &[AnnotationJob]) -> Result<()> {
        for job in jobs {
            self.annotator.annotate(job)?;
            if job.index % ANNOTATE_LOG_EVERY == 0 {
                verbose!("Processed {} frames", job.index);
            }
        }
        Ok(())
    }
}

/// Write every decoded frame to the input scratch directory, in order.
fn extract_frames(reader: FrameReader, scratch: &ScratchDirs) -> Result<Vec<PathBuf>> {
    let mut frames = Vec::new();

    for (i, frame) in reader.enumerate() {
        let index = i + 1;
        let img = frame.map_err(|e| match e {
            AnnotateError::VideoOpen(_) => e,
            other => AnnotateError::VideoOpen(other.to_string()),
        })?;

        let path = scratch.input_frame(index);
        img.save(&path)
            .map_err(|e| AnnotateError::ImageError(format!("{}: {e}", path.display())))?;
        frames.push(path);

        if index % EXTRACT_LOG_EVERY == 0 {
            verbose!("Saved {index} frames");
        }
    }

    Ok(frames)
}

/// Every job must have produced its output before anything is encoded.
fn verify_outputs(jobs: &[AnnotationJob]) -> Result<()> {
    let found = jobs.iter().filter(|job| job.output.is_file()).count();

    if found == 0 {
        return Err(AnnotateError::NoAnnotatedFrames);
    }

    if let Some(missing) = jobs.iter().find(|job| !job.output.is_file()) {
        return Err(AnnotateError::IncompleteAnnotation {
            missing: missing.output.clone(),
            found,
            expected: jobs.len(),
        });
    }

    Ok(())
}

/// Read back annotated frames in job order and append them to `sink`.
fn assemble<S: FrameSink>(jobs: &[AnnotationJob], mut sink: S) -> Result<usize> {
    for job in jobs {
        let img = image::open(&job.output).map_err(|e| {
            AnnotateError::FrameUnreadable(format!("{}: {e}", job.output.display()))
        })?;

        sink.write_frame(&img).map_err(|e| {
            AnnotateError::FrameUnreadable(format!("{}: {e}", job.output.display()))
        })?;

        if job.index % WRITE_LOG_EVERY == 0 {
            verbose!("Wrote {} frames to video", job.index);
        }
    }

    sink.finish()?;
    Ok(jobs.len())
}

fn into_writer_open(err: AnnotateError) -> AnnotateError {
    match err {
        AnnotateError::WriterOpen(_) => err,
        other => AnnotateError::WriterOpen(other.to_string()),
    }
}
