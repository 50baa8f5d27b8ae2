// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::Path;

use crate::cli::args::VideoArgs;
use crate::error::Result;
use crate::pipeline::{FramePipeline, PipelineConfig, PipelineReport};
use crate::source::VideoInfo;
use crate::{section, success};

/// Build the pipeline configuration from parsed arguments.
#[must_use]
pub fn pipeline_config(args: &VideoArgs) -> PipelineConfig {
    let mut config = PipelineConfig::new(args.engine.clone(), args.input_w, args.input_h)
        .with_workdir(args.workdir.clone())
        .with_names(args.names.clone())
        .with_confidence(args.conf);

    if let Some(binary) = &args.binary {
        config = config.with_binary(binary.clone());
    }
    if let Some(out) = &args.out_video {
        config = config.with_output(out.clone());
    }
    if let Some(fps) = args.fps {
        config = config.with_fallback_fps(fps);
    }
    config
}

/// Run the annotated-video driver.
///
/// # Errors
///
/// Returns the first pipeline failure; the caller turns it into an exit code.
pub fn run_video(args: &VideoArgs) -> Result<PipelineReport> {
    let config = pipeline_config(args);

    section!("Annotating {}", args.video.display());
    let report = FramePipeline::new(config).run(&args.video, open_writer)?;

    success!(
        "{} frames annotated, {} written at {:.2} fps ({}x{})",
        report.frames_annotated,
        report.frames_written,
        report.info.fps,
        report.info.width,
        report.info.height
    );
    Ok(report)
}

#[cfg(feature = "video")]
fn open_writer(path: &Path, info: &VideoInfo) -> Result<crate::io::VideoWriter> {
    crate::io::VideoWriter::new(path, info.width as usize, info.height as usize, info.fps)
}

#[cfg(not(feature = "video"))]
fn open_writer(path: &Path, _info: &VideoInfo) -> Result<NoVideoWriter> {
    Err(crate::error::AnnotateError::WriterOpen(format!(
        "{}: encoding video requires the 'video' feature",
        path.display()
    )))
}

/// Sink type for builds without an encoder; never constructed.
#[cfg(not(feature = "video"))]
pub enum NoVideoWriter {}

#[cfg(not(feature = "video"))]
impl crate::io::FrameSink for NoVideoWriter {
    fn write_frame(&mut self, _frame: &image::DynamicImage) -> Result<()> {
        match *self {}
    }

    fn finish(self) -> Result<()> {
        match self {}
    }
}
