// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # trt-annotate
//!
//! Frame-by-frame video annotation driven by an external `TensorRT` inference
//! binary, plus ONNX detection and class-name tooling for the same models.
//!
//! ## Annotated video
//!
//! The [`FramePipeline`] decodes a video into numbered image frames, runs the
//! external binary once per frame, checks that every frame came back annotated and
//! re-encodes the results at the source frame rate and resolution.
//!
//! ```no_run
//! use std::path::Path;
//! use trt_annotate::{FramePipeline, PipelineConfig};
//!
//! let config = PipelineConfig::new("best.engine", 640, 640)
//!     .with_workdir("/tmp/run")
//!     .with_confidence(0.4);
//!
//! # #[cfg(feature = "video")]
//! let report = FramePipeline::new(config).run(Path::new("input.mp4"), |path, info| {
//!     let (w, h) = (info.width as usize, info.height as usize);
//!     trt_annotate::io::VideoWriter::new(path, w, h, info.fps)
//! })?;
//! # #[cfg(feature = "video")]
//! println!("{} frames written", report.frames_written);
//! # Ok::<(), trt_annotate::AnnotateError>(())
//! ```
//!
//! ## Detection inference
//!
//! ```no_run
//! use trt_annotate::{Detector, InferenceConfig};
//!
//! let mut detector = Detector::load("best.onnx", InferenceConfig::new().with_confidence(0.4))?;
//! let img = image::open("frame.png")?;
//! let prediction = detector.predict_image(&img, "frame.png")?;
//! for line in prediction.detection_lines() {
//!     println!("{line}");
//! }
//! # Ok::<(), trt_annotate::AnnotateError>(())
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Annotate a video with the external binary
//! trt-annotate video best.engine input.mp4 640 640 annotated.mp4 --conf 0.4
//!
//! # Run ONNX detection and save annotated images
//! trt-annotate predict --model best.onnx --source images/
//!
//! # Write the class names the external binary reads
//! trt-annotate names --model best.onnx --out names.txt
//!
//! # Export a PyTorch checkpoint to ONNX (needs Python with torch)
//! trt-annotate export --pt best.pt --onnx best.onnx --ultralytics
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`pipeline`] | [`FramePipeline`] driver, annotation jobs, scratch directories |
//! | [`source`] | Frame readers for video files and image directories |
//! | [`io`] | Frame sinks, the video encoder, `predict` result saving |
//! | [`detector`] | ONNX Runtime [`Detector`] |
//! | [`preprocessing`] | Letterbox resize and tensor layout |
//! | [`postprocessing`] | Detection output decoding and NMS |
//! | [`results`] | [`Prediction`] and [`Detection`] |
//! | [`metadata`] | Ultralytics model metadata parsing |
//! | [`error`] | [`AnnotateError`] and exit codes |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `annotate` | Box and label drawing for `predict` result saving (default) |
//! | `video` | Video decoding and encoding through FFmpeg (default) |

// Modules
#[cfg(feature = "annotate")]
pub mod annotate;
pub mod cli;
pub mod detector;
pub mod error;
pub mod inference;
pub mod io;
pub mod metadata;
pub mod pipeline;
pub mod postprocessing;
pub mod preprocessing;
pub mod results;
pub mod source;
pub mod utils;

// Re-export main types for convenience
pub use detector::Detector;
pub use error::{AnnotateError, Result};
pub use inference::InferenceConfig;
pub use metadata::ModelMetadata;
pub use pipeline::{FramePipeline, PipelineConfig, PipelineReport};
pub use results::{Detection, Prediction, Speed};
pub use source::{Source, SourceIterator, SourceMeta, VideoInfo};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
