// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! End-to-end tests for the frame pipeline driver.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use trt_annotate::io::FrameSink;
use trt_annotate::pipeline::{AnnotationJob, Annotator, FramePipeline, PipelineConfig};
use trt_annotate::{AnnotateError, Result, VideoInfo};

/// Write `count` solid-color 640x480 frames into `dir`.
fn write_frames(dir: &Path, count: usize) {
    fs::create_dir_all(dir).unwrap();
    for i in 0..count {
        #[allow(clippy::cast_possible_truncation)]
        let shade = (i * 40) as u8;
        let img = RgbImage::from_pixel(640, 480, Rgb([shade, 0, 255 - shade]));
        img.save(dir.join(format!("{:06}.png", i + 1))).unwrap();
    }
}

/// Copies each input frame to its output path, optionally failing one frame.
struct CopyAnnotator {
    fail_at: Option<usize>,
    calls: RefCell<Vec<AnnotationJob>>,
}

impl CopyAnnotator {
    fn new() -> Self {
        Self {
            fail_at: None,
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl Annotator for CopyAnnotator {
    fn ensure_available(&self) -> Result<()> {
        Ok(())
    }

    fn annotate(&self, job: &AnnotationJob) -> Result<()> {
        self.calls.borrow_mut().push(job.clone());
        if self.fail_at == Some(job.index) {
            return Err(AnnotateError::FrameFailed {
                index: job.index,
                code: Some(1),
                stdout: String::new(),
                stderr: "engine rejected frame".to_string(),
            });
        }
        fs::copy(&job.input, &job.output)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Recorded {
    opened: Option<(PathBuf, VideoInfo)>,
    frames: Vec<(u32, u32)>,
    finished: bool,
}

struct RecordingSink(Rc<RefCell<Recorded>>);

impl FrameSink for RecordingSink {
    fn write_frame(&mut self, frame: &DynamicImage) -> Result<()> {
        self.0.borrow_mut().frames.push(frame.dimensions());
        Ok(())
    }

    fn finish(self) -> Result<()> {
        self.0.borrow_mut().finished = true;
        Ok(())
    }
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir).map_or(0, |entries| entries.count())
}

#[test]
fn test_three_frames_round_trip() {
    let src = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    write_frames(src.path(), 3);

    let config = PipelineConfig::new("best.engine", 640, 640).with_workdir(work.path());
    let pipeline = FramePipeline::with_annotator(config, CopyAnnotator::new());

    let recorded = Rc::new(RefCell::new(Recorded::default()));
    let sink_state = Rc::clone(&recorded);
    let report = pipeline
        .run(src.path(), move |path, info| {
            sink_state.borrow_mut().opened = Some((path.to_path_buf(), *info));
            Ok(RecordingSink(sink_state))
        })
        .unwrap();

    assert_eq!(report.frames_extracted, 3);
    assert_eq!(report.frames_annotated, 3);
    assert_eq!(report.frames_written, 3);
    assert_eq!(count_files(&report.scratch.input), 3);
    assert_eq!(count_files(&report.scratch.output), 3);

    let recorded = recorded.borrow();
    let (path, info) = recorded.opened.clone().unwrap();
    assert_eq!(path, work.path().join("trt_result_video_from_frames.mp4"));
    assert!((info.fps - 25.0).abs() < f32::EPSILON);
    assert_eq!((info.width, info.height), (640, 480));
    assert_eq!(recorded.frames, vec![(640, 480); 3]);
    assert!(recorded.finished);
}

#[test]
fn test_jobs_preserve_frame_order() {
    let src = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    write_frames(src.path(), 3);

    let config = PipelineConfig::new("best.engine", 640, 480)
        .with_workdir(work.path())
        .with_confidence(0.4);
    let pipeline = FramePipeline::with_annotator(config, CopyAnnotator::new());

    let recorded = Rc::new(RefCell::new(Recorded::default()));
    let sink_state = Rc::clone(&recorded);
    pipeline
        .run(src.path(), move |_, _| Ok(RecordingSink(sink_state)))
        .unwrap();

    let calls = pipeline_calls(&pipeline);
    let indices: Vec<usize> = calls.iter().map(|job| job.index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
    for job in &calls {
        assert_eq!(job.input.file_name(), job.output.file_name());
        assert_eq!((job.input_w, job.input_h), (640, 480));
        assert!((job.confidence_threshold - 0.4).abs() < f32::EPSILON);
    }
}

fn pipeline_calls(pipeline: &FramePipeline<CopyAnnotator>) -> Vec<AnnotationJob> {
    pipeline.annotator().calls.borrow().clone()
}

#[test]
fn test_missing_binary_aborts_before_extraction() {
    let src = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    write_frames(src.path(), 3);

    let config = PipelineConfig::new("best.engine", 640, 640)
        .with_workdir(work.path())
        .with_binary(work.path().join("missing_binary"));
    let pipeline = FramePipeline::new(config);

    let err = pipeline
        .run(src.path(), |_, _| -> Result<RecordingSink> {
            panic!("writer must not be opened")
        })
        .unwrap_err();

    assert!(matches!(err, AnnotateError::BinaryNotFound(_)));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(count_files(&work.path().join("tmp_in_frames")), 0);
    assert!(!work.path().join("trt_result_video_from_frames.mp4").exists());
}

#[test]
fn test_failed_frame_aborts_before_assembly() {
    let src = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    write_frames(src.path(), 3);

    let annotator = CopyAnnotator {
        fail_at: Some(2),
        calls: RefCell::new(Vec::new()),
    };
    let config = PipelineConfig::new("best.engine", 640, 640).with_workdir(work.path());
    let pipeline = FramePipeline::with_annotator(config, annotator);

    let err = pipeline
        .run(src.path(), |_, _| -> Result<RecordingSink> {
            panic!("writer must not be opened")
        })
        .unwrap_err();

    assert_eq!(err.exit_code(), 4);
    assert_eq!(pipeline_calls(&pipeline).len(), 2);
    assert_eq!(count_files(&work.path().join("tmp_out_frames")), 1);
}

#[test]
fn test_unreadable_source_is_video_open_error() {
    let work = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new("best.engine", 640, 640).with_workdir(work.path());
    let pipeline = FramePipeline::with_annotator(config, CopyAnnotator::new());

    let err = pipeline
        .run(&work.path().join("missing.mp4"), |_, _| -> Result<RecordingSink> {
            panic!("writer must not be opened")
        })
        .unwrap_err();

    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_writer_open_failure() {
    let src = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    write_frames(src.path(), 2);

    let config = PipelineConfig::new("best.engine", 640, 640).with_workdir(work.path());
    let pipeline = FramePipeline::with_annotator(config, CopyAnnotator::new());

    let err = pipeline
        .run(src.path(), |_, _| -> Result<RecordingSink> {
            Err(AnnotateError::VideoError("no encoder".to_string()))
        })
        .unwrap_err();

    assert!(matches!(err, AnnotateError::WriterOpen(_)));
    assert_eq!(err.exit_code(), 6);
}

/// Writes bytes that are not an image to every output path.
struct GarbageAnnotator;

impl Annotator for GarbageAnnotator {
    fn ensure_available(&self) -> Result<()> {
        Ok(())
    }

    fn annotate(&self, job: &AnnotationJob) -> Result<()> {
        fs::write(&job.output, b"engine log, not a frame")?;
        Ok(())
    }
}

#[test]
fn test_non_image_output_is_unreadable_frame() {
    let src = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    write_frames(src.path(), 2);

    let config = PipelineConfig::new("best.engine", 640, 640).with_workdir(work.path());
    let pipeline = FramePipeline::with_annotator(config, GarbageAnnotator);

    let recorded = Rc::new(RefCell::new(Recorded::default()));
    let sink_state = Rc::clone(&recorded);
    let err = pipeline
        .run(src.path(), move |_, _| Ok(RecordingSink(sink_state)))
        .unwrap_err();

    assert!(matches!(err, AnnotateError::FrameUnreadable(_)));
    assert_eq!(err.exit_code(), 7);
    assert!(err.to_string().contains("frame_000001.png"));
    assert!(recorded.borrow().frames.is_empty());
    assert!(!recorded.borrow().finished);
}

/// Accepts `accept` frames, then fails every write.
struct RejectingSink {
    accept: usize,
    written: usize,
}

impl FrameSink for RejectingSink {
    fn write_frame(&mut self, _frame: &DynamicImage) -> Result<()> {
        if self.written == self.accept {
            return Err(AnnotateError::VideoError("encoder rejected frame".to_string()));
        }
        self.written += 1;
        Ok(())
    }

    fn finish(self) -> Result<()> {
        panic!("a failed run must not finish the writer")
    }
}

#[test]
fn test_sink_write_failure_is_unreadable_frame() {
    let src = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    write_frames(src.path(), 3);

    let config = PipelineConfig::new("best.engine", 640, 640).with_workdir(work.path());
    let pipeline = FramePipeline::with_annotator(config, CopyAnnotator::new());

    let err = pipeline
        .run(src.path(), |_, _| {
            Ok(RejectingSink {
                accept: 1,
                written: 0,
            })
        })
        .unwrap_err();

    assert!(matches!(err, AnnotateError::FrameUnreadable(_)));
    assert_eq!(err.exit_code(), 7);
    let message = err.to_string();
    assert!(message.contains("frame_000002.png"));
    assert!(message.contains("encoder rejected frame"));
}

#[cfg(feature = "video")]
mod encoded_video {
    use super::*;
    use trt_annotate::io::VideoWriter;
    use trt_annotate::source::FrameReader;

    /// Encode `count` 640x480 frames at 25 fps.
    fn write_clip(path: &Path, count: usize) {
        let mut writer = VideoWriter::new(path, 640, 480, 25.0).unwrap();
        for i in 0..count {
            #[allow(clippy::cast_possible_truncation)]
            let shade = (i * 60) as u8;
            let img = RgbImage::from_pixel(640, 480, Rgb([shade, 128, 255 - shade]));
            writer.write_frame(&DynamicImage::ImageRgb8(img)).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_video_in_video_out() {
        let src = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let input = src.path().join("input.mp4");
        write_clip(&input, 3);

        let config = PipelineConfig::new("best.engine", 640, 640).with_workdir(work.path());
        let report = FramePipeline::with_annotator(config, CopyAnnotator::new())
            .run(&input, |path, info| {
                let (w, h) = (info.width as usize, info.height as usize);
                VideoWriter::new(path, w, h, info.fps)
            })
            .unwrap();

        assert_eq!(report.frames_extracted, 3);
        assert_eq!(report.frames_annotated, 3);
        assert_eq!(report.frames_written, 3);
        assert_eq!((report.info.width, report.info.height), (640, 480));

        let reader = FrameReader::open(&report.output, 1.0).unwrap();
        let info = reader.info();
        assert_eq!((info.width, info.height), (640, 480));
        assert!((info.fps - 25.0).abs() < 0.5, "fps was {}", info.fps);

        let frames: Vec<DynamicImage> = reader.map(|frame| frame.unwrap()).collect();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|frame| frame.dimensions() == (640, 480)));
    }
}

#[cfg(unix)]
mod external_binary {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_real_subprocess_contract() {
        let src = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        write_frames(src.path(), 2);

        let log = work.path().join("calls.log");
        let binary = script(
            work.path(),
            "trt_infer_video_fix",
            &format!("echo \"$@\" >> {}\ncp \"$2\" \"$8\"", log.display()),
        );

        let config = PipelineConfig::new("best.engine", 640, 480)
            .with_workdir(work.path())
            .with_names("names.txt")
            .with_confidence(0.25);
        assert_eq!(config.binary_path(), binary);

        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let sink_state = Rc::clone(&recorded);
        let report = FramePipeline::new(config)
            .run(src.path(), move |_, _| Ok(RecordingSink(sink_state)))
            .unwrap();
        assert_eq!(report.frames_written, 2);

        let calls = fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = calls.lines().collect();
        assert_eq!(lines.len(), 2);

        let input = report.scratch.input.join("frame_000001.png");
        let output = report.scratch.output.join("frame_000001.png");
        assert_eq!(
            lines[0],
            format!(
                "best.engine {} 640 480 --names names.txt --out {} --conf 0.25",
                input.display(),
                output.display()
            )
        );
    }

    #[test]
    fn test_nonzero_exit_reports_frame_and_output() {
        let src = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        write_frames(src.path(), 2);

        script(work.path(), "trt_infer_video_fix", "echo engine failed\nexit 3");

        let config = PipelineConfig::new("best.engine", 640, 640).with_workdir(work.path());
        let err = FramePipeline::new(config)
            .run(src.path(), |_, _| -> Result<RecordingSink> {
                panic!("writer must not be opened")
            })
            .unwrap_err();

        match err {
            AnnotateError::FrameFailed {
                index,
                code,
                stdout,
                ..
            } => {
                assert_eq!(index, 1);
                assert_eq!(code, Some(3));
                assert_eq!(stdout.trim(), "engine failed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_binary_that_writes_nothing() {
        let src = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        write_frames(src.path(), 2);

        script(work.path(), "trt_infer_video_fix", "exit 0");

        let config = PipelineConfig::new("best.engine", 640, 640).with_workdir(work.path());
        let err = FramePipeline::new(config)
            .run(src.path(), |_, _| -> Result<RecordingSink> {
                panic!("writer must not be opened")
            })
            .unwrap_err();

        assert!(matches!(err, AnnotateError::NoAnnotatedFrames));
        assert_eq!(err.exit_code(), 5);
    }
}
