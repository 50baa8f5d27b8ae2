// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Output side: the frame sink used by the video driver, the `video-rs` encoder,
//! and result saving for `predict`.

#[cfg(feature = "video")]
use video_rs::{Encoder, Options, Time, encode::Settings as EncoderSettings};

use crate::error::{AnnotateError, Result};
use std::path::{Path, PathBuf};

#[cfg(feature = "video")]
use std::sync::Once;

#[cfg(feature = "video")]
static INIT: Once = Once::new();

/// Initialize global video logging configuration.
///
/// Ensures `video-rs` is initialized and `FFmpeg` logs are silenced
/// (only errors are shown). Safe to call multiple times.
#[allow(clippy::missing_const_for_fn)]
pub fn init_logging() {
    #[cfg(feature = "video")]
    INIT.call_once(|| {
        if let Err(e) = video_rs::init() {
            crate::warn!("Failed to initialize video-rs: {e}");
        }

        ffmpeg_next::log::set_level(ffmpeg_next::log::Level::Error);
    });
}

/// Destination for an ordered sequence of frames.
pub trait FrameSink {
    /// Append one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be written.
    fn write_frame(&mut self, frame: &image::DynamicImage) -> Result<()>;

    /// Flush and close the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails to finish.
    fn finish(self) -> Result<()>
    where
        Self: Sized;
}

/// A wrapper around `video-rs` encoder to simplify video saving.
#[cfg(feature = "video")]
pub struct VideoWriter {
    encoder: Encoder,
    frame_duration: Time,
    position: Time,
    width: usize,
    height: usize,
}

#[cfg(feature = "video")]
impl VideoWriter {
    /// Create a new `VideoWriter`.
    ///
    /// # Arguments
    ///
    /// * `path` - Output video path (e.g., "output.mp4").
    /// * `width` - Video width.
    /// * `height` - Video height.
    /// * `fps` - Frames per second.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder cannot be initialized.
    pub fn new<P: AsRef<Path>>(path: P, width: usize, height: usize, fps: f32) -> Result<Self> {
        init_logging();
        let output_path = path.as_ref().to_path_buf();

        if let Some(parent) = output_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                AnnotateError::IoError(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        if width == 0 || height == 0 {
            return Err(AnnotateError::VideoError(format!(
                "Invalid video dimensions {width}x{height}"
            )));
        }

        let settings = encoder_settings(width, height);
        let encoder = Encoder::new(output_path.as_path(), settings).map_err(|e| {
            AnnotateError::VideoError(format!("Failed to create video encoder: {e}"))
        })?;

        let frame_duration = Time::from_secs_f64(1.0 / f64::from(fps));

        Ok(Self {
            encoder,
            frame_duration,
            position: Time::zero(),
            width,
            height,
        })
    }

    /// Write a frame to the video.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or frame dimensions don't match.
    pub fn write_frame(&mut self, frame: &image::DynamicImage) -> Result<()> {
        let img_buffer = frame.to_rgb8();
        let width = img_buffer.width() as usize;
        let height = img_buffer.height() as usize;

        if width != self.width || height != self.height {
            return Err(AnnotateError::VideoError(format!(
                "Frame dimensions {}x{} do not match video dimensions {}x{}",
                width, height, self.width, self.height
            )));
        }

        let frame_array = ndarray::Array3::from_shape_vec((height, width, 3), img_buffer.into_raw())
            .map_err(|e| AnnotateError::VideoError(e.to_string()))?;

        self.encoder
            .encode(&frame_array, self.position)
            .map_err(|e| AnnotateError::VideoError(format!("Failed to encode frame: {e}")))?;

        self.position = self.position.aligned_with(self.frame_duration).add();
        Ok(())
    }

    /// Finish writing the video.
    ///
    /// Calling this explicitly is optional as `drop` will also clean up,
    /// but this allows catching errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder fails to finish.
    pub fn finish(mut self) -> Result<()> {
        self.encoder.finish().map_err(|e| {
            AnnotateError::VideoError(format!("Failed to finish video encoding: {e}"))
        })
    }
}

/// Whether `width`x`height` needs full chroma resolution.
///
/// 4:2:0 subsampling halves both chroma planes, so it only fits even dimensions.
#[must_use]
pub const fn needs_full_chroma(width: usize, height: usize) -> bool {
    width % 2 != 0 || height % 2 != 0
}

/// H.264 settings for a frame size: yuv420p when it fits, yuv444p otherwise.
#[cfg(feature = "video")]
fn encoder_settings(width: usize, height: usize) -> EncoderSettings {
    if needs_full_chroma(width, height) {
        EncoderSettings::preset_h264_custom(
            width,
            height,
            ffmpeg_next::format::Pixel::YUV444P,
            Options::preset_h264(),
        )
    } else {
        EncoderSettings::preset_h264_yuv420p(width, height, false)
    }
}

#[cfg(feature = "video")]
impl FrameSink for VideoWriter {
    fn write_frame(&mut self, frame: &image::DynamicImage) -> Result<()> {
        Self::write_frame(self, frame)
    }

    fn finish(self) -> Result<()> {
        Self::finish(self)
    }
}

/// Helper struct to handle saving annotated `predict` results to video or disk.
///
/// Video sources are appended to a single `.mp4` named after the source; images
/// are saved under their original file name.
pub struct SaveResults {
    save_dir: PathBuf,
    #[cfg(feature = "video")]
    video_writer: Option<VideoWriter>,
}

impl SaveResults {
    /// Create a new `SaveResults` writing into `save_dir`.
    #[must_use]
    pub fn new(save_dir: PathBuf) -> Self {
        init_logging();

        Self {
            save_dir,
            #[cfg(feature = "video")]
            video_writer: None,
        }
    }

    /// Directory results are written to.
    #[must_use]
    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Save an annotated frame.
    ///
    /// # Arguments
    ///
    /// * `is_video` - Whether the source is a video.
    /// * `meta` - Source metadata (path, frame index, fps).
    /// * `annotated` - The annotated image to save.
    ///
    /// # Errors
    ///
    /// Returns an error if saving the image or video frame fails.
    pub fn save(
        &mut self,
        is_video: bool,
        meta: &crate::source::SourceMeta,
        annotated: &image::DynamicImage,
    ) -> Result<()> {
        if !self.save_dir.exists() {
            std::fs::create_dir_all(&self.save_dir).map_err(|e| {
                AnnotateError::IoError(format!(
                    "Failed to create directory {}: {e}",
                    self.save_dir.display()
                ))
            })?;
        }

        if is_video {
            return self.save_video_frame(meta, annotated);
        }

        let filename = Path::new(&meta.path)
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let save_path = self.save_dir.join(filename);

        annotated
            .save(&save_path)
            .map_err(|e| AnnotateError::ImageError(format!("{}: {e}", save_path.display())))
    }

    #[cfg(feature = "video")]
    fn save_video_frame(
        &mut self,
        meta: &crate::source::SourceMeta,
        annotated: &image::DynamicImage,
    ) -> Result<()> {
        if self.video_writer.is_none() {
            let stem = Path::new(&meta.path)
                .file_stem()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string();
            let save_path = self.save_dir.join(format!("{stem}.mp4"));
            let fps = meta.fps.unwrap_or(crate::source::DEFAULT_FPS);

            self.video_writer = Some(VideoWriter::new(
                save_path,
                annotated.width() as usize,
                annotated.height() as usize,
                fps,
            )?);
        }

        match &mut self.video_writer {
            Some(writer) => writer.write_frame(annotated),
            None => Ok(()),
        }
    }

    #[cfg(not(feature = "video"))]
    #[allow(clippy::unused_self)]
    fn save_video_frame(
        &mut self,
        _meta: &crate::source::SourceMeta,
        _annotated: &image::DynamicImage,
    ) -> Result<()> {
        Err(AnnotateError::FeatureNotEnabled(
            "Saving video requires 'video' feature".to_string(),
        ))
    }

    /// Finish any active video writing.
    ///
    /// # Errors
    ///
    /// Returns an error if the video writer fails to finish.
    #[allow(clippy::missing_const_for_fn)]
    pub fn finish(self) -> Result<()> {
        #[cfg(feature = "video")]
        if let Some(writer) = self.video_writer {
            writer.finish()?;
        }
        Ok(())
    }
}

/// First free run directory under `base`: `name`, then `name2`, `name3`, ...
#[must_use]
pub fn find_next_run_dir(base: &Path, name: &str) -> PathBuf {
    let first = base.join(name);
    if !first.exists() {
        return first;
    }

    (2_usize..)
        .map(|i| base.join(format!("{name}{i}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceMeta;
    use image::{DynamicImage, RgbImage};

    #[test]
    fn test_find_next_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_next_run_dir(dir.path(), "results"), dir.path().join("results"));

        std::fs::create_dir(dir.path().join("results")).unwrap();
        std::fs::create_dir(dir.path().join("results2")).unwrap();
        assert_eq!(find_next_run_dir(dir.path(), "results"), dir.path().join("results3"));
    }

    #[test]
    fn test_full_chroma_for_odd_sizes() {
        assert!(!needs_full_chroma(640, 480));
        assert!(needs_full_chroma(641, 480));
        assert!(needs_full_chroma(640, 481));
        assert!(needs_full_chroma(641, 481));
    }

    #[cfg(feature = "video")]
    #[test]
    fn test_odd_sized_video_keeps_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.mp4");

        let mut writer = VideoWriter::new(&path, 641, 481, 25.0).unwrap();
        let frame = RgbImage::from_pixel(641, 481, image::Rgb([200, 40, 40]));
        let frame = DynamicImage::ImageRgb8(frame);
        for _ in 0..3 {
            writer.write_frame(&frame).unwrap();
        }
        writer.finish().unwrap();

        let reader = crate::source::FrameReader::open(&path, 25.0).unwrap();
        let info = reader.info();
        assert_eq!((info.width, info.height), (641, 481));
        assert_eq!(reader.count(), 3);
    }

    #[cfg(feature = "video")]
    #[test]
    fn test_mismatched_frame_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = VideoWriter::new(dir.path().join("out.mp4"), 64, 48, 25.0).unwrap();
        let frame = DynamicImage::ImageRgb8(RgbImage::new(32, 32));
        assert!(matches!(writer.write_frame(&frame), Err(AnnotateError::VideoError(_))));
    }

    #[test]
    fn test_save_image_result() {
        let dir = tempfile::tempdir().unwrap();
        let save_dir = dir.path().join("results");
        let mut saver = SaveResults::new(save_dir.clone());

        let meta = SourceMeta {
            path: "inputs/bus.png".to_string(),
            ..SourceMeta::default()
        };
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        saver.save(false, &meta, &img).unwrap();
        saver.finish().unwrap();

        assert!(save_dir.join("bus.png").is_file());
    }
}
