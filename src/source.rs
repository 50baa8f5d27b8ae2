// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Input source handling.
//!
//! This module provides the frame sources used by both the video driver and
//! `predict`: single images, directories of ordered image frames, and (with the
//! `video` feature) video files decoded through `video-rs`.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView};

use crate::error::{AnnotateError, Result};

/// Frame rate used when a source does not report a usable one.
pub const DEFAULT_FPS: f32 = 25.0;

/// Video file extensions recognized by [`Source::from`].
const VIDEO_EXTENSIONS: [&str; 10] = [
    "mp4", "avi", "mov", "mkv", "wmv", "flv", "webm", "m4v", "mpeg", "mpg",
];

/// Represents different input sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Path to an image file.
    Image(PathBuf),
    /// Path to a video file.
    Video(PathBuf),
    /// Directory containing images, read in file-name order.
    Directory(PathBuf),
}

impl Source {
    /// Check if this source is a single image.
    #[must_use]
    pub const fn is_image(&self) -> bool {
        matches!(self, Self::Image(_))
    }

    /// Check if this source is a video.
    #[must_use]
    pub const fn is_video(&self) -> bool {
        matches!(self, Self::Video(_))
    }

    /// Check if this source is a directory of frames.
    #[must_use]
    pub const fn is_batch(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    /// Get the source path.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Image(p) | Self::Video(p) | Self::Directory(p) => p,
        }
    }
}

/// Convert from a string path to Source.
impl From<&str> for Source {
    fn from(s: &str) -> Self {
        Self::from(Path::new(s))
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        if path.is_dir() {
            return Self::Directory(path.to_path_buf());
        }

        if let Some(ext) = path.extension() {
            let ext = ext.to_string_lossy().to_lowercase();
            if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
                return Self::Video(path.to_path_buf());
            }
        }

        Self::Image(path.to_path_buf())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Self::from(path.as_path())
    }
}

/// Frame rate and pixel dimensions of a source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    /// Frames per second.
    pub fps: f32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

impl VideoInfo {
    /// Create a new `VideoInfo`, replacing an unusable frame rate with [`DEFAULT_FPS`].
    #[must_use]
    pub fn new(fps: f32, width: u32, height: u32) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            DEFAULT_FPS
        };
        Self { fps, width, height }
    }
}

/// Metadata about a source frame.
#[derive(Debug, Clone)]
pub struct SourceMeta {
    /// Frame index (0 for single images).
    pub frame_idx: usize,
    /// Total frames (1 for single images, estimated for videos).
    pub total_frames: Option<usize>,
    /// Source path.
    pub path: String,
    /// Frames per second (for video sources).
    pub fps: Option<f32>,
}

impl Default for SourceMeta {
    fn default() -> Self {
        Self {
            frame_idx: 0,
            total_frames: Some(1),
            path: String::new(),
            fps: None,
        }
    }
}

/// Iterator over frames from a source.
///
/// Video decoders are opened eagerly so that an unreadable video is reported by
/// [`SourceIterator::new`] rather than by the first call to `next`.
pub struct SourceIterator {
    source: Source,
    current_frame: usize,
    image_paths: Vec<PathBuf>,
    #[cfg(feature = "video")]
    decoder: Option<video_rs::decode::Decoder>,
    total_frames: Option<usize>,
    fps: Option<f32>,
    size: Option<(u32, u32)>,
}

impl SourceIterator {
    /// Create a new source iterator.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be opened.
    pub fn new(source: Source) -> Result<Self> {
        let image_paths = match &source {
            Source::Directory(path) => collect_images_from_dir(path)?,
            Source::Image(path) => {
                if !path.is_file() {
                    return Err(AnnotateError::ImageError(format!(
                        "Image not found: {}",
                        path.display()
                    )));
                }
                vec![path.clone()]
            }
            Source::Video(_) => vec![],
        };

        let mut iter = Self {
            source,
            current_frame: 0,
            image_paths,
            #[cfg(feature = "video")]
            decoder: None,
            total_frames: None,
            fps: None,
            size: None,
        };

        if let Source::Video(path) = &iter.source {
            let path = path.clone();
            iter.open_video(&path)?;
        } else {
            iter.total_frames = Some(iter.image_paths.len());
        }

        Ok(iter)
    }

    /// Frames per second reported by the decoder, `None` for image sources.
    #[must_use]
    pub const fn fps(&self) -> Option<f32> {
        self.fps
    }

    /// Frame dimensions `(width, height)` reported by the decoder, `None` for image sources.
    #[must_use]
    pub const fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    /// Total frame count (estimated from duration for videos).
    #[must_use]
    pub const fn total_frames(&self) -> Option<usize> {
        self.total_frames
    }

    #[cfg(feature = "video")]
    fn open_video(&mut self, path: &Path) -> Result<()> {
        crate::io::init_logging();

        if !path.is_file() {
            return Err(AnnotateError::VideoError(format!(
                "Video not found: {}",
                path.display()
            )));
        }

        let decoder = video_rs::decode::Decoder::new(path).map_err(|e| {
            AnnotateError::VideoError(format!("Failed to create decoder: {e}"))
        })?;

        let fps = decoder.frame_rate();
        if let Ok(duration) = decoder.duration() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                self.total_frames =
                    Some((duration.as_secs_f64() * f64::from(fps)).round() as usize);
            }
        }
        self.fps = Some(fps);
        self.size = Some(decoder.size());
        self.decoder = Some(decoder);
        Ok(())
    }

    #[cfg(not(feature = "video"))]
    #[allow(clippy::unused_self)]
    fn open_video(&mut self, _path: &Path) -> Result<()> {
        Err(AnnotateError::FeatureNotEnabled(
            "Video support requires 'video' feature".to_string(),
        ))
    }

    /// Get the next image from the source.
    fn next_image(&mut self) -> Option<Result<(DynamicImage, SourceMeta)>> {
        let path = self.image_paths.get(self.current_frame)?;
        let meta = SourceMeta {
            frame_idx: self.current_frame,
            total_frames: Some(self.image_paths.len()),
            path: path.to_string_lossy().to_string(),
            fps: None,
        };

        self.current_frame += 1;

        match image::open(path) {
            Ok(img) => Some(Ok((img, meta))),
            Err(e) => Some(Err(AnnotateError::ImageError(format!(
                "Failed to load {}: {e}",
                path.display()
            )))),
        }
    }

    /// Get the next video frame.
    #[cfg(feature = "video")]
    fn next_video_frame(&mut self) -> Option<Result<(DynamicImage, SourceMeta)>> {
        let decoder = self.decoder.as_mut()?;

        match decoder.decode() {
            Ok((_ts, frame)) => {
                let meta = SourceMeta {
                    frame_idx: self.current_frame,
                    total_frames: self.total_frames,
                    path: self.source.path().to_string_lossy().to_string(),
                    fps: self.fps,
                };
                self.current_frame += 1;
                Some(video_frame_to_image(&frame).map(|img| (img, meta)))
            }
            Err(video_rs::Error::DecodeExhausted | video_rs::Error::ReadExhausted) => {
                self.decoder = None;
                None
            }
            Err(e) => {
                self.decoder = None;
                Some(Err(AnnotateError::VideoError(format!(
                    "Failed to decode frame {}: {e}",
                    self.current_frame + 1
                ))))
            }
        }
    }

    #[cfg(not(feature = "video"))]
    #[allow(clippy::unused_self, clippy::missing_const_for_fn)]
    fn next_video_frame(&mut self) -> Option<Result<(DynamicImage, SourceMeta)>> {
        None
    }
}

impl Iterator for SourceIterator {
    type Item = Result<(DynamicImage, SourceMeta)>;

    fn next(&mut self) -> Option<Self::Item> {
        match &self.source {
            Source::Image(_) | Source::Directory(_) => self.next_image(),
            Source::Video(_) => self.next_video_frame(),
        }
    }
}

/// Sequential frame reader for the video driver.
///
/// Wraps a [`SourceIterator`] over a video file or a directory of image frames
/// and resolves the frame rate and dimensions up front.
pub struct FrameReader {
    info: VideoInfo,
    frames: SourceIterator,
    /// First frame of a directory source, decoded early to learn the dimensions.
    pending: Option<DynamicImage>,
}

impl FrameReader {
    /// Open a frame source.
    ///
    /// A directory is read as an ordered image sequence at `fallback_fps`; any other
    /// path is decoded as a video file.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotateError::VideoOpen`] if the source cannot be opened.
    pub fn open(path: &Path, fallback_fps: f32) -> Result<Self> {
        let source = if path.is_dir() {
            Source::Directory(path.to_path_buf())
        } else {
            Source::Video(path.to_path_buf())
        };

        let mut frames = SourceIterator::new(source)
            .map_err(|e| AnnotateError::VideoOpen(format!("{}: {e}", path.display())))?;

        let (info, pending) = match frames.size() {
            Some((width, height)) => (
                VideoInfo::new(frames.fps().unwrap_or(fallback_fps), width, height),
                None,
            ),
            None => match frames.next() {
                Some(Ok((img, _))) => {
                    let (width, height) = img.dimensions();
                    (VideoInfo::new(fallback_fps, width, height), Some(img))
                }
                Some(Err(e)) => {
                    return Err(AnnotateError::VideoOpen(format!("{}: {e}", path.display())));
                }
                None => (VideoInfo::new(fallback_fps, 0, 0), None),
            },
        };

        Ok(Self {
            info,
            frames,
            pending,
        })
    }

    /// Frame rate and dimensions of the source.
    #[must_use]
    pub const fn info(&self) -> VideoInfo {
        self.info
    }
}

impl Iterator for FrameReader {
    type Item = Result<DynamicImage>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(img) = self.pending.take() {
            return Some(Ok(img));
        }
        self.frames.next().map(|item| item.map(|(img, _)| img))
    }
}

/// Collect image paths from a directory, sorted by file name.
fn collect_images_from_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AnnotateError::ImageError(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| AnnotateError::IoError(format!("Failed to read {}: {e}", dir.display())))?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_image_file(path))
        .collect();

    paths.sort();
    Ok(paths)
}

/// Check if a path is an image file based on extension.
pub fn is_image_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        let ext = ext.to_string_lossy().to_lowercase();
        matches!(
            ext.as_str(),
            "jpg" | "jpeg" | "png" | "bmp" | "gif" | "webp" | "tiff" | "tif"
        )
    })
}

/// Convert a `video-rs` RGB frame to a `DynamicImage`.
#[cfg(feature = "video")]
fn video_frame_to_image(frame: &video_rs::Frame) -> Result<DynamicImage> {
    let (height, width, _) = frame.dim();
    let height = u32::try_from(height)
        .map_err(|_| AnnotateError::ImageError("Frame height exceeds u32::MAX".to_string()))?;
    let width = u32::try_from(width)
        .map_err(|_| AnnotateError::ImageError("Frame width exceeds u32::MAX".to_string()))?;

    let rgb_data: Vec<u8> = frame.iter().copied().collect();
    let img_buffer = image::RgbImage::from_raw(width, height, rgb_data).ok_or_else(|| {
        AnnotateError::ImageError("Failed to create image from video frame".to_string())
    })?;

    Ok(DynamicImage::ImageRgb8(img_buffer))
}
