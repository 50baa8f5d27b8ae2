// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Image preprocessing for detection inference.
//!
//! Letterbox resize into the model input size, then conversion to a normalized
//! NCHW tensor. The transform parameters are kept so boxes can be mapped back to
//! the original image.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, GenericImageView, RgbImage};
use ndarray::Array4;

use crate::error::{AnnotateError, Result};

/// Default letterbox padding color (gray).
pub const LETTERBOX_COLOR: [u8; 3] = [114, 114, 114];

/// Result of preprocessing an image, containing the tensor and transform info.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// Preprocessed image tensor in NCHW format, normalized to [0, 1].
    pub tensor: Array4<f32>,
    /// Original image dimensions (height, width).
    pub orig_shape: (u32, u32),
    /// Scale factors applied (`scale_y`, `scale_x`).
    pub scale: (f32, f32),
    /// Padding applied (`pad_top`, `pad_left`).
    pub padding: (f32, f32),
}

/// Letterbox geometry for one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Resized content width.
    pub new_w: u32,
    /// Resized content height.
    pub new_h: u32,
    /// Left padding.
    pub pad_left: u32,
    /// Top padding.
    pub pad_top: u32,
    /// Scale factors (`scale_y`, `scale_x`).
    pub scale: (f32, f32),
}

impl Letterbox {
    /// Fit `orig` into `target` (height, width), preserving aspect ratio and centering.
    #[must_use]
    pub fn fit(orig_width: u32, orig_height: u32, target: (usize, usize)) -> Self {
        let (target_h, target_w) = (target.0 as u32, target.1 as u32);
        let (orig_w, orig_h) = (orig_width.max(1) as f32, orig_height.max(1) as f32);

        let r = (target_h as f32 / orig_h).min(target_w as f32 / orig_w);
        let new_w = ((orig_w * r).round() as u32).clamp(1, target_w.max(1));
        let new_h = ((orig_h * r).round() as u32).clamp(1, target_h.max(1));

        Self {
            new_w,
            new_h,
            pad_left: target_w.saturating_sub(new_w) / 2,
            pad_top: target_h.saturating_sub(new_h) / 2,
            scale: (new_h as f32 / orig_h, new_w as f32 / orig_w),
        }
    }
}

/// Preprocess an image for detection.
///
/// # Arguments
///
/// * `image` - Input image.
/// * `target_size` - Model input size as (height, width).
///
/// # Errors
///
/// Returns an error if the image has zero size or resizing fails.
pub fn preprocess_image(
    image: &DynamicImage,
    target_size: (usize, usize),
) -> Result<PreprocessResult> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(AnnotateError::ImageError("Cannot preprocess an empty image".to_string()));
    }

    let lb = Letterbox::fit(width, height, target_size);
    let resized = resize_rgb(&image.to_rgb8(), lb.new_w, lb.new_h)?;

    let (target_h, target_w) = (target_size.0 as u32, target_size.1 as u32);
    let mut canvas = RgbImage::from_pixel(target_w, target_h, image::Rgb(LETTERBOX_COLOR));
    image::imageops::replace(
        &mut canvas,
        &resized,
        i64::from(lb.pad_left),
        i64::from(lb.pad_top),
    );

    Ok(PreprocessResult {
        tensor: image_to_tensor(&canvas),
        orig_shape: (height, width),
        scale: lb.scale,
        padding: (lb.pad_top as f32, lb.pad_left as f32),
    })
}

fn resize_rgb(src: &RgbImage, new_w: u32, new_h: u32) -> Result<RgbImage> {
    if src.dimensions() == (new_w, new_h) {
        return Ok(src.clone());
    }

    let src_image =
        Image::from_vec_u8(src.width(), src.height(), src.as_raw().clone(), PixelType::U8x3)
            .map_err(|e| AnnotateError::ImageError(format!("Invalid source image: {e}")))?;
    let mut dst_image = Image::new(new_w, new_h, PixelType::U8x3);

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    Resizer::new()
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| AnnotateError::ImageError(format!("Failed to resize image: {e}")))?;

    RgbImage::from_raw(new_w, new_h, dst_image.into_vec())
        .ok_or_else(|| AnnotateError::ImageError("Resized buffer has the wrong size".to_string()))
}

/// Convert an RGB image to a normalized `(1, 3, H, W)` tensor.
fn image_to_tensor(image: &RgbImage) -> Array4<f32> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mut tensor = Array4::zeros((1, 3, h, w));

    for (x, y, pixel) in image.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            tensor[[0, c, y, x]] = f32::from(pixel[c]) / 255.0;
        }
    }

    tensor
}

/// Map box coordinates from letterboxed model space back to the original image.
///
/// # Arguments
///
/// * `coords` - Coordinates in model space (after letterbox).
/// * `scale` - Scale factors (`scale_y`, `scale_x`) from preprocessing.
/// * `padding` - Padding (`pad_top`, `pad_left`) from preprocessing.
#[must_use]
pub fn scale_coords(coords: &[f32; 4], scale: (f32, f32), padding: (f32, f32)) -> [f32; 4] {
    let (scale_y, scale_x) = scale;
    let (pad_top, pad_left) = padding;

    [
        (coords[0] - pad_left) / scale_x,
        (coords[1] - pad_top) / scale_y,
        (coords[2] - pad_left) / scale_x,
        (coords[3] - pad_top) / scale_y,
    ]
}

/// Clip box coordinates to an image of shape (height, width).
#[must_use]
pub const fn clip_coords(coords: &[f32; 4], shape: (u32, u32)) -> [f32; 4] {
    let (h, w) = (shape.0 as f32, shape.1 as f32);
    [
        coords[0].clamp(0.0, w),
        coords[1].clamp(0.0, h),
        coords[2].clamp(0.0, w),
        coords[3].clamp(0.0, h),
    ]
}
