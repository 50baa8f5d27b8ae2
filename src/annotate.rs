// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Box and label drawing for saved `predict` results.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::results::Prediction;
use crate::{info, warn};

/// Assets URL for downloading fonts.
const ASSETS_URL: &str = "https://github.com/ultralytics/assets/releases/download/v0.0.0";

/// Box outline thickness in pixels.
const LINE_WIDTH: i32 = 3;

/// Label text height in pixels.
const LABEL_SCALE: f32 = 16.0;

/// Ultralytics color palette.
pub const COLORS: [[u8; 3]; 20] = [
    [4, 42, 255],
    [11, 219, 235],
    [243, 243, 243],
    [0, 223, 183],
    [17, 31, 104],
    [255, 111, 221],
    [255, 68, 79],
    [204, 237, 0],
    [0, 243, 68],
    [189, 0, 255],
    [0, 180, 255],
    [221, 0, 186],
    [0, 255, 255],
    [38, 192, 0],
    [1, 255, 179],
    [125, 36, 255],
    [123, 0, 104],
    [255, 27, 108],
    [252, 109, 47],
    [162, 255, 11],
];

/// Palette color for a class id.
#[must_use]
pub const fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(COLORS[class_id % COLORS.len()])
}

/// Return the local path of an Ultralytics font, downloading it into the user
/// config directory on first use. `None` when it cannot be obtained.
pub fn check_font(font: &str) -> Option<PathBuf> {
    let font_name = Path::new(font).file_name()?.to_string_lossy().into_owned();
    let config_dir = dirs::config_dir()?.join("Ultralytics");
    let font_path = config_dir.join(&font_name);

    if font_path.exists() {
        return Some(font_path);
    }

    if let Err(e) = fs::create_dir_all(&config_dir) {
        warn!("Failed to create {}: {e}", config_dir.display());
        return None;
    }

    let url = format!("{ASSETS_URL}/{font_name}");
    info!("Downloading {url} to {}", font_path.display());

    let download = || -> Result<(), String> {
        let response = ureq::get(&url).call().map_err(|e| e.to_string())?;
        let mut file = File::create(&font_path).map_err(|e| e.to_string())?;
        io::copy(&mut response.into_body().into_reader(), &mut file).map_err(|e| e.to_string())?;
        Ok(())
    };

    match download() {
        Ok(()) => Some(font_path),
        Err(e) => {
            warn!("Failed to download font from {url}: {e}");
            let _ = fs::remove_file(&font_path);
            None
        }
    }
}

/// Load the label font, the Unicode variant when any class name needs it.
#[must_use]
pub fn load_font(names: &HashMap<usize, String>) -> Option<FontVec> {
    let unicode = names.values().any(|n| !n.is_ascii());
    let name = if unicode { "Arial.Unicode.ttf" } else { "Arial.ttf" };

    let data = fs::read(check_font(name)?).ok()?;
    FontVec::try_from_vec(data).ok()
}

/// Draw every detection of `prediction` onto a copy of `image`.
///
/// Labels are skipped when `font` is `None`; boxes are always drawn.
#[must_use]
pub fn draw_detections(
    image: &DynamicImage,
    prediction: &Prediction,
    font: Option<&FontVec>,
) -> DynamicImage {
    let mut img = image.to_rgb8();
    let (width, height) = (img.width() as i32, img.height() as i32);
    if width == 0 || height == 0 {
        return DynamicImage::ImageRgb8(img);
    }

    for det in &prediction.detections {
        let x1 = (det.xyxy[0].round() as i32).clamp(0, width - 1);
        let y1 = (det.xyxy[1].round() as i32).clamp(0, height - 1);
        let x2 = (det.xyxy[2].round() as i32).clamp(0, width - 1);
        let y2 = (det.xyxy[3].round() as i32).clamp(0, height - 1);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        let color = class_color(det.class_id);
        for t in 0..LINE_WIDTH {
            let (w, h) = (x2 - x1 - 2 * t, y2 - y1 - 2 * t);
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(x1 + t, y1 + t).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut img, rect, color);
        }

        if let Some(font) = font {
            let label = format!("{} {:.2}", prediction.class_name(det.class_id), det.confidence);
            draw_label(&mut img, font, &label, (x1, y1), color);
        }
    }

    DynamicImage::ImageRgb8(img)
}

/// Filled label box above the top-left corner, or inside the box when there is no room.
fn draw_label(img: &mut RgbImage, font: &FontVec, label: &str, corner: (i32, i32), color: Rgb<u8>) {
    let scale = PxScale::from(LABEL_SCALE);
    let (text_w, text_h) = text_size(scale, font, label);
    let (box_w, box_h) = (text_w + 6, text_h + 6);

    let (x, y) = corner;
    let top = if y >= box_h as i32 { y - box_h as i32 } else { y };

    draw_filled_rect_mut(img, Rect::at(x, top).of_size(box_w, box_h), color);
    draw_text_mut(img, text_color(color), x + 3, top + 3, scale, font, label);
}

/// Black or white, whichever reads better on `bg`.
fn text_color(bg: Rgb<u8>) -> Rgb<u8> {
    let [r, g, b] = bg.0;
    let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
    if luma > 160.0 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) }
}
