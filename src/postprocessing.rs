// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Decoding of raw detection outputs.
//!
//! YOLO detection heads emit `4 + nc` features per candidate: a center-format box
//! followed by one score per class. Exports use either `[1, 4 + nc, N]` or the
//! transposed `[1, N, 4 + nc]` layout.

use ndarray::{ArrayView2, s};

use crate::inference::InferenceConfig;
use crate::preprocessing::{PreprocessResult, clip_coords, scale_coords};
use crate::results::Detection;
use crate::utils::nms_per_class;

/// Layout of a detection output tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectLayout {
    /// Number of classes.
    pub num_classes: usize,
    /// Number of candidate boxes.
    pub num_predictions: usize,
    /// `true` for `[N, 4 + nc]`, `false` for `[4 + nc, N]`.
    pub transposed: bool,
}

/// Work out the output layout from its shape.
///
/// `expected_classes` is the class count from metadata, `0` when unknown. With no
/// metadata the smaller dimension is taken as the feature axis.
#[must_use]
pub fn parse_detect_shape(shape: &[usize], expected_classes: usize) -> Option<DetectLayout> {
    let (a, b) = match shape {
        [a, b] | [1, a, b] => (*a, *b),
        _ => return None,
    };
    if a.max(b) < 5 || a.min(b) == 0 {
        return None;
    }

    let transposed = if expected_classes > 0 {
        if a == 4 + expected_classes {
            false
        } else if b == 4 + expected_classes {
            true
        } else {
            a > b
        }
    } else {
        a > b
    };

    let (features, predictions) = if transposed { (b, a) } else { (a, b) };
    if features < 5 {
        return None;
    }

    Some(DetectLayout {
        num_classes: features - 4,
        num_predictions: predictions,
        transposed,
    })
}

/// Decode a raw detection output into detections in original-image pixels.
///
/// Keeps the best class per candidate, drops scores below the confidence
/// threshold, undoes the letterbox, clips to the image, applies per-class NMS and
/// keeps at most `max_detections`, highest confidence first.
#[must_use]
pub fn decode_detections(
    output: &[f32],
    shape: &[usize],
    preprocess: &PreprocessResult,
    config: &InferenceConfig,
    expected_classes: usize,
) -> Vec<Detection> {
    let Some(layout) = parse_detect_shape(shape, expected_classes) else {
        return Vec::new();
    };

    let features = layout.num_classes + 4;
    let dims = if layout.transposed {
        (layout.num_predictions, features)
    } else {
        (features, layout.num_predictions)
    };
    let Ok(raw) = ArrayView2::from_shape(dims, output) else {
        return Vec::new();
    };
    let rows = if layout.transposed { raw } else { raw.reversed_axes() };

    let candidates = collect_candidates(rows, preprocess, config.confidence_threshold);
    let keep = nms_per_class(&candidates, config.iou_threshold);

    keep.into_iter()
        .take(config.max_detections)
        .map(|i| {
            let (xyxy, confidence, class_id) = candidates[i];
            Detection::new(xyxy, confidence, class_id)
        })
        .collect()
}

fn collect_candidates(
    rows: ArrayView2<f32>,
    preprocess: &PreprocessResult,
    conf_threshold: f32,
) -> Vec<([f32; 4], f32, usize)> {
    let mut candidates = Vec::new();

    for row in rows.rows() {
        let scores = row.slice(s![4..]);
        let best = scores
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_nan())
            .max_by(|(_, a), (_, b)| a.total_cmp(b));

        let Some((class_id, &score)) = best else {
            continue;
        };
        if score < conf_threshold {
            continue;
        }

        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
        let xyxy = [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0];
        let scaled = scale_coords(&xyxy, preprocess.scale, preprocess.padding);
        candidates.push((clip_coords(&scaled, preprocess.orig_shape), score, class_id));
    }

    candidates
}
