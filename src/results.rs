// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Detection results.

use std::collections::{BTreeMap, HashMap};

use crate::utils::pluralize;

/// Timing information for inference operations (in milliseconds).
#[derive(Debug, Clone, Default)]
pub struct Speed {
    /// Time spent on preprocessing.
    pub preprocess: Option<f64>,
    /// Time spent on model inference.
    pub inference: Option<f64>,
    /// Time spent on postprocessing.
    pub postprocess: Option<f64>,
}

impl Speed {
    /// Create a new `Speed` with all timings set.
    #[must_use]
    pub const fn new(preprocess: f64, inference: f64, postprocess: f64) -> Self {
        Self {
            preprocess: Some(preprocess),
            inference: Some(inference),
            postprocess: Some(postprocess),
        }
    }

    /// Sum of the recorded timings in milliseconds.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.preprocess.unwrap_or(0.0)
            + self.inference.unwrap_or(0.0)
            + self.postprocess.unwrap_or(0.0)
    }
}

/// One detected object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Box corners `[x1, y1, x2, y2]` in original-image pixels.
    pub xyxy: [f32; 4],
    /// Confidence score.
    pub confidence: f32,
    /// Class id.
    pub class_id: usize,
}

impl Detection {
    /// Create a new detection.
    #[must_use]
    pub const fn new(xyxy: [f32; 4], confidence: f32, class_id: usize) -> Self {
        Self {
            xyxy,
            confidence,
            class_id,
        }
    }

    /// Box width.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.xyxy[2] - self.xyxy[0]
    }

    /// Box height.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.xyxy[3] - self.xyxy[1]
    }

    /// Box center `(x, y)`.
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        (
            (self.xyxy[0] + self.xyxy[2]) / 2.0,
            (self.xyxy[1] + self.xyxy[3]) / 2.0,
        )
    }

    /// Box area.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }
}

/// Detections for one image or video frame.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Source path.
    pub path: String,
    /// Original image shape (height, width).
    pub orig_shape: (u32, u32),
    /// Model input shape (height, width).
    pub inference_shape: (u32, u32),
    /// Kept detections, highest confidence first.
    pub detections: Vec<Detection>,
    /// Class ID to class name mapping.
    pub names: HashMap<usize, String>,
    /// Timing.
    pub speed: Speed,
}

impl Prediction {
    /// Number of detections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    /// Whether nothing was detected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Class name for an id, falling back to the id itself.
    #[must_use]
    pub fn class_name(&self, class_id: usize) -> String {
        self.names
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| class_id.to_string())
    }

    /// Per-class counts such as `2 helmets, 1 vest`, ordered by class id.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "(no detections)".to_string();
        }

        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for det in &self.detections {
            *counts.entry(det.class_id).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(class_id, count)| {
                let name = self.class_name(class_id);
                if count > 1 {
                    format!("{count} {}", pluralize(&name))
                } else {
                    format!("{count} {name}")
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// One line per detection: `class: <name>, conf: <c>, xyxy: [x1, y1, x2, y2]`.
    #[must_use]
    pub fn detection_lines(&self) -> Vec<String> {
        self.detections
            .iter()
            .map(|det| {
                let [x1, y1, x2, y2] = det.xyxy;
                format!(
                    "class: {}, conf: {:.2}, xyxy: [{x1:.1}, {y1:.1}, {x2:.1}, {y2:.1}]",
                    self.class_name(det.class_id),
                    det.confidence
                )
            })
            .collect()
    }
}
