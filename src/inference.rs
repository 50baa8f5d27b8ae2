// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Inference configuration for `predict`.

/// Configuration for detection inference.
///
/// # Example
///
/// ```rust
/// use trt_annotate::InferenceConfig;
///
/// let config = InferenceConfig::new()
///     .with_confidence(0.4)
///     .with_iou(0.5)
///     .with_max_detections(100)
///     .with_imgsz(640, 640);
/// assert_eq!(config.max_detections, 100);
/// ```
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Detections scoring below this are discarded.
    pub confidence_threshold: f32,
    /// `IoU` above which a lower-scoring box of the same class is suppressed.
    pub iou_threshold: f32,
    /// Maximum number of detections kept per image.
    pub max_detections: usize,
    /// Explicit input size (height, width); `None` uses the model metadata.
    pub imgsz: Option<(usize, usize)>,
    /// ONNX Runtime intra-op threads, `0` lets the runtime decide.
    pub num_threads: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
            imgsz: None,
            num_threads: 0,
        }
    }
}

impl InferenceConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the confidence threshold.
    #[must_use]
    pub const fn with_confidence(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the NMS `IoU` threshold.
    #[must_use]
    pub const fn with_iou(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Set the maximum number of detections per image.
    #[must_use]
    pub const fn with_max_detections(mut self, max: usize) -> Self {
        self.max_detections = max;
        self
    }

    /// Set the input image size.
    #[must_use]
    pub const fn with_imgsz(mut self, height: usize, width: usize) -> Self {
        self.imgsz = Some((height, width));
        self
    }

    /// Set the number of intra-op threads.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }
}
