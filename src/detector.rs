// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! ONNX detection model.
//!
//! Wraps an ONNX Runtime session around an Ultralytics detection export and
//! runs letterbox preprocessing, inference and output decoding for one image at
//! a time.
//!
//! # Example
//!
//! ```no_run
//! use trt_annotate::{Detector, InferenceConfig};
//!
//! let mut detector = Detector::load("best.onnx", InferenceConfig::default())?;
//! let img = image::open("frame.png")?;
//! let prediction = detector.predict_image(&img, "frame.png")?;
//! println!("{}", prediction.summary());
//! # Ok::<(), trt_annotate::AnnotateError>(())
//! ```

use std::path::Path;
use std::time::Instant;

use image::DynamicImage;
use ndarray::Array4;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::TensorRef;

use crate::error::{AnnotateError, Result};
use crate::inference::InferenceConfig;
use crate::metadata::ModelMetadata;
use crate::postprocessing::decode_detections;
use crate::preprocessing::preprocess_image;
use crate::results::{Prediction, Speed};

/// Detection model backed by ONNX Runtime.
pub struct Detector {
    session: Session,
    metadata: ModelMetadata,
    input_name: String,
    output_name: String,
    config: InferenceConfig,
}

impl Detector {
    /// Load an ONNX detection model.
    ///
    /// Class names, input size and stride are read from the model's embedded
    /// metadata; `config.imgsz` overrides the input size.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotateError::ModelLoadError`] if the file is missing or cannot be
    /// loaded by ONNX Runtime.
    pub fn load<P: AsRef<Path>>(path: P, config: InferenceConfig) -> Result<Self> {
        let path = path.as_ref();
        let session = open_session(path, config.num_threads)?;
        let metadata = session_metadata(&session)?;

        let input_name = session
            .inputs
            .first()
            .map_or_else(|| "images".to_string(), |i| i.name.clone());
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| AnnotateError::ModelLoadError("Model has no outputs".to_string()))?;

        Ok(Self {
            session,
            metadata,
            input_name,
            output_name,
            config,
        })
    }

    /// Model metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Inference configuration.
    #[must_use]
    pub const fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Input size (height, width) used for preprocessing.
    #[must_use]
    pub fn imgsz(&self) -> (usize, usize) {
        self.config.imgsz.unwrap_or(self.metadata.imgsz)
    }

    /// Run detection on one image.
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or the ONNX Runtime call fails.
    pub fn predict_image(
        &mut self,
        image: &DynamicImage,
        path: impl Into<String>,
    ) -> Result<Prediction> {
        let imgsz = self.imgsz();

        let start = Instant::now();
        let pre = preprocess_image(image, imgsz)?;
        let preprocess_ms = elapsed_ms(start);

        let start = Instant::now();
        let (output, shape) = self.run(&pre.tensor)?;
        let inference_ms = elapsed_ms(start);

        let start = Instant::now();
        let detections = decode_detections(
            &output,
            &shape,
            &pre,
            &self.config,
            self.metadata.num_classes(),
        );
        let postprocess_ms = elapsed_ms(start);

        #[allow(clippy::cast_possible_truncation)]
        let inference_shape = (imgsz.0 as u32, imgsz.1 as u32);

        Ok(Prediction {
            path: path.into(),
            orig_shape: pre.orig_shape,
            inference_shape,
            detections,
            names: self.metadata.names.clone(),
            speed: Speed::new(preprocess_ms, inference_ms, postprocess_ms),
        })
    }

    fn run(&mut self, input: &Array4<f32>) -> Result<(Vec<f32>, Vec<usize>)> {
        let input = input.as_standard_layout();
        let tensor = TensorRef::from_array_view(&input).map_err(|e| {
            AnnotateError::InferenceError(format!("Failed to create input tensor: {e}"))
        })?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| AnnotateError::InferenceError(format!("Inference failed: {e}")))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            AnnotateError::InferenceError(format!("Output '{}' not found", self.output_name))
        })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| AnnotateError::InferenceError(format!("Failed to extract output: {e}")))?;

        let shape = shape
            .iter()
            .map(|&d| usize::try_from(d).unwrap_or(0))
            .collect();
        Ok((data.to_vec(), shape))
    }
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("num_classes", &self.metadata.num_classes())
            .field("imgsz", &self.imgsz())
            .field("stride", &self.metadata.stride)
            .finish_non_exhaustive()
    }
}

/// Read only the embedded metadata of an ONNX model.
///
/// # Errors
///
/// Returns [`AnnotateError::ModelLoadError`] if the model cannot be loaded.
pub fn read_model_metadata(path: &Path) -> Result<ModelMetadata> {
    let session = open_session(path, 0)?;
    session_metadata(&session)
}

fn load_error(what: &str, e: impl std::fmt::Display) -> AnnotateError {
    AnnotateError::ModelLoadError(format!("Failed to {what}: {e}"))
}

fn open_session(path: &Path, threads: usize) -> Result<Session> {
    if !path.is_file() {
        return Err(AnnotateError::ModelLoadError(format!(
            "Model file not found: {}",
            path.display()
        )));
    }

    Session::builder()
        .map_err(|e| load_error("create session builder", e))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| load_error("set optimization level", e))?
        .with_intra_threads(threads)
        .map_err(|e| load_error("set intra-thread count", e))?
        .commit_from_file(path)
        .map_err(|e| {
            AnnotateError::ModelLoadError(format!("Failed to load {}: {e}", path.display()))
        })
}

fn session_metadata(session: &Session) -> Result<ModelMetadata> {
    let props = session
        .metadata()
        .map_err(|e| AnnotateError::ModelLoadError(format!("Failed to read model metadata: {e}")))?;

    ModelMetadata::from_properties(|key| props.custom(key).ok().flatten())
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
