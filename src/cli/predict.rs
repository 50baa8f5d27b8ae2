// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::{Path, PathBuf};

use crate::cli::args::PredictArgs;
use crate::detector::Detector;
use crate::error::{AnnotateError, Result};
use crate::inference::InferenceConfig;
use crate::io::{SaveResults, find_next_run_dir};
use crate::results::Prediction;
use crate::source::{Source, SourceIterator, SourceMeta};
use crate::{VERSION, info, verbose};

#[cfg(not(feature = "annotate"))]
use crate::warn;

/// Build the inference configuration from the `predict` arguments.
#[must_use]
pub fn inference_config(args: &PredictArgs) -> InferenceConfig {
    let mut config = InferenceConfig::new()
        .with_confidence(args.conf)
        .with_iou(args.iou)
        .with_max_detections(args.max_det)
        .with_threads(args.threads);

    if let Some(sz) = args.imgsz {
        config = config.with_imgsz(sz, sz);
    }
    config
}

/// Run detection over every item of the source, printing and optionally saving results.
///
/// # Errors
///
/// Returns an error if the model or source cannot be opened, or if inference or
/// saving fails for any item.
#[allow(clippy::cast_precision_loss)]
pub fn run_prediction(args: &PredictArgs) -> Result<()> {
    let mut detector = Detector::load(&args.model, inference_config(args))?;

    let source = Source::from(args.source.as_str());
    let is_video = source.is_video();
    let frames = SourceIterator::new(source).map_err(|e| {
        AnnotateError::ImageError(format!("Failed to open source {}: {e}", args.source))
    })?;

    info!("trt-annotate {VERSION} 🚀 Rust ONNX Runtime CPU");
    let imgsz = detector.imgsz();
    let model_name = Path::new(&args.model)
        .file_stem()
        .map_or_else(|| args.model.clone(), |s| s.to_string_lossy().into_owned());
    verbose!(
        "{model_name} summary: {} classes, imgsz=({}, {})",
        detector.metadata().num_classes(),
        imgsz.0,
        imgsz.1
    );

    let save_dir = results_dir(args);
    let mut saver = save_dir.clone().map(SaveResults::new);

    #[cfg(feature = "annotate")]
    let font = if saver.is_some() {
        crate::annotate::load_font(&detector.metadata().names)
    } else {
        None
    };
    #[cfg(not(feature = "annotate"))]
    if saver.is_some() {
        warn!("Box drawing requires the 'annotate' feature; saving unannotated frames");
    }

    let mut totals = (0.0, 0.0, 0.0);
    let mut count = 0_usize;

    for item in frames {
        let (img, meta) = item?;
        let prediction = detector.predict_image(&img, meta.path.clone())?;

        verbose!("{}", progress_line(is_video, &meta, &prediction));
        for line in prediction.detection_lines() {
            verbose!("  {line}");
        }

        if let Some(saver) = saver.as_mut() {
            #[cfg(feature = "annotate")]
            let annotated = crate::annotate::draw_detections(&img, &prediction, font.as_ref());
            #[cfg(not(feature = "annotate"))]
            let annotated = img;
            saver.save(is_video, &meta, &annotated)?;
        }

        totals.0 += prediction.speed.preprocess.unwrap_or(0.0);
        totals.1 += prediction.speed.inference.unwrap_or(0.0);
        totals.2 += prediction.speed.postprocess.unwrap_or(0.0);
        count += 1;
    }

    if let Some(saver) = saver {
        saver.finish()?;
    }

    let n = count.max(1) as f64;
    verbose!(
        "Speed: {:.1}ms preprocess, {:.1}ms inference, {:.1}ms postprocess per image \
         at shape (1, 3, {}, {})",
        totals.0 / n,
        totals.1 / n,
        totals.2 / n,
        imgsz.0,
        imgsz.1
    );

    if let Some(dir) = save_dir {
        info!("Results saved to {}", dir.display());
    }
    Ok(())
}

/// Run directory for saved results, `None` when saving is switched off.
fn results_dir(args: &PredictArgs) -> Option<PathBuf> {
    args.save
        .then(|| find_next_run_dir(&args.save_dir, &args.name))
}

/// Per-item header line, e.g. `image 1/2 bus.jpg: 640x640 4 persons, 1 bus, 12.3ms`.
fn progress_line(is_video: bool, meta: &SourceMeta, prediction: &Prediction) -> String {
    let total = meta
        .total_frames
        .map_or_else(|| "?".to_string(), |n| n.to_string());
    let (h, w) = prediction.inference_shape;
    let ms = prediction.speed.inference.unwrap_or(0.0);

    let position = if is_video {
        format!("video 1/1 (frame {}/{total})", meta.frame_idx + 1)
    } else {
        format!("image {}/{total}", meta.frame_idx + 1)
    };
    format!("{position} {}: {h}x{w} {}, {ms:.1}ms", meta.path, prediction.summary())
}
