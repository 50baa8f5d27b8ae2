// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::fs;
use std::path::Path;

use crate::cli::args::NamesArgs;
use crate::detector::read_model_metadata;
use crate::error::{AnnotateError, Result};
use crate::metadata::ModelMetadata;
use crate::{info, warn};

/// Extract class names from a model and write them one per line.
///
/// A model without names is not an error: the message is printed and nothing is
/// written.
///
/// # Errors
///
/// Returns an error if the output file cannot be written.
pub fn run_names(args: &NamesArgs) -> Result<()> {
    let metadata = match load_metadata(&args.model) {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!("Failed to load model metadata: {e}");
            None
        }
    };

    let Some(metadata) = metadata.filter(|m| !m.names.is_empty()) else {
        info!("Could not extract names from model.");
        return Ok(());
    };

    write_names(&metadata, &args.out)?;
    info!("Wrote {}", args.out.display());
    Ok(())
}

/// ONNX models are read through ONNX Runtime. `.yaml`, `.yml` and `.txt` dumps
/// are parsed directly.
fn load_metadata(path: &Path) -> Result<Option<ModelMetadata>> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "onnx" => read_model_metadata(path).map(Some),
        "yaml" | "yml" | "txt" => ModelMetadata::from_file(path).map(Some),
        _ => Ok(None),
    }
}

/// Write names in class-id order, one per line.
///
/// # Errors
///
/// Returns an error if the parent directory or the file cannot be created.
pub fn write_names(metadata: &ModelMetadata, out: &Path) -> Result<()> {
    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| {
            AnnotateError::IoError(format!("Failed to create directory {}: {e}", parent.display()))
        })?;
    }

    let mut content = metadata.names_in_order().join("\n");
    content.push('\n');
    fs::write(out, content)
        .map_err(|e| AnnotateError::IoError(format!("Failed to write {}: {e}", out.display())))
}
