// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Scratch directories for extracted and annotated frames.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AnnotateError, Result};

/// Directory holding the extracted input frames.
pub const INPUT_DIR: &str = "tmp_in_frames";

/// Directory holding the annotated output frames.
pub const OUTPUT_DIR: &str = "tmp_out_frames";

/// File name for the frame with 1-based sequence `index`, e.g. `frame_000042.png`.
#[must_use]
pub fn frame_file_name(index: usize) -> String {
    format!("frame_{index:06}.png")
}

/// The pair of scratch directories owned by one driver run.
///
/// Both directories are left on disk when the run ends.
#[derive(Debug, Clone)]
pub struct ScratchDirs {
    /// Extracted input frames.
    pub input: PathBuf,
    /// Annotated output frames.
    pub output: PathBuf,
}

impl ScratchDirs {
    /// Scratch directory locations under `workdir`, without touching the filesystem.
    #[must_use]
    pub fn new(workdir: &Path) -> Self {
        Self {
            input: workdir.join(INPUT_DIR),
            output: workdir.join(OUTPUT_DIR),
        }
    }

    /// Remove any previous contents and create both directories fresh.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be removed or created.
    pub fn prepare(workdir: &Path) -> Result<Self> {
        let dirs = Self::new(workdir);
        for dir in [&dirs.input, &dirs.output] {
            recreate_dir(dir)?;
        }
        Ok(dirs)
    }

    /// Path of the extracted frame with the given index.
    #[must_use]
    pub fn input_frame(&self, index: usize) -> PathBuf {
        self.input.join(frame_file_name(index))
    }
}

fn recreate_dir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(AnnotateError::IoError(format!(
                "Failed to clear {}: {e}",
                dir.display()
            )));
        }
    }

    fs::create_dir_all(dir).map_err(|e| {
        AnnotateError::IoError(format!("Failed to create {}: {e}", dir.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_file_name() {
        assert_eq!(frame_file_name(1), "frame_000001.png");
        assert_eq!(frame_file_name(123_456), "frame_123456.png");
        assert_eq!(frame_file_name(1_234_567), "frame_1234567.png");
    }

    #[test]
    fn test_zero_padding_sorts_in_sequence_order() {
        let mut names: Vec<String> = [10, 2, 100, 1].into_iter().map(frame_file_name).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "frame_000001.png",
                "frame_000002.png",
                "frame_000010.png",
                "frame_000100.png"
            ]
        );
    }

    #[test]
    fn test_prepare_clears_previous_run() {
        let work = tempfile::tempdir().unwrap();
        let first = ScratchDirs::prepare(work.path()).unwrap();
        fs::write(first.input_frame(1), b"stale").unwrap();
        fs::write(first.output.join("frame_000001.png"), b"stale").unwrap();

        let second = ScratchDirs::prepare(work.path()).unwrap();
        assert!(second.input.is_dir());
        assert!(second.output.is_dir());
        assert_eq!(fs::read_dir(&second.input).unwrap().count(), 0);
        assert_eq!(fs::read_dir(&second.output).unwrap().count(), 0);
    }
}
