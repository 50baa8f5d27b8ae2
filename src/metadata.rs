// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Model metadata parsing.
//!
//! Ultralytics exports store their metadata as ONNX custom properties, one key per
//! field (`names`, `imgsz`, `stride`, `task`, ...). The same fields also appear in
//! YAML dumps of the model arguments, where `names` is either a block mapping, a
//! block list, or an inline Python dict.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{AnnotateError, Result};

/// Keys read from ONNX custom metadata.
pub const METADATA_KEYS: [&str; 9] = [
    "description",
    "author",
    "date",
    "version",
    "task",
    "stride",
    "batch",
    "imgsz",
    "names",
];

/// Metadata extracted from an Ultralytics detection model.
#[derive(Debug, Clone)]
pub struct ModelMetadata {
    /// Model description (e.g., "Ultralytics YOLO11n model trained on coco.yaml").
    pub description: String,
    /// Model author.
    pub author: String,
    /// Export date.
    pub date: String,
    /// Ultralytics version used for export.
    pub version: String,
    /// Task name, `detect` for the models this tool runs.
    pub task: String,
    /// Model stride (typically 32).
    pub stride: u32,
    /// Batch size the model was exported with.
    pub batch: usize,
    /// Input image size as (height, width).
    pub imgsz: (usize, usize),
    /// Class ID to class name mapping.
    pub names: HashMap<usize, String>,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            author: String::new(),
            date: String::new(),
            version: String::new(),
            task: "detect".to_string(),
            stride: 32,
            batch: 1,
            imgsz: (640, 640),
            names: HashMap::new(),
        }
    }
}

impl ModelMetadata {
    /// Build metadata from individual key/value properties.
    ///
    /// `lookup` returns the raw string stored under a key, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric field cannot be parsed.
    pub fn from_properties<F>(mut lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut metadata = Self::default();
        for key in METADATA_KEYS {
            if let Some(value) = lookup(key) {
                metadata.apply(key, &value)?;
            }
        }
        Ok(metadata)
    }

    /// Parse metadata from a YAML string.
    ///
    /// Only the subset of YAML that Ultralytics writes is understood: top-level
    /// `key: value` pairs, and block mappings or lists under `names` and `imgsz`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric field cannot be parsed.
    pub fn from_yaml_str(yaml_str: &str) -> Result<Self> {
        let mut metadata = Self::default();
        let mut block: Option<(&str, Vec<&str>)> = None;

        for line in yaml_str.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let indented = line.starts_with(' ') || line.starts_with('\t');
            if let Some((_, items)) = block.as_mut()
                && (indented || trimmed.starts_with('-'))
            {
                items.push(trimmed);
                continue;
            }

            if let Some((key, items)) = block.take() {
                metadata.apply_block(key, &items)?;
            }

            let Some((key, value)) = trimmed.split_once(':') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            if value.is_empty() {
                block = Some((key, Vec::new()));
            } else {
                metadata.apply(key, value)?;
            }
        }

        if let Some((key, items)) = block {
            metadata.apply_block(key, &items)?;
        }

        Ok(metadata)
    }

    /// Load metadata from a YAML dump (`.yaml`/`.yml`) or a plain names file
    /// (`.txt`, one class name per line).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AnnotateError::IoError(format!("Failed to read {}: {e}", path.display()))
        })?;

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if ext == "txt" {
            let names = text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .enumerate()
                .map(|(i, name)| (i, name.to_string()))
                .collect();
            return Ok(Self {
                names,
                ..Self::default()
            });
        }

        Self::from_yaml_str(&text)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "description" => self.description = unquote(value).to_string(),
            "author" => self.author = unquote(value).to_string(),
            "date" => self.date = unquote(value).to_string(),
            "version" => self.version = unquote(value).to_string(),
            "task" => self.task = unquote(value).to_string(),
            "stride" => self.stride = parse_number(key, value)?,
            "batch" => self.batch = parse_number(key, value)?,
            "imgsz" => self.imgsz = parse_imgsz(&split_inline(value))?,
            "names" => self.names = parse_names_inline(value),
            _ => {}
        }
        Ok(())
    }

    fn apply_block(&mut self, key: &str, items: &[&str]) -> Result<()> {
        match key {
            "imgsz" => {
                let values: Vec<&str> = items.iter().map(|i| strip_dash(i)).collect();
                self.imgsz = parse_imgsz(&values)?;
            }
            "names" => self.names = parse_names_block(items),
            _ => {}
        }
        Ok(())
    }

    /// Get the number of classes in this model.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.names.len()
    }

    /// Get a class name by ID.
    #[must_use]
    pub fn class_name(&self, class_id: usize) -> Option<&str> {
        self.names.get(&class_id).map(String::as_str)
    }

    /// Class names sorted by class id.
    #[must_use]
    pub fn names_in_order(&self) -> Vec<&str> {
        let mut entries: Vec<(&usize, &String)> = self.names.iter().collect();
        entries.sort_by_key(|(id, _)| **id);
        entries.into_iter().map(|(_, name)| name.as_str()).collect()
    }
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn strip_dash(item: &str) -> &str {
    item.strip_prefix('-').map_or(item, str::trim)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    unquote(value).parse().map_err(|_| {
        AnnotateError::ModelLoadError(format!("Invalid {key} value in metadata: {value}"))
    })
}

/// `[640, 640]` or `640` to a list of items.
fn split_inline(value: &str) -> Vec<&str> {
    let inner = value
        .trim()
        .trim_start_matches(['[', '('])
        .trim_end_matches([']', ')']);
    split_top_level(inner)
}

fn parse_imgsz(values: &[&str]) -> Result<(usize, usize)> {
    let sizes = values
        .iter()
        .map(|v| parse_number::<usize>("imgsz", v))
        .collect::<Result<Vec<_>>>()?;

    match sizes.as_slice() {
        [size] => Ok((*size, *size)),
        [h, w, ..] => Ok((*h, *w)),
        [] => Err(AnnotateError::ModelLoadError(
            "Empty imgsz value in metadata".to_string(),
        )),
    }
}

/// `{0: 'person', 1: 'bicycle'}` or `['person', 'bicycle']`.
fn parse_names_inline(value: &str) -> HashMap<usize, String> {
    let value = value.trim();
    if let Some(inner) = value.strip_prefix('{').and_then(|v| v.strip_suffix('}')) {
        return split_top_level(inner)
            .into_iter()
            .filter_map(parse_name_entry)
            .collect();
    }
    if let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
        return split_top_level(inner)
            .into_iter()
            .enumerate()
            .map(|(i, name)| (i, unquote(name).to_string()))
            .collect();
    }
    HashMap::new()
}

/// Block mapping (`0: person`) or block list (`- person`) entries.
fn parse_names_block(items: &[&str]) -> HashMap<usize, String> {
    if items.iter().all(|i| i.starts_with('-')) {
        return items
            .iter()
            .enumerate()
            .map(|(i, item)| (i, unquote(strip_dash(item)).to_string()))
            .collect();
    }
    items.iter().copied().filter_map(parse_name_entry).collect()
}

fn parse_name_entry(entry: &str) -> Option<(usize, String)> {
    let (key, value) = entry.split_once(':')?;
    let id = unquote(key).parse().ok()?;
    Some((id, unquote(value).to_string()))
}

/// Split on commas that are not inside quotes.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, ',') => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(s[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_METADATA: &str = r"
description: Ultralytics YOLO11n model trained on helmet.yaml
author: Ultralytics
date: '2025-12-11T20:19:45.464021'
version: 8.3.236
stride: 32
task: detect
batch: 1
imgsz:
- 640
- 640
names:
  0: helmet
  1: vest
  2: head
channels: 3
";

    #[test]
    fn test_parse_block_metadata() {
        let metadata = ModelMetadata::from_yaml_str(SAMPLE_METADATA).unwrap();

        assert_eq!(metadata.task, "detect");
        assert_eq!(metadata.stride, 32);
        assert_eq!(metadata.batch, 1);
        assert_eq!(metadata.imgsz, (640, 640));
        assert_eq!(metadata.date, "2025-12-11T20:19:45.464021");
        assert_eq!(metadata.names_in_order(), vec!["helmet", "vest", "head"]);
    }

    #[test]
    fn test_parse_inline_dict_names() {
        let yaml = concat!(
            "task: detect\nimgsz: [480, 640]\n",
            "names: {0: 'person', 1: 'traffic light', 2: \"a, b\"}",
        );
        let metadata = ModelMetadata::from_yaml_str(yaml).unwrap();
        assert_eq!(metadata.imgsz, (480, 640));
        assert_eq!(metadata.class_name(1), Some("traffic light"));
        assert_eq!(metadata.class_name(2), Some("a, b"));
        assert_eq!(metadata.num_classes(), 3);
    }

    #[test]
    fn test_parse_list_names() {
        let yaml = "names:\n- helmet\n- vest\nstride: 16\n";
        let metadata = ModelMetadata::from_yaml_str(yaml).unwrap();
        assert_eq!(metadata.names_in_order(), vec!["helmet", "vest"]);
        assert_eq!(metadata.stride, 16);
    }

    #[test]
    fn test_names_in_order_sorts_by_id() {
        let metadata =
            ModelMetadata::from_yaml_str("names: {10: 'k', 2: 'c', 0: 'a'}").unwrap();
        assert_eq!(metadata.names_in_order(), vec!["a", "c", "k"]);
    }

    #[test]
    fn test_from_properties() {
        let props: HashMap<&str, &str> = [
            ("names", "{0: 'helmet', 1: 'vest'}"),
            ("imgsz", "[320, 320]"),
            ("stride", "32"),
        ]
        .into_iter()
        .collect();

        let metadata =
            ModelMetadata::from_properties(|k| props.get(k).map(ToString::to_string)).unwrap();
        assert_eq!(metadata.imgsz, (320, 320));
        assert_eq!(metadata.names_in_order(), vec!["helmet", "vest"]);
    }

    #[test]
    fn test_invalid_stride() {
        let err = ModelMetadata::from_yaml_str("stride: abc").unwrap_err();
        assert!(matches!(err, AnnotateError::ModelLoadError(_)));
    }

    #[test]
    fn test_from_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.txt");
        std::fs::write(&path, "helmet\nvest\n\n").unwrap();

        let metadata = ModelMetadata::from_file(&path).unwrap();
        assert_eq!(metadata.names_in_order(), vec!["helmet", "vest"]);
    }

    #[test]
    fn test_default_metadata() {
        let metadata = ModelMetadata::default();
        assert_eq!(metadata.task, "detect");
        assert_eq!(metadata.stride, 32);
        assert_eq!(metadata.imgsz, (640, 640));
        assert!(metadata.names.is_empty());
    }
}
