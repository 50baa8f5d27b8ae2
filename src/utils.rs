// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Box geometry and text helpers shared by postprocessing and result printing.

/// Intersection over Union of two `[x1, y1, x2, y2]` boxes, `0.0` for degenerate unions.
#[must_use]
pub fn calculate_iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;

    let union = box_area(a) + box_area(b) - inter;
    if union > 0.0 { inter / union } else { 0.0 }
}

fn box_area(b: &[f32; 4]) -> f32 {
    (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0)
}

/// Per-class non-maximum suppression.
///
/// `boxes` holds `([x1, y1, x2, y2], score, class_id)`. Returns the indices of the
/// kept boxes ordered by descending score. A box is only suppressed by a
/// higher-scoring box of the same class whose `IoU` exceeds `iou_threshold`.
#[must_use]
pub fn nms_per_class(boxes: &[([f32; 4], f32, usize)], iou_threshold: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by(|&a, &b| boxes[b].1.total_cmp(&boxes[a].1));

    let mut keep: Vec<usize> = Vec::new();
    for i in order {
        let (bbox, _, class_id) = &boxes[i];
        let overlaps_kept = keep.iter().any(|&k| {
            boxes[k].2 == *class_id && calculate_iou(&boxes[k].0, bbox) > iou_threshold
        });
        if !overlaps_kept {
            keep.push(i);
        }
    }
    keep
}

/// English plural of a class name, for summaries like `2 helmets, 1 person`.
#[must_use]
pub fn pluralize(word: &str) -> String {
    match word {
        "person" => "persons".to_string(),
        "sheep" | "skis" | "glasses" => word.to_string(),
        "knife" => "knives".to_string(),
        "mouse" => "mice".to_string(),
        _ if ["s", "ch", "sh", "x"].iter().any(|end| word.ends_with(end)) => {
            format!("{word}es")
        }
        _ if word.ends_with('y') && !word.ends_with("ey") && !word.ends_with("ay") => {
            format!("{}ies", &word[..word.len() - 1])
        }
        _ => format!("{word}s"),
    }
}
