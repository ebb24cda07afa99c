use std::cmp::Ordering;

use faceblur_utils::config::DetectionSettings;

use crate::anchors::Anchor;
use crate::error::{FaceBlurError, Result};
use crate::region::Region;

/// Detection post-processing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PostprocessConfig {
    /// A candidate survives decoding only when its face score is strictly greater than this.
    pub score_threshold: f32,
    /// A candidate is suppressed when its IoU with a kept box is strictly greater than this.
    pub iou_threshold: f32,
    /// Scale applied to center regression deltas.
    pub center_variance: f32,
    /// Scale applied to size regression deltas before exponentiation.
    pub size_variance: f32,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.4,
            iou_threshold: 0.3,
            center_variance: 0.1,
            size_variance: 0.2,
        }
    }
}

/// Raw per-anchor model outputs.
///
/// `scores` holds a (background, face) pair per anchor and `offsets` holds
/// `(dcx, dcy, dw, dh)` per anchor, both in anchor order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDetectionOutputs {
    pub scores: Vec<f32>,
    pub offsets: Vec<f32>,
}

impl RawDetectionOutputs {
    pub const SCORES_PER_ANCHOR: usize = 2;
    pub const OFFSETS_PER_ANCHOR: usize = 4;

    /// Check both arrays against the anchor count before anything indexes into them.
    pub fn validate(&self, anchor_count: usize) -> Result<()> {
        let expected = anchor_count * Self::SCORES_PER_ANCHOR;
        if self.scores.len() != expected {
            return Err(FaceBlurError::InputShapeMismatch {
                output: "scores",
                expected,
                actual: self.scores.len(),
                anchors: anchor_count,
            });
        }
        let expected = anchor_count * Self::OFFSETS_PER_ANCHOR;
        if self.offsets.len() != expected {
            return Err(FaceBlurError::InputShapeMismatch {
                output: "offsets",
                expected,
                actual: self.offsets.len(),
                anchors: anchor_count,
            });
        }
        Ok(())
    }
}

/// Decoded face box in original-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
}

impl Face {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Area, clamped at zero for inverted boxes.
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Intersection over Union with another box.
    ///
    /// No epsilon guards the union: a zero intersection yields 0.0 directly, which also covers
    /// zero-area boxes.
    pub fn iou(&self, other: &Self) -> f32 {
        let inter_w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let inter_h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection = inter_w * inter_h;
        if intersection <= 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - intersection;
        intersection / union
    }

    /// Round corners to the integer rectangle handed to the compositor.
    pub fn to_region(&self) -> Region {
        Region {
            x: self.x1.round() as i32,
            y: self.y1.round() as i32,
            width: self.width().round() as i32,
            height: self.height().round() as i32,
        }
    }
}

/// Decode raw outputs into unsorted candidates above the score threshold.
///
/// Boxes are scaled to `original_size` and are not clamped to the image.
pub fn decode_detections(
    anchors: &[Anchor],
    raw: &RawDetectionOutputs,
    original_size: (u32, u32),
    config: &PostprocessConfig,
) -> Result<Vec<Face>> {
    raw.validate(anchors.len())?;

    let orig_w = original_size.0 as f32;
    let orig_h = original_size.1 as f32;
    let score_pairs = raw.scores.chunks_exact(RawDetectionOutputs::SCORES_PER_ANCHOR);
    let deltas = raw.offsets.chunks_exact(RawDetectionOutputs::OFFSETS_PER_ANCHOR);

    let mut faces = Vec::new();
    for ((anchor, pair), delta) in anchors.iter().zip(score_pairs).zip(deltas) {
        let score = pair[1];
        if score.is_nan() || score <= config.score_threshold {
            continue;
        }

        let cx = anchor.cx + delta[0] * config.center_variance * anchor.w;
        let cy = anchor.cy + delta[1] * config.center_variance * anchor.h;
        let w = anchor.w * (delta[2] * config.size_variance).exp();
        let h = anchor.h * (delta[3] * config.size_variance).exp();

        let x1 = (cx - w / 2.0) * orig_w;
        let y1 = (cy - h / 2.0) * orig_h;
        faces.push(Face {
            x1,
            y1,
            x2: x1 + w * orig_w,
            y2: y1 + h * orig_h,
            score,
        });
    }
    Ok(faces)
}

/// Greedy hard non-maximum suppression.
///
/// Candidates are stable-sorted by descending score; each kept box suppresses every later
/// candidate whose IoU with it exceeds `iou_threshold`. Survivors are returned in that order.
pub fn hard_nms(mut faces: Vec<Face>, iou_threshold: f32) -> Vec<Face> {
    faces.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut suppressed = vec![false; faces.len()];
    for i in 0..faces.len() {
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..faces.len() {
            if !suppressed[j] && faces[i].iou(&faces[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    faces
        .into_iter()
        .zip(suppressed)
        .filter_map(|(face, dropped)| (!dropped).then_some(face))
        .collect()
}

/// Decode, threshold, and suppress in one pass.
pub fn apply_postprocess(
    anchors: &[Anchor],
    raw: &RawDetectionOutputs,
    original_size: (u32, u32),
    config: &PostprocessConfig,
) -> Result<Vec<Face>> {
    let candidates = decode_detections(anchors, raw, original_size, config)?;
    let before = candidates.len();
    let faces = hard_nms(candidates, config.iou_threshold);
    log::debug!("NMS kept {} of {} candidate(s)", faces.len(), before);
    Ok(faces)
}

impl From<DetectionSettings> for PostprocessConfig {
    fn from(settings: DetectionSettings) -> Self {
        PostprocessConfig {
            score_threshold: settings.score_threshold,
            iou_threshold: settings.iou_threshold,
            center_variance: settings.center_variance,
            size_variance: settings.size_variance,
        }
    }
}

impl From<&DetectionSettings> for PostprocessConfig {
    fn from(settings: &DetectionSettings) -> Self {
        settings.clone().into()
    }
}
