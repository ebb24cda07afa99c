//! Prior (anchor) boxes for the RFB-640 face detector.
//!
//! The model emits one score pair and one offset quadruple per prior, in exactly the order
//! produced here: level, then feature-map row, then column, then min size.

/// Prior box in normalized center form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

/// One feature-map level of the prior grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorLevel {
    /// Feature map columns.
    pub cols: usize,
    /// Feature map rows.
    pub rows: usize,
    /// Pixel stride between neighbouring cells at the reference resolution.
    pub step: f32,
    /// Box edge lengths in reference pixels, one prior per entry.
    pub min_sizes: Vec<f32>,
}

impl PriorLevel {
    fn new(cols: usize, rows: usize, step: f32, min_sizes: &[f32]) -> Self {
        Self {
            cols,
            rows,
            step,
            min_sizes: min_sizes.to_vec(),
        }
    }

    /// Number of priors this level contributes.
    pub fn anchor_count(&self) -> usize {
        self.rows * self.cols * self.min_sizes.len()
    }
}

/// Reference resolution and feature-map levels used to lay out priors.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorConfig {
    pub reference_width: f32,
    pub reference_height: f32,
    pub levels: Vec<PriorLevel>,
}

/// Strides and min sizes of the RFB detection heads, shallowest first.
const RFB_HEADS: [(u32, &[f32]); 4] = [
    (8, &[10.0, 16.0, 24.0]),
    (16, &[32.0, 48.0]),
    (32, &[64.0, 96.0]),
    (64, &[128.0, 192.0, 256.0]),
];

impl PriorConfig {
    /// Layout of the RFB-640 model at its 640x480 input.
    pub fn rfb_640() -> Self {
        Self::for_input(640, 480)
    }

    /// Layout of the RFB heads for a `width` x `height` model input.
    ///
    /// Each head's feature map is the input divided by its stride, rounded up; min sizes stay in
    /// input pixels.
    pub fn for_input(width: u32, height: u32) -> Self {
        let levels = RFB_HEADS
            .iter()
            .map(|&(step, min_sizes)| {
                PriorLevel::new(
                    width.div_ceil(step) as usize,
                    height.div_ceil(step) as usize,
                    step as f32,
                    min_sizes,
                )
            })
            .collect();
        Self {
            reference_width: width as f32,
            reference_height: height as f32,
            levels,
        }
    }

    /// Closed-form prior count: sum of `rows * cols * |min_sizes|` over levels.
    pub fn anchor_count(&self) -> usize {
        self.levels.iter().map(PriorLevel::anchor_count).sum()
    }
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self::rfb_640()
    }
}

/// Generate the RFB-640 prior sequence.
pub fn generate_anchors() -> Vec<Anchor> {
    generate_anchors_with(&PriorConfig::rfb_640())
}

/// Generate priors for an arbitrary layout. No clamping is applied.
pub fn generate_anchors_with(config: &PriorConfig) -> Vec<Anchor> {
    let mut anchors = Vec::with_capacity(config.anchor_count());
    for level in &config.levels {
        for row in 0..level.rows {
            for col in 0..level.cols {
                let cx = (col as f32 + 0.5) * level.step / config.reference_width;
                let cy = (row as f32 + 0.5) * level.step / config.reference_height;
                for &size in &level.min_sizes {
                    anchors.push(Anchor {
                        cx,
                        cy,
                        w: size / config.reference_width,
                        h: size / config.reference_height,
                    });
                }
            }
        }
    }
    anchors
}
