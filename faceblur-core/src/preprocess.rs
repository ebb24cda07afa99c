//! Preparing images for RFB inference.
//!
//! Images are resized to the model resolution and converted to an RGB NCHW tensor normalized
//! as `(value - 127) / 128`. The original size is kept so detections can be projected back.

use std::borrow::Cow;

use anyhow::Result;
use faceblur_utils::{
    config::{InputDimensions, ResizeQuality},
    resize_image, rgb_to_normalized_chw,
    telemetry::timing_guard,
};
use image::{DynamicImage, GenericImageView, RgbImage, imageops::FilterType};
use tract_onnx::prelude::Tensor;

/// Model input resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSize {
    pub width: u32,
    pub height: u32,
}

impl InputSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for InputSize {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

/// Configuration for preprocessing an image before inference.
#[derive(Debug, Clone, Default)]
pub struct PreprocessConfig {
    pub input_size: InputSize,
    /// Resize filter preference controlling the quality vs speed trade-off.
    pub resize_quality: ResizeQuality,
}

impl PreprocessConfig {
    fn resize_filter(&self) -> FilterType {
        match self.resize_quality {
            ResizeQuality::Quality => FilterType::Triangle,
            ResizeQuality::Speed => FilterType::Nearest,
        }
    }
}

/// Output of preprocessing: tensor plus the size detections are projected back onto.
#[derive(Debug)]
pub struct PreprocessOutput {
    /// `[1, 3, H, W]` RGB tensor.
    pub tensor: Tensor,
    /// Dimensions of the image before resizing.
    pub original_size: (u32, u32),
}

/// Resize and normalize `image` into a model-ready tensor.
pub fn preprocess_image(image: &DynamicImage, config: &PreprocessConfig) -> Result<PreprocessOutput> {
    let _guard = timing_guard("faceblur_core::preprocess_image", log::Level::Trace);
    let InputSize {
        width: input_w,
        height: input_h,
    } = config.input_size;
    anyhow::ensure!(
        input_w > 0 && input_h > 0,
        "input dimensions must be greater than zero"
    );

    let (orig_w, orig_h) = image.dimensions();
    anyhow::ensure!(
        orig_w > 0 && orig_h > 0,
        "source image dimensions must be greater than zero"
    );

    let resized: Cow<'_, RgbImage> = if (orig_w, orig_h) == (input_w, input_h) {
        match image.as_rgb8() {
            Some(rgb) => Cow::Borrowed(rgb),
            None => Cow::Owned(image.to_rgb8()),
        }
    } else {
        Cow::Owned(resize_image(image, input_w, input_h, config.resize_filter()))
    };
    let chw = rgb_to_normalized_chw(&resized);

    let shape = [1usize, 3, input_h as usize, input_w as usize];
    let (data, offset) = chw.into_raw_vec_and_offset();
    debug_assert_eq!(offset, Some(0), "expected contiguous array");
    let tensor = Tensor::from_shape(&shape, &data)
        .map_err(|e| anyhow::anyhow!("failed to build tensor: {e}"))?;

    Ok(PreprocessOutput {
        tensor,
        original_size: (orig_w, orig_h),
    })
}

impl From<InputDimensions> for PreprocessConfig {
    fn from(dimensions: InputDimensions) -> Self {
        PreprocessConfig {
            input_size: InputSize::new(dimensions.width, dimensions.height),
            resize_quality: dimensions.resize_quality,
        }
    }
}

impl From<&InputDimensions> for PreprocessConfig {
    fn from(dimensions: &InputDimensions) -> Self {
        (*dimensions).into()
    }
}
