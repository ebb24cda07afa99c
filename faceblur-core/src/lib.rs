//! Core face anonymization primitives.
//!
//! This crate turns raw output of the Ultra-Light-Fast RFB-640 face detector into face
//! rectangles (prior generation, SSD decoding, hard NMS) and obscures those rectangles in an
//! RGBA image by pixelation or Gaussian blur. Inference runs through `tract-onnx` behind the
//! [`InferenceEngine`] trait.

/// Prior box generation for the RFB-640 layout.
pub mod anchors;
/// Encoded-image blur helpers.
pub mod anonymize;
/// Pixelation and blur compositors.
pub mod compositing;
/// Lazily initialized, caller-owned detector context.
pub mod context;
/// High-level face detection runner.
pub mod detector;
/// Error taxonomy.
pub mod error;
/// ONNX model loading and execution.
pub mod model;
/// Detection post-processing (decoding, score filtering, NMS).
pub mod postprocess;
/// Image pre-processing (resizing, tensor conversion).
pub mod preprocess;
/// Integer face rectangles and clipping.
pub mod region;

pub use anchors::{Anchor, PriorConfig, PriorLevel, generate_anchors, generate_anchors_with};
pub use anonymize::{blur_face_area, blur_image_bytes, blur_image_bytes_or_original};
pub use compositing::{
    CompositeOptions, PixelationConfig, apply_gaussian_blur, apply_obscure, apply_pixelation,
    apply_pixelation_with, pixelate_region_with_block,
};
pub use context::{DetectorContext, EngineLoader, ModelSource};
pub use detector::{DetectionOutput, FaceDetector};
pub use error::{FaceBlurError, Result};
pub use model::{InferenceEngine, UltraFaceModel};
pub use postprocess::{
    Face, PostprocessConfig, RawDetectionOutputs, apply_postprocess, decode_detections, hard_nms,
};
pub use preprocess::{InputSize, PreprocessConfig, PreprocessOutput, preprocess_image};
pub use region::{PixelRect, Region};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
