use std::sync::Arc;

use image::DynamicImage;
use log::{debug, warn};

use faceblur_utils::{decode_image, timing_guard};

use crate::anchors::{Anchor, PriorConfig, generate_anchors_with};
use crate::error::{FaceBlurError, Result};
use crate::model::InferenceEngine;
use crate::postprocess::{Face, PostprocessConfig, apply_postprocess};
use crate::preprocess::{InputSize, PreprocessConfig, PreprocessOutput, preprocess_image};
use crate::region::Region;

/// Result of running the detector on one image.
#[derive(Debug, Clone)]
pub struct DetectionOutput {
    /// Surviving faces, highest score first.
    pub faces: Vec<Face>,
    /// Dimensions of the image the faces refer to.
    pub original_size: (u32, u32),
}

impl DetectionOutput {
    /// Integer rectangles in survivor order.
    pub fn regions(&self) -> Vec<Region> {
        self.faces.iter().map(Face::to_region).collect()
    }
}

/// Couples an inference engine with its prior layout and pre/post-processing settings.
///
/// The anchor sequence is generated once here, for the configured model input size, and shared
/// read-only across calls and threads.
///
/// Two families of entry points exist: `try_*` methods report every failure, while `detect*`
/// methods fail open, logging the cause and returning no faces so the caller simply blurs
/// nothing.
#[derive(Debug, Clone)]
pub struct FaceDetector {
    engine: Arc<dyn InferenceEngine>,
    anchors: Arc<[Anchor]>,
    preprocess: PreprocessConfig,
    postprocess: PostprocessConfig,
}

impl FaceDetector {
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        preprocess: PreprocessConfig,
        postprocess: PostprocessConfig,
    ) -> Self {
        let InputSize { width, height } = preprocess.input_size;
        let anchors: Arc<[Anchor]> =
            generate_anchors_with(&PriorConfig::for_input(width, height)).into();
        debug!("face detector ready with {} priors", anchors.len());
        Self {
            engine,
            anchors,
            preprocess,
            postprocess,
        }
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn preprocess_config(&self) -> &PreprocessConfig {
        &self.preprocess
    }

    pub fn postprocess_config(&self) -> &PostprocessConfig {
        &self.postprocess
    }

    /// Run detection, reporting any failure.
    pub fn try_detect(&self, image: &DynamicImage) -> Result<DetectionOutput> {
        let _guard = timing_guard("faceblur_core::detect", log::Level::Debug);
        let prep = preprocess_image(image, &self.preprocess)
            .map_err(|err| FaceBlurError::Preprocess(FaceBlurError::chain(&err)))?;
        self.run_preprocessed(prep)
    }

    /// Decode `bytes` and run detection, reporting any failure.
    pub fn try_detect_bytes(&self, bytes: &[u8]) -> Result<DetectionOutput> {
        let image =
            decode_image(bytes).map_err(|err| FaceBlurError::Decode(FaceBlurError::chain(&err)))?;
        self.try_detect(&image)
    }

    /// Fail-open detection: any failure is logged and yields an empty list.
    pub fn detect(&self, image: &DynamicImage) -> Vec<Region> {
        fail_open(self.try_detect(image))
    }

    /// Fail-open detection on an encoded image, including decode failures.
    pub fn detect_bytes(&self, bytes: &[u8]) -> Vec<Region> {
        fail_open(self.try_detect_bytes(bytes))
    }

    /// Fail-open detection returning a JSON array of `{x, y, width, height}` objects.
    pub fn detect_json(&self, bytes: &[u8]) -> String {
        let regions = self.detect_bytes(bytes);
        serde_json::to_string(&regions).unwrap_or_else(|err| {
            warn!("failed to serialize detections: {err}");
            "[]".to_string()
        })
    }

    fn run_preprocessed(&self, prep: PreprocessOutput) -> Result<DetectionOutput> {
        let raw = {
            let _guard = timing_guard("faceblur_core::inference", log::Level::Debug);
            self.engine
                .infer(prep.tensor)
                .map_err(|err| FaceBlurError::Inference(FaceBlurError::chain(&err)))?
        };

        let faces = {
            let _guard = timing_guard("faceblur_core::postprocess", log::Level::Debug);
            apply_postprocess(&self.anchors, &raw, prep.original_size, &self.postprocess)?
        };
        debug!(
            "detected {} face(s) in {}x{} image",
            faces.len(),
            prep.original_size.0,
            prep.original_size.1
        );

        Ok(DetectionOutput {
            faces,
            original_size: prep.original_size,
        })
    }
}

fn fail_open(result: Result<DetectionOutput>) -> Vec<Region> {
    match result {
        Ok(output) => output.regions(),
        Err(err) => {
            warn!("face detection failed, continuing with no faces: {err}");
            Vec::new()
        }
    }
}
