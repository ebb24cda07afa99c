use std::{fmt::Write, io::Cursor, path::Path};

use anyhow::{Context, Result};
use log::{debug, warn};
use tract_onnx::prelude::*;

use crate::postprocess::RawDetectionOutputs;
use crate::preprocess::InputSize;

type RunnableModel = TypedRunnableModel<TypedModel>;

/// Black-box detector network: a normalized `[1, 3, H, W]` tensor in, raw per-anchor outputs
/// out.
pub trait InferenceEngine: Send + Sync + std::fmt::Debug {
    fn infer(&self, input: Tensor) -> Result<RawDetectionOutputs>;
}

/// Ultra-Light-Fast RFB face detector executed with `tract-onnx`.
///
/// Output 0 carries `[1, N, 2]` class scores and output 1 carries `[1, N, 4]` box offsets.
#[derive(Debug)]
pub struct UltraFaceModel {
    runnable: RunnableModel,
    input_size: InputSize,
}

impl UltraFaceModel {
    /// Load and optimize the ONNX graph from disk.
    pub fn load<P: AsRef<Path>>(model_path: P, input_size: InputSize) -> Result<Self> {
        let path = model_path.as_ref();
        anyhow::ensure!(path.exists(), "model file not found: {}", path.display());
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read model file {}", path.display()))?;
        Self::from_bytes(&bytes, input_size)
            .with_context(|| format!("failed to load model {}", path.display()))
    }

    /// Load and optimize the ONNX graph from an in-memory buffer.
    pub fn from_bytes(bytes: &[u8], input_size: InputSize) -> Result<Self> {
        anyhow::ensure!(!bytes.is_empty(), "model buffer is empty");

        let runnable = match load_runnable_model(bytes, input_size, true) {
            Ok(model) => {
                debug!(
                    "RFB model optimized successfully ({}x{})",
                    input_size.width, input_size.height
                );
                model
            }
            Err(opt_err) => {
                let mut chain_msg = String::new();
                for cause in opt_err.chain() {
                    let _ = writeln!(&mut chain_msg, "  - {cause}");
                }
                warn!(
                    "RFB model failed optimized load; falling back to decluttered graph.\nError chain:\n{}",
                    chain_msg.trim_end()
                );
                load_runnable_model(bytes, input_size, false).with_context(|| {
                    format!("fallback to decluttered graph failed after optimize error: {opt_err}")
                })?
            }
        };

        Ok(Self {
            runnable,
            input_size,
        })
    }

    pub fn input_size(&self) -> InputSize {
        self.input_size
    }
}

impl InferenceEngine for UltraFaceModel {
    fn infer(&self, input: Tensor) -> Result<RawDetectionOutputs> {
        let outputs = self
            .runnable
            .run(tvec![input.into()])
            .map_err(|e| anyhow::anyhow!("RFB execution failed: {e}"))?;
        anyhow::ensure!(
            outputs.len() >= 2,
            "expected score and box outputs, model produced {}",
            outputs.len()
        );

        let scores = outputs[0]
            .as_slice::<f32>()
            .map_err(|e| anyhow::anyhow!("score output not f32: {e}"))?
            .to_vec();
        let offsets = outputs[1]
            .as_slice::<f32>()
            .map_err(|e| anyhow::anyhow!("box output not f32: {e}"))?
            .to_vec();

        Ok(RawDetectionOutputs { scores, offsets })
    }
}

fn load_runnable_model(bytes: &[u8], input_size: InputSize, optimized: bool) -> Result<RunnableModel> {
    let shape = [1usize, 3, input_size.height as usize, input_size.width as usize];
    let model = tract_onnx::onnx()
        .model_for_read(&mut Cursor::new(bytes))
        .context("failed to parse ONNX graph")?
        .with_input_fact(0, f32::fact(shape).into())
        .map_err(|e| anyhow::anyhow!("unable to pin input shape {shape:?}: {e}"))?;

    if optimized {
        model
            .into_optimized()
            .map_err(|e| anyhow::anyhow!("unable to optimize RFB graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make RFB graph runnable: {e}"))
    } else {
        model
            .into_typed()
            .map_err(|e| anyhow::anyhow!("unable to type-check RFB graph: {e}"))?
            .into_decluttered()
            .map_err(|e| anyhow::anyhow!("unable to declutter RFB graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make RFB graph runnable: {e}"))
    }
}
