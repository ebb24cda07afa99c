//! Caller-owned, lazily initialized detector state.
//!
//! A [`DetectorContext`] replaces process-wide model globals: it knows where the model comes
//! from and builds the [`FaceDetector`] on first use. Initialization holds a lock, so concurrent
//! callers wait for the same load instead of starting their own, and later callers share the
//! resulting `Arc`. Failed loads are not cached.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use log::{info, warn};

use faceblur_utils::{config::AppSettings, timing_guard};

use crate::detector::FaceDetector;
use crate::error::{FaceBlurError, Result};
use crate::model::{InferenceEngine, UltraFaceModel};
use crate::postprocess::PostprocessConfig;
use crate::preprocess::PreprocessConfig;

/// Where the detector network is loaded from.
#[derive(Clone)]
pub enum ModelSource {
    /// ONNX file on disk.
    Path(PathBuf),
    /// ONNX graph already in memory.
    Bytes(Arc<[u8]>),
    /// Ready-made engine, typically a test double or an alternative backend.
    Engine(Arc<dyn InferenceEngine>),
    /// Custom constructor invoked on each initialization attempt until one succeeds.
    Loader(Arc<EngineLoader>),
}

/// Constructor for a custom [`InferenceEngine`].
pub type EngineLoader = dyn Fn() -> anyhow::Result<Arc<dyn InferenceEngine>> + Send + Sync;

impl std::fmt::Debug for ModelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            ModelSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            ModelSource::Engine(engine) => f.debug_tuple("Engine").field(engine).finish(),
            ModelSource::Loader(_) => f.write_str("Loader(..)"),
        }
    }
}

/// Lazily initialized detector shared by every caller holding the context.
#[derive(Debug)]
pub struct DetectorContext {
    source: ModelSource,
    preprocess: PreprocessConfig,
    postprocess: PostprocessConfig,
    detector: Mutex<Option<Arc<FaceDetector>>>,
}

impl DetectorContext {
    pub fn new(
        source: ModelSource,
        preprocess: PreprocessConfig,
        postprocess: PostprocessConfig,
    ) -> Self {
        Self {
            source,
            preprocess,
            postprocess,
            detector: Mutex::new(None),
        }
    }

    /// Build a context from persisted settings, loading the model from `settings.model_path`.
    ///
    /// The telemetry section is applied to the global timing switches as a side effect.
    pub fn from_settings(settings: &AppSettings) -> Self {
        settings.telemetry.apply();
        Self::new(
            ModelSource::Path(settings.model_path()),
            settings.input.into(),
            (&settings.detection).into(),
        )
    }

    /// Context around an already constructed engine.
    pub fn with_engine(engine: Arc<dyn InferenceEngine>) -> Self {
        Self::new(
            ModelSource::Engine(engine),
            PreprocessConfig::default(),
            PostprocessConfig::default(),
        )
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    pub fn preprocess_config(&self) -> &PreprocessConfig {
        &self.preprocess
    }

    pub fn postprocess_config(&self) -> &PostprocessConfig {
        &self.postprocess
    }

    /// Whether a detector has been successfully initialized.
    pub fn is_ready(&self) -> bool {
        self.detector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Return the shared detector, initializing it on first call.
    ///
    /// Only one initialization runs at a time. On failure nothing is cached and a later call
    /// retries.
    pub fn detector(&self) -> Result<Arc<FaceDetector>> {
        let mut slot = self
            .detector
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(detector) = slot.as_ref() {
            return Ok(Arc::clone(detector));
        }

        let _guard = timing_guard("faceblur_core::initialize", log::Level::Info);
        let engine = self.load_engine().map_err(|err| {
            warn!("face detector initialization failed: {err}");
            err
        })?;
        let detector = Arc::new(FaceDetector::new(
            engine,
            self.preprocess.clone(),
            self.postprocess.clone(),
        ));
        *slot = Some(Arc::clone(&detector));
        Ok(detector)
    }

    fn load_engine(&self) -> Result<Arc<dyn InferenceEngine>> {
        let input_size = self.preprocess.input_size;
        let model = match &self.source {
            ModelSource::Engine(engine) => return Ok(Arc::clone(engine)),
            ModelSource::Loader(loader) => loader(),
            ModelSource::Path(path) => {
                info!("Loading face detection model from {}", path.display());
                UltraFaceModel::load(path, input_size)
                    .map(|model| Arc::new(model) as Arc<dyn InferenceEngine>)
            }
            ModelSource::Bytes(bytes) => {
                info!("Loading face detection model from {} bytes", bytes.len());
                UltraFaceModel::from_bytes(bytes, input_size)
                    .map(|model| Arc::new(model) as Arc<dyn InferenceEngine>)
            }
        };
        model.map_err(|err| FaceBlurError::Initialization(FaceBlurError::chain(&err)))
    }
}
