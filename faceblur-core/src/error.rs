use thiserror::Error;

/// Failures surfaced by the detection and anonymization pipeline.
#[derive(Debug, Error)]
pub enum FaceBlurError {
    /// The inference engine or its weights could not be loaded.
    #[error("failed to initialize face detector: {0}")]
    Initialization(String),

    /// Raw model outputs disagree with the anchor layout.
    #[error("{output} output has {actual} values, expected {expected} for {anchors} anchors")]
    InputShapeMismatch {
        output: &'static str,
        expected: usize,
        actual: usize,
        anchors: usize,
    },

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("failed to prepare model input: {0}")]
    Preprocess(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

impl FaceBlurError {
    /// Flatten an `anyhow` chain into a single message for the given variant.
    pub(crate) fn chain(err: &anyhow::Error) -> String {
        format!("{err:#}")
    }
}

pub type Result<T, E = FaceBlurError> = std::result::Result<T, E>;
