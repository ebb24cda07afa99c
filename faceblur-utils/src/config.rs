//! Shared configuration types consumed across the faceblur workspace.
//!
//! These structures describe inference, detection, and compositing parameters and can be
//! persisted as JSON so the same settings drive every entry point.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Default location of the RFB-640 face detection model.
pub const DEFAULT_MODEL_PATH: &str = "models/version-RFB-640.onnx";

/// Detection post-processing parameters matching the RFB-640 reference pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionSettings {
    /// Face-class confidence a candidate must exceed to survive decoding.
    pub score_threshold: f32,
    /// IoU above which a lower-scored candidate is suppressed.
    pub iou_threshold: f32,
    /// Scale applied to center regression deltas.
    pub center_variance: f32,
    /// Scale applied to size regression deltas before exponentiation.
    pub size_variance: f32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            score_threshold: 0.4,
            iou_threshold: 0.3,
            center_variance: 0.1,
            size_variance: 0.2,
        }
    }
}

/// Resize filter preference used before inference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResizeQuality {
    /// Bilinear (Triangle) resampling, as the reference pipeline uses.
    #[default]
    Quality,
    /// Nearest-neighbour resampling for throughput.
    Speed,
}

impl fmt::Display for ResizeQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResizeQuality::Quality => "quality",
            ResizeQuality::Speed => "speed",
        })
    }
}

impl FromStr for ResizeQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quality" => Ok(ResizeQuality::Quality),
            "speed" => Ok(ResizeQuality::Speed),
            other => Err(format!(
                "invalid resize quality '{other}'; expected 'quality' or 'speed'"
            )),
        }
    }
}

/// Model input resolution in pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InputDimensions {
    pub width: u32,
    pub height: u32,
    /// Choose between quality-focused or speed-focused resizing.
    pub resize_quality: ResizeQuality,
}

impl Default for InputDimensions {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            resize_quality: ResizeQuality::Quality,
        }
    }
}

/// How a face region is obscured.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObscureStyle {
    /// Block-average the region into a mosaic.
    #[default]
    Pixelate,
    /// Gaussian blur with the given standard deviation.
    Gaussian { sigma: f32 },
}

impl ObscureStyle {
    /// Blur strength used by the native reference backend.
    pub const DEFAULT_SIGMA: f32 = 20.0;

    /// Clamp values to sensible ranges.
    pub fn sanitized(self) -> Self {
        match self {
            ObscureStyle::Pixelate => ObscureStyle::Pixelate,
            ObscureStyle::Gaussian { sigma } if sigma.is_finite() && sigma > 0.0 => {
                ObscureStyle::Gaussian { sigma }
            }
            ObscureStyle::Gaussian { .. } => ObscureStyle::Gaussian {
                sigma: Self::DEFAULT_SIGMA,
            },
        }
    }
}

/// Parameters for the region compositor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompositingSettings {
    /// Obscuring effect applied to each region.
    pub style: ObscureStyle,
    /// Restrict the effect to each region's inscribed ellipse.
    pub circular: bool,
    /// Smallest pixelation block edge in pixels.
    pub min_block_size: u32,
    /// The block edge is `min(width, height) / block_divisor` when that exceeds the minimum.
    pub block_divisor: u32,
}

impl Default for CompositingSettings {
    fn default() -> Self {
        Self {
            style: ObscureStyle::Pixelate,
            circular: false,
            min_block_size: 8,
            block_divisor: 10,
        }
    }
}

impl CompositingSettings {
    /// Clamp values to sensible ranges.
    pub fn sanitize(&mut self) {
        self.style = self.style.sanitized();
        self.min_block_size = self.min_block_size.max(1);
        self.block_divisor = self.block_divisor.max(1);
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }

    /// Push these settings into the global telemetry switches.
    pub fn apply(&self) {
        crate::telemetry::configure(self.enabled, self.level_filter());
    }
}

/// Persistent settings for the detection and anonymization pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Optional override for the ONNX model path.
    pub model_path: Option<String>,
    /// The input dimensions for model inference.
    pub input: InputDimensions,
    /// The parameters for detection post-processing.
    pub detection: DetectionSettings,
    /// The parameters for the region compositor.
    pub compositing: CompositingSettings,
    /// Telemetry and diagnostics preferences.
    pub telemetry: TelemetrySettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            model_path: Some(DEFAULT_MODEL_PATH.into()),
            input: InputDimensions::default(),
            detection: DetectionSettings::default(),
            compositing: CompositingSettings::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl AppSettings {
    /// Load settings from a JSON file.
    ///
    /// Missing sections take their defaults; a missing `model_path` falls back to
    /// [`DEFAULT_MODEL_PATH`].
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;

        if settings.model_path.is_none() {
            settings.model_path = Some(DEFAULT_MODEL_PATH.into());
        }
        settings.compositing.sanitize();

        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON, overwriting any existing file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }

    /// Resolved model path, falling back to the default location.
    pub fn model_path(&self) -> PathBuf {
        PathBuf::from(self.model_path.as_deref().unwrap_or(DEFAULT_MODEL_PATH))
    }
}
